use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use super::{Notifier, NotifyError, OutboundEmail};
use crate::config::SmtpConfig;
use crate::sanitize::redact_email;
use crate::secrets::resolve_secret;

/// Delivers mail through an authenticated STARTTLS relay.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, crate::error::CartcureError> {
        let password = resolve_secret(
            config.password.as_deref(),
            config.password_file.as_deref(),
            config.password_env_var.as_deref(),
        )?;

        let from = parse_mailbox(&config.from)?;
        let credentials = Credentials::new(
            config.username.clone(),
            password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Transport(format!("SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.clone());

        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(parse_mailbox(reply_to)?);
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.plain_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        let message = self.build_message(email)?;
        self.transport
            .send(&message)
            .map_err(|e| NotifyError::Transport(format!("SMTP send: {}", e)))?;
        tracing::info!(to = %redact_email(&email.to), subject = %email.subject, "Email sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: redact_email(address),
            reason: e.to_string(),
        })
}
