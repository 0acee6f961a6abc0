//! Message bodies for every client and admin notification.
//!
//! Each builder returns a complete [`OutboundEmail`]; the plain body and the
//! HTML body carry the same paragraphs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::OutboundEmail;
use crate::config::BusinessProfile;
use crate::model::{Invoice, InvoiceType, Job};
use crate::temporal::LateFee;

pub fn quote_sent(to: &str, job: &Job, business: &BusinessProfile) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", first_name(job)),
        format!(
            "Thanks for getting in touch. Here is our quote for job {}: {}",
            job.job_number, job.description
        ),
        amount_lines(job),
        format!("Estimated turnaround: {} days from acceptance.", job.turnaround_days),
    ];
    if let Some(valid_until) = job.quote_valid_until {
        paragraphs.push(format!("This quote is valid until {}.", date(valid_until)));
    }
    paragraphs.push("Reply to this email to accept and we'll get started.".to_string());
    compose(
        to,
        business,
        format!("Your quote from {} ({})", business.name, job.job_number),
        paragraphs,
    )
}

pub fn quote_reminder(to: &str, job: &Job, business: &BusinessProfile) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", first_name(job)),
        format!(
            "Just a quick follow-up on our quote for job {} ({}).",
            job.job_number,
            money(job.total_incl_tax)
        ),
    ];
    if let Some(valid_until) = job.quote_valid_until {
        paragraphs.push(format!("The quote remains valid until {}.", date(valid_until)));
    }
    paragraphs.push("Let us know if you have any questions.".to_string());
    compose(
        to,
        business,
        format!("Reminder: your quote {}", job.job_number),
        paragraphs,
    )
}

pub fn quote_accepted(
    to: &str,
    job: &Job,
    deposit: Option<&Invoice>,
    business: &BusinessProfile,
) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", first_name(job)),
        format!("Thanks for accepting the quote for job {}.", job.job_number),
    ];
    match deposit {
        Some(invoice) => paragraphs.push(format!(
            "A deposit of {} is required before work begins. Invoice {} is on its way.",
            money(invoice.total),
            invoice.invoice_number
        )),
        None => {
            if let Some(due) = job.due_date {
                paragraphs.push(format!("We expect to have it finished by {}.", date(due)));
            }
        }
    }
    compose(
        to,
        business,
        format!("Quote accepted: {}", job.job_number),
        paragraphs,
    )
}

pub fn quote_declined(to: &str, job: &Job, business: &BusinessProfile) -> OutboundEmail {
    compose(
        to,
        business,
        format!("Quote {} closed", job.job_number),
        vec![
            format!("Hi {},", first_name(job)),
            format!(
                "We've closed the quote for job {}. If anything changes, just get in touch.",
                job.job_number
            ),
        ],
    )
}

pub fn work_started(to: &str, job: &Job, business: &BusinessProfile) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", first_name(job)),
        format!("Work on job {} has started.", job.job_number),
    ];
    if let Some(due) = job.due_date {
        paragraphs.push(format!("Expected completion: {}.", date(due)));
    }
    compose(
        to,
        business,
        format!("Work started: {}", job.job_number),
        paragraphs,
    )
}

pub fn work_resumed(to: &str, job: &Job, business: &BusinessProfile) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", first_name(job)),
        format!("Work on job {} has resumed.", job.job_number),
    ];
    if let Some(due) = job.due_date {
        paragraphs.push(format!("Updated completion date: {}.", date(due)));
    }
    compose(
        to,
        business,
        format!("Work resumed: {}", job.job_number),
        paragraphs,
    )
}

pub fn on_hold(to: &str, job: &Job, reason: &str, business: &BusinessProfile) -> OutboundEmail {
    compose(
        to,
        business,
        format!("Job {} is on hold", job.job_number),
        vec![
            format!("Hi {},", first_name(job)),
            format!("We've paused work on job {}.", job.job_number),
            format!("Reason: {}", reason),
            "The turnaround clock is paused until work resumes.".to_string(),
        ],
    )
}

pub fn job_completed(to: &str, job: &Job, business: &BusinessProfile) -> OutboundEmail {
    compose(
        to,
        business,
        format!("Job {} is complete", job.job_number),
        vec![
            format!("Hi {},", first_name(job)),
            format!("Job {} is finished: {}", job.job_number, job.description),
            "Please check everything looks right and let us know if anything needs a tweak."
                .to_string(),
        ],
    )
}

pub fn job_cancelled(
    to: &str,
    job: &Job,
    reason: &str,
    refund: bool,
    business: &BusinessProfile,
) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", first_name(job)),
        format!("Job {} has been cancelled.", job.job_number),
    ];
    if !reason.trim().is_empty() {
        paragraphs.push(format!("Reason: {}", reason.trim()));
    }
    if refund {
        paragraphs.push("Any payment already made will be refunded.".to_string());
    }
    compose(
        to,
        business,
        format!("Job {} cancelled", job.job_number),
        paragraphs,
    )
}

pub fn invoice_issued(to: &str, invoice: &Invoice, business: &BusinessProfile) -> OutboundEmail {
    let kind = match invoice.invoice_type {
        InvoiceType::Full => "Invoice",
        InvoiceType::Deposit => "Deposit invoice",
        InvoiceType::Balance => "Balance invoice",
        InvoiceType::Additional => "Additional invoice",
    };
    let mut paragraphs = vec![
        format!("Hi {},", invoice.client.name),
        format!(
            "{} {} for job {} is attached below.",
            kind, invoice.invoice_number, invoice.job_number
        ),
        invoice_lines(invoice),
        format!("Payment is due by {}.", date(invoice.due_date)),
    ];
    if let Some(instructions) = &business.payment_instructions {
        paragraphs.push(instructions.clone());
    }
    compose(
        to,
        business,
        format!("{} {}", kind, invoice.invoice_number),
        paragraphs,
    )
}

pub fn pre_due_reminder(
    to: &str,
    invoice: &Invoice,
    days_until_due: i64,
    business: &BusinessProfile,
) -> OutboundEmail {
    let when = if days_until_due == 1 {
        "tomorrow".to_string()
    } else {
        format!("in {} days", days_until_due)
    };
    let mut paragraphs = vec![
        format!("Hi {},", invoice.client.name),
        format!(
            "A friendly reminder that invoice {} ({}) is due {}, on {}.",
            invoice.invoice_number,
            money(invoice.total),
            when,
            date(invoice.due_date)
        ),
    ];
    if let Some(instructions) = &business.payment_instructions {
        paragraphs.push(instructions.clone());
    }
    compose(
        to,
        business,
        format!("Invoice {} due soon", invoice.invoice_number),
        paragraphs,
    )
}

pub fn overdue_notice(
    to: &str,
    invoice: &Invoice,
    fee: &LateFee,
    business: &BusinessProfile,
) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", invoice.client.name),
        format!(
            "Invoice {} was due on {} and is now {} day{} overdue.",
            invoice.invoice_number,
            date(invoice.due_date),
            fee.days_overdue,
            if fee.days_overdue == 1 { "" } else { "s" }
        ),
        format!(
            "Original amount: {}\nLate fee: {}\nNow due: {}",
            money(invoice.total),
            money(fee.fee),
            money(fee.total_with_fee)
        ),
    ];
    if let Some(instructions) = &business.payment_instructions {
        paragraphs.push(instructions.clone());
    }
    compose(
        to,
        business,
        format!("Overdue: invoice {}", invoice.invoice_number),
        paragraphs,
    )
}

pub fn payment_receipt(to: &str, invoice: &Invoice, business: &BusinessProfile) -> OutboundEmail {
    let mut paragraphs = vec![
        format!("Hi {},", invoice.client.name),
        format!(
            "We've received your payment of {} for invoice {}. Thank you!",
            money(invoice.total_with_fees.max(invoice.total)),
            invoice.invoice_number
        ),
    ];
    if let Some(reference) = &invoice.payment_reference {
        paragraphs.push(format!("Reference: {}", reference));
    }
    compose(
        to,
        business,
        format!("Receipt for invoice {}", invoice.invoice_number),
        paragraphs,
    )
}

pub fn admin_alert(subject: &str, detail: &str, business: &BusinessProfile) -> OutboundEmail {
    compose(
        &business.admin_email,
        business,
        format!("[{}] {}", business.name, subject),
        vec![detail.to_string()],
    )
}

fn compose(
    to: &str,
    business: &BusinessProfile,
    subject: String,
    paragraphs: Vec<String>,
) -> OutboundEmail {
    let signature = format!("Cheers,\n{}", business.name);

    let plain_body = paragraphs
        .iter()
        .chain(std::iter::once(&signature))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n");

    let html_body = paragraphs
        .iter()
        .chain(std::iter::once(&signature))
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n");

    OutboundEmail {
        to: to.to_string(),
        subject,
        html_body,
        plain_body,
        reply_to: Some(business.reply_address().to_string()),
    }
}

fn amount_lines(job: &Job) -> String {
    if job.tax_amount.is_zero() {
        format!("Total: {}", money(job.total_incl_tax))
    } else {
        format!(
            "Amount: {}\nGST: {}\nTotal: {}",
            money(job.quote_amount_excl_tax),
            money(job.tax_amount),
            money(job.total_incl_tax)
        )
    }
}

fn invoice_lines(invoice: &Invoice) -> String {
    if invoice.tax_amount.is_zero() {
        format!("Total: {}", money(invoice.total))
    } else {
        format!(
            "Amount: {}\nGST: {}\nTotal: {}",
            money(invoice.amount_excl_tax),
            money(invoice.tax_amount),
            money(invoice.total)
        )
    }
}

fn first_name(job: &Job) -> &str {
    job.client
        .name
        .split_whitespace()
        .next()
        .unwrap_or("there")
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

fn date(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y").to_string()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
