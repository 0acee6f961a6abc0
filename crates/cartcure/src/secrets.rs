//! Where the SMTP password comes from.
//!
//! The config may give it inline, as a path to a file holding it (mounted
//! secrets), or as the name of an environment variable. The first non-empty
//! source wins; there is no fallback from one to the next.

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("no password configured: set password, password_file or password_env_var")]
    Missing,

    #[error("cannot read password file '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("environment variable '{name}' is not set")]
    EnvUnset { name: String },

    #[error("environment variable '{name}' is not valid UTF-8")]
    EnvNotUnicode { name: String },
}

/// A configured secret location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource<'a> {
    Inline(&'a str),
    File(&'a str),
    Env(&'a str),
}

impl<'a> SecretSource<'a> {
    /// The highest-priority source that is actually filled in.
    pub fn pick(
        inline: Option<&'a str>,
        file: Option<&'a str>,
        env: Option<&'a str>,
    ) -> Option<Self> {
        let filled = |s: Option<&'a str>| s.filter(|v| !v.trim().is_empty());
        filled(inline)
            .map(SecretSource::Inline)
            .or_else(|| filled(file).map(SecretSource::File))
            .or_else(|| filled(env).map(SecretSource::Env))
    }

    pub fn read(&self) -> Result<SecretString, SecretError> {
        match *self {
            SecretSource::Inline(value) => Ok(SecretString::from(value.to_string())),
            SecretSource::File(path) => {
                let path = expand_home(path);
                std::fs::read_to_string(&path)
                    .map(|content| SecretString::from(content.trim_end().to_string()))
                    .map_err(|source| SecretError::Unreadable { path, source })
            }
            SecretSource::Env(name) => match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value)),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvUnset {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvNotUnicode {
                    name: name.to_string(),
                }),
            },
        }
    }
}

/// Picks the configured source and reads it.
pub fn resolve_secret(
    inline: Option<&str>,
    file: Option<&str>,
    env: Option<&str>,
) -> Result<SecretString, SecretError> {
    SecretSource::pick(inline, file, env)
        .ok_or(SecretError::Missing)?
        .read()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
