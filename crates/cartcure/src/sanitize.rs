//! Helpers for keeping client contact details out of logs and span fields.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Masks the local part of an email address.
///
/// - `sarah@example.com` → `s***@example.com`
/// - `not-an-email` → `***`
pub fn redact_email(email: &str) -> String {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}

/// Short deterministic hash for correlating a value across log lines
/// without exposing it.
pub fn hash_key(value: &str) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_email_keeps_domain() {
        assert_eq!(redact_email("sarah@example.com"), "s***@example.com");
        assert_eq!(redact_email("  a@b.co "), "a***@b.co");
    }

    #[test]
    fn test_redact_email_handles_garbage() {
        assert_eq!(redact_email("not-an-email"), "***");
        assert_eq!(redact_email("@example.com"), "***");
        assert_eq!(redact_email(""), "***");
    }

    #[test]
    fn test_hash_key_is_deterministic() {
        assert_eq!(hash_key("J-0042"), hash_key("J-0042"));
        assert_ne!(hash_key("J-0042"), hash_key("J-0043"));
        assert_eq!(hash_key("x").len(), 16);
    }
}
