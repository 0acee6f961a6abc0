//! Conversion of intake submissions into jobs.

use serde::{Deserialize, Serialize};

use crate::model::ClientContact;

const SUBMISSION_PREFIX: &str = "SUB-";
const JOB_PREFIX: &str = "J-";

/// An already validated intake request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_number: String,
    pub client: ClientContact,
    #[serde(default)]
    pub store_reference: Option<String>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Job number for a submission before duplicate handling.
///
/// `SUB-0042` → `J-0042`
pub fn base_job_number(submission_number: &str) -> String {
    let trimmed = submission_number.trim();
    let stem = trimmed.strip_prefix(SUBMISSION_PREFIX).unwrap_or(trimmed);
    format!("{}{}", JOB_PREFIX, stem)
}

/// First of `base`, `base-2`, `base-3`, … for which `taken` returns false.
pub fn next_free_job_number<E>(
    base: &str,
    mut taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    if !taken(base)? {
        return Ok(base.to_string());
    }
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::convert::Infallible;

    #[test]
    fn test_base_job_number() {
        assert_eq!(base_job_number("SUB-0042"), "J-0042");
        assert_eq!(base_job_number(" 7731 "), "J-7731");
    }

    #[test]
    fn test_duplicates_get_suffix() {
        let taken: HashSet<&str> = ["J-0042", "J-0042-2"].into_iter().collect();
        let number =
            next_free_job_number::<Infallible>("J-0042", |n| Ok(taken.contains(n))).unwrap();
        assert_eq!(number, "J-0042-3");

        let fresh =
            next_free_job_number::<Infallible>("J-0043", |n| Ok(taken.contains(n))).unwrap();
        assert_eq!(fresh, "J-0043");
    }

    #[test]
    fn test_lookup_errors_propagate() {
        let result = next_free_job_number("J-1", |_| Err::<bool, _>("store offline"));
        assert_eq!(result, Err("store offline"));
    }
}
