//! Typed records for the job and invoice tables.

pub mod invoice;
pub mod job;

use thiserror::Error;

pub use invoice::{Invoice, InvoiceStatus, InvoiceType, PaymentDetails};
pub use job::{ClientContact, Job, JobStatus, PaymentStatus};

/// A stored enum value that does not name any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum that is stored as canonical snake_case text:
/// `as_str`/`FromStr`/`Display`, serde, and rusqlite column conversion.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::model::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::model::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

pub(crate) use text_enum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip_for_every_status() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), *status);
        }
        for status in InvoiceStatus::ALL {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let err = "archived".parse::<JobStatus>().unwrap_err();
        assert_eq!(err.kind, "JobStatus");
        assert_eq!(err.value, "archived");
    }

    #[test]
    fn test_serde_uses_stored_text() {
        let json = serde_json::to_string(&InvoiceType::Deposit).unwrap();
        assert_eq!(json, "\"deposit\"");
        let parsed: JobStatus = serde_json::from_str("\"quote_reminded\"").unwrap();
        assert_eq!(parsed, JobStatus::QuoteReminded);
    }
}
