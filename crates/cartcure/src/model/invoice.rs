//! Invoice record: a billing document attached to a job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::job::ClientContact;
use super::text_enum;

text_enum! {
    /// Invoice status. Moves forward only.
    InvoiceStatus {
        Draft => "draft",
        Sent => "sent",
        Overdue => "overdue",
        Paid => "paid",
        Cancelled => "cancelled",
    }
}

impl InvoiceStatus {
    /// Paid or cancelled: no reminder or fee may touch it.
    pub fn is_settled(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Sent to the client and still awaiting payment.
    pub fn is_open(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

text_enum! {
    /// What portion of the job an invoice bills.
    InvoiceType {
        Full => "full",
        Deposit => "deposit",
        Balance => "balance",
        Additional => "additional",
    }
}

/// Payment details recorded when an invoice is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_number: String,
    pub job_number: String,
    /// Copied from the job when the invoice is created.
    pub client: ClientContact,
    pub invoice_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub amount_excl_tax: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub invoice_type: InvoiceType,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub days_overdue: i64,
    pub late_fee: Decimal,
    pub total_with_fees: Decimal,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_deposit(&self) -> bool {
        self.invoice_type == InvoiceType::Deposit
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_statuses() {
        assert!(InvoiceStatus::Paid.is_settled());
        assert!(InvoiceStatus::Cancelled.is_settled());
        assert!(!InvoiceStatus::Overdue.is_settled());
        assert!(InvoiceStatus::Overdue.is_open());
        assert!(!InvoiceStatus::Draft.is_open());
    }
}
