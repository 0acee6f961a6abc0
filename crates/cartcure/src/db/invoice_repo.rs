//! Invoice repository: typed access to the `invoices` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decimal_column, DatabaseError};
use crate::model::{ClientContact, Invoice, InvoiceStatus};

const COLUMNS: &str = "invoice_number, job_number, client_name, client_email, client_phone,
    invoice_date, due_date, amount_excl_tax, tax_amount, total, status, invoice_type,
    sent_at, paid_at, payment_method, payment_reference, days_overdue, late_fee,
    total_with_fees, created_at, last_updated_at";

fn from_row(row: &Row<'_>) -> Result<Invoice, rusqlite::Error> {
    Ok(Invoice {
        invoice_number: row.get("invoice_number")?,
        job_number: row.get("job_number")?,
        client: ClientContact {
            name: row.get("client_name")?,
            email: row.get("client_email")?,
            phone: row.get("client_phone")?,
        },
        invoice_date: row.get("invoice_date")?,
        due_date: row.get("due_date")?,
        amount_excl_tax: decimal_column(row, "amount_excl_tax")?,
        tax_amount: decimal_column(row, "tax_amount")?,
        total: decimal_column(row, "total")?,
        status: row.get("status")?,
        invoice_type: row.get("invoice_type")?,
        sent_at: row.get("sent_at")?,
        paid_at: row.get("paid_at")?,
        payment_method: row.get("payment_method")?,
        payment_reference: row.get("payment_reference")?,
        days_overdue: row.get("days_overdue")?,
        late_fee: decimal_column(row, "late_fee")?,
        total_with_fees: decimal_column(row, "total_with_fees")?,
        created_at: row.get("created_at")?,
        last_updated_at: row.get("last_updated_at")?,
    })
}

/// Inserts a new invoice row.
pub fn insert(conn: &Connection, invoice: &Invoice) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO invoices ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
             ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            COLUMNS
        ),
        params![
            invoice.invoice_number,
            invoice.job_number,
            invoice.client.name,
            invoice.client.email,
            invoice.client.phone,
            invoice.invoice_date,
            invoice.due_date,
            invoice.amount_excl_tax.to_string(),
            invoice.tax_amount.to_string(),
            invoice.total.to_string(),
            invoice.status,
            invoice.invoice_type,
            invoice.sent_at,
            invoice.paid_at,
            invoice.payment_method,
            invoice.payment_reference,
            invoice.days_overdue,
            invoice.late_fee.to_string(),
            invoice.total_with_fees.to_string(),
            invoice.created_at,
            invoice.last_updated_at,
        ],
    )?;
    Ok(())
}

/// Writes the mutable fields of an invoice in one statement. Amounts,
/// type, owning job and number are fixed at creation.
pub fn update(conn: &Connection, invoice: &Invoice) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE invoices SET status=?2, sent_at=?3, paid_at=?4, payment_method=?5,
         payment_reference=?6, days_overdue=?7, late_fee=?8, total_with_fees=?9,
         last_updated_at=?10
         WHERE invoice_number=?1",
        params![
            invoice.invoice_number,
            invoice.status,
            invoice.sent_at,
            invoice.paid_at,
            invoice.payment_method,
            invoice.payment_reference,
            invoice.days_overdue,
            invoice.late_fee.to_string(),
            invoice.total_with_fees.to_string(),
            invoice.last_updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::MissingRow {
            table: "invoices",
            key: invoice.invoice_number.clone(),
        });
    }
    Ok(())
}

pub fn find_by_number(
    conn: &Connection,
    invoice_number: &str,
) -> Result<Option<Invoice>, DatabaseError> {
    let invoice = conn
        .query_row(
            &format!("SELECT {} FROM invoices WHERE invoice_number = ?1", COLUMNS),
            params![invoice_number],
            from_row,
        )
        .optional()?;
    Ok(invoice)
}

/// Every invoice of a job, cancelled ones included, in issue order.
pub fn list_for_job(conn: &Connection, job_number: &str) -> Result<Vec<Invoice>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM invoices WHERE job_number = ?1 ORDER BY created_at, rowid",
        COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![job_number], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_for_job(conn: &Connection, job_number: &str) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM invoices WHERE job_number = ?1",
        params![job_number],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Invoices whose status is any of `statuses`, oldest due first.
pub fn list_by_statuses(
    conn: &Connection,
    statuses: &[InvoiceStatus],
) -> Result<Vec<Invoice>, DatabaseError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: Vec<String> = (1..=statuses.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT {} FROM invoices WHERE status IN ({}) ORDER BY due_date, invoice_number",
        COLUMNS,
        placeholders.join(", ")
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> = statuses
        .iter()
        .map(|s| s as &dyn rusqlite::types::ToSql)
        .collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_ref.as_slice(), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{job_repo, Database};
    use crate::model::{InvoiceType, Job};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let job = Job::new("J-0042", ClientContact::default(), "Theme fix", now);
        db.with_conn(|c| job_repo::insert(c, &job)).unwrap();
        db
    }

    fn sample_invoice(number: &str, offset_days: i64) -> Invoice {
        let issued =
            Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap() + Duration::days(offset_days);
        Invoice {
            invoice_number: number.to_string(),
            job_number: "J-0042".to_string(),
            client: ClientContact {
                name: "Sarah Smith".into(),
                email: Some("sarah@example.com".into()),
                phone: None,
            },
            invoice_date: issued,
            due_date: issued + Duration::days(7),
            amount_excl_tax: Decimal::from(100),
            tax_amount: Decimal::from(15),
            total: Decimal::from(115),
            status: InvoiceStatus::Draft,
            invoice_type: InvoiceType::Full,
            sent_at: None,
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            days_overdue: 0,
            late_fee: Decimal::ZERO,
            total_with_fees: Decimal::from(115),
            created_at: issued,
            last_updated_at: issued,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let invoice = sample_invoice("INV-0042", 0);
        db.with_conn(|c| insert(c, &invoice)).unwrap();

        let found = db
            .with_conn(|c| find_by_number(c, "INV-0042"))
            .unwrap()
            .unwrap();
        assert_eq!(found, invoice);
    }

    #[test]
    fn test_invoice_requires_existing_job() {
        let db = test_db();
        let mut orphan = sample_invoice("INV-0099", 0);
        orphan.job_number = "J-0099".into();
        assert!(db.with_conn(|c| insert(c, &orphan)).is_err());
    }

    #[test]
    fn test_list_for_job_in_issue_order() {
        let db = test_db();
        db.with_conn(|c| insert(c, &sample_invoice("INV-0042-2", 3))).unwrap();
        db.with_conn(|c| insert(c, &sample_invoice("INV-0042", 0))).unwrap();

        let rows = db.with_conn(|c| list_for_job(c, "J-0042")).unwrap();
        let numbers: Vec<&str> = rows.iter().map(|i| i.invoice_number.as_str()).collect();
        assert_eq!(numbers, vec!["INV-0042", "INV-0042-2"]);
        assert_eq!(db.with_conn(|c| count_for_job(c, "J-0042")).unwrap(), 2);
    }

    #[test]
    fn test_update_and_filter_by_status() {
        let db = test_db();
        let mut invoice = sample_invoice("INV-0042", 0);
        db.with_conn(|c| insert(c, &invoice)).unwrap();
        db.with_conn(|c| insert(c, &sample_invoice("INV-0042-2", 1))).unwrap();

        invoice.status = InvoiceStatus::Sent;
        invoice.sent_at = Some(invoice.invoice_date);
        db.with_conn(|c| update(c, &invoice)).unwrap();

        let open = db
            .with_conn(|c| list_by_statuses(c, &[InvoiceStatus::Sent, InvoiceStatus::Overdue]))
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].invoice_number, "INV-0042");
        assert!(db.with_conn(|c| list_by_statuses(c, &[])).unwrap().is_empty());
    }
}
