//! Job repository: typed access to the `jobs` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decimal_column, DatabaseError};
use crate::model::{ClientContact, Job, JobStatus};

const COLUMNS: &str = "job_number, status, client_name, client_email, client_phone,
    store_reference, description, category, quote_amount_excl_tax, tax_amount,
    total_incl_tax, quote_sent_at, quote_valid_until, quote_accepted_at, turnaround_days,
    due_date, sla_status, sla_baseline_at, hold_started_at, actual_start_at,
    actual_completion_at, payment_status, payment_date, payment_method, payment_reference,
    notes, source_submission_id, created_at, last_updated_at";

fn from_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    Ok(Job {
        job_number: row.get("job_number")?,
        status: row.get("status")?,
        client: ClientContact {
            name: row.get("client_name")?,
            email: row.get("client_email")?,
            phone: row.get("client_phone")?,
        },
        store_reference: row.get("store_reference")?,
        description: row.get("description")?,
        category: row.get("category")?,
        quote_amount_excl_tax: decimal_column(row, "quote_amount_excl_tax")?,
        tax_amount: decimal_column(row, "tax_amount")?,
        total_incl_tax: decimal_column(row, "total_incl_tax")?,
        quote_sent_at: row.get("quote_sent_at")?,
        quote_valid_until: row.get("quote_valid_until")?,
        quote_accepted_at: row.get("quote_accepted_at")?,
        turnaround_days: row.get("turnaround_days")?,
        due_date: row.get("due_date")?,
        sla_status: row.get("sla_status")?,
        sla_baseline_at: row.get("sla_baseline_at")?,
        hold_started_at: row.get("hold_started_at")?,
        actual_start_at: row.get("actual_start_at")?,
        actual_completion_at: row.get("actual_completion_at")?,
        payment_status: row.get("payment_status")?,
        payment_date: row.get("payment_date")?,
        payment_method: row.get("payment_method")?,
        payment_reference: row.get("payment_reference")?,
        notes: row.get("notes")?,
        source_submission_id: row.get("source_submission_id")?,
        created_at: row.get("created_at")?,
        last_updated_at: row.get("last_updated_at")?,
    })
}

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &Job) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
             ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)",
            COLUMNS
        ),
        params![
            job.job_number,
            job.status,
            job.client.name,
            job.client.email,
            job.client.phone,
            job.store_reference,
            job.description,
            job.category,
            job.quote_amount_excl_tax.to_string(),
            job.tax_amount.to_string(),
            job.total_incl_tax.to_string(),
            job.quote_sent_at,
            job.quote_valid_until,
            job.quote_accepted_at,
            job.turnaround_days,
            job.due_date,
            job.sla_status,
            job.sla_baseline_at,
            job.hold_started_at,
            job.actual_start_at,
            job.actual_completion_at,
            job.payment_status,
            job.payment_date,
            job.payment_method,
            job.payment_reference,
            job.notes,
            job.source_submission_id,
            job.created_at,
            job.last_updated_at,
        ],
    )?;
    Ok(())
}

/// Writes every mutable field of a job in one statement.
///
/// `job_number` and `created_at` are never rewritten.
pub fn update(conn: &Connection, job: &Job) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status=?2, client_name=?3, client_email=?4, client_phone=?5,
         store_reference=?6, description=?7, category=?8, quote_amount_excl_tax=?9,
         tax_amount=?10, total_incl_tax=?11, quote_sent_at=?12, quote_valid_until=?13,
         quote_accepted_at=?14, turnaround_days=?15, due_date=?16, sla_status=?17,
         sla_baseline_at=?18, hold_started_at=?19, actual_start_at=?20,
         actual_completion_at=?21, payment_status=?22, payment_date=?23, payment_method=?24,
         payment_reference=?25, notes=?26, source_submission_id=?27, last_updated_at=?28
         WHERE job_number=?1",
        params![
            job.job_number,
            job.status,
            job.client.name,
            job.client.email,
            job.client.phone,
            job.store_reference,
            job.description,
            job.category,
            job.quote_amount_excl_tax.to_string(),
            job.tax_amount.to_string(),
            job.total_incl_tax.to_string(),
            job.quote_sent_at,
            job.quote_valid_until,
            job.quote_accepted_at,
            job.turnaround_days,
            job.due_date,
            job.sla_status,
            job.sla_baseline_at,
            job.hold_started_at,
            job.actual_start_at,
            job.actual_completion_at,
            job.payment_status,
            job.payment_date,
            job.payment_method,
            job.payment_reference,
            job.notes,
            job.source_submission_id,
            job.last_updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::MissingRow {
            table: "jobs",
            key: job.job_number.clone(),
        });
    }
    Ok(())
}

/// Finds a job by its number.
pub fn find_by_number(conn: &Connection, job_number: &str) -> Result<Option<Job>, DatabaseError> {
    let job = conn
        .query_row(
            &format!("SELECT {} FROM jobs WHERE job_number = ?1", COLUMNS),
            params![job_number],
            from_row,
        )
        .optional()?;
    Ok(job)
}

pub fn exists(conn: &Connection, job_number: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE job_number = ?1",
        params![job_number],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Full-table scan in creation order.
pub fn list_all(conn: &Connection) -> Result<Vec<Job>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM jobs ORDER BY created_at, job_number",
        COLUMNS
    ))?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_by_status(conn: &Connection, status: JobStatus) -> Result<Vec<Job>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM jobs WHERE status = ?1 ORDER BY created_at, job_number",
        COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![status], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
