//! Human-readable invoice numbers.

const JOB_PREFIX: &str = "J-";
const INVOICE_PREFIX: &str = "INV-";

/// Number for the next invoice on `job_number`.
///
/// `existing` counts every invoice already raised for the job, cancelled
/// ones included, so a number is never reused.
///
/// - `J-0042`, 0 existing → `INV-0042`
/// - `J-0042`, 2 existing → `INV-0042-3`
pub fn invoice_number(job_number: &str, existing: usize) -> String {
    let base = match job_number.strip_prefix(JOB_PREFIX) {
        Some(rest) => format!("{}{}", INVOICE_PREFIX, rest),
        None => format!("{}{}", INVOICE_PREFIX, job_number),
    };
    if existing == 0 {
        base
    } else {
        format!("{}-{}", base, existing + 1)
    }
}

/// [`invoice_number`], skipping any candidate `taken` reports as used.
///
/// A duplicate job such as `J-0042-2` starts at `INV-0042-2`, which may
/// already belong to the second invoice of `J-0042`. The suffix keeps
/// climbing until a free number turns up.
pub fn next_free_invoice_number<E>(
    job_number: &str,
    existing: usize,
    mut taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    let mut count = existing;
    loop {
        let candidate = invoice_number(job_number, count);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        count += 1;
    }
}
