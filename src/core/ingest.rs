//! Contact CSV ingestion.
//!
//! Parses an uploaded CSV into validated contacts. The header must carry a
//! `phone` column; `name`, `company`, and any other columns become template
//! fields. Bad rows are reported individually and never abort the rows
//! after them.

use csv::ReaderBuilder;
use log::warn;
use std::collections::HashMap;
use thiserror::Error;

/// Digits allowed in an E.164 number after the country code sign.
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV file is missing the required 'phone' column")]
    MissingPhoneColumn,

    #[error("CSV file exceeds the maximum of {limit} rows")]
    TooManyRows { limit: usize },

    #[error("could not read CSV file: {0}")]
    Csv(#[from] csv::Error),
}

/// One recipient row from the upload. `fields` holds every non-empty
/// column (including `phone`) for template rendering.
#[derive(Debug, Clone)]
pub struct Contact {
    pub phone: String,
    pub fields: HashMap<String, String>,
}

/// A row that failed validation, identified by its 1-based data-row number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row_number: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Ingested {
    pub contacts: Vec<Contact>,
    pub row_errors: Vec<RowError>,
}

/// Parses `data` into contacts, collecting per-row errors.
///
/// Header-only input yields an empty contact list, which is not an error
/// here; the caller decides whether zero contacts fails the request. More
/// than `max_rows` data rows is rejected outright to bound memory and
/// dispatch cost.
pub fn ingest_contacts(data: &[u8], max_rows: usize) -> Result<Ingested, IngestError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(data);

    let headers = reader.headers()?.clone();
    let phone_column = headers
        .iter()
        .position(|h| h.trim() == "phone")
        .ok_or(IngestError::MissingPhoneColumn)?;

    let mut ingested = Ingested::default();

    for (index, record) in reader.records().enumerate() {
        let row_number = index + 1;
        if row_number > max_rows {
            return Err(IngestError::TooManyRows { limit: max_rows });
        }

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                ingested.row_errors.push(RowError {
                    row_number,
                    reason: format!("unreadable row: {e}"),
                });
                continue;
            }
        };

        let raw_phone = record.get(phone_column).unwrap_or("").trim();
        let phone = match normalize_phone(raw_phone) {
            Ok(phone) => phone,
            Err(reason) => {
                warn!("skipping row {row_number}: {reason}");
                ingested.row_errors.push(RowError { row_number, reason });
                continue;
            }
        };

        // Empty cells are left out of the map so the renderer treats them
        // as missing fields.
        let mut fields: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(header, value)| (header.trim().to_string(), value.trim().to_string()))
            .collect();
        fields.insert("phone".to_string(), phone.clone());

        ingested.contacts.push(Contact { phone, fields });
    }

    Ok(ingested)
}

/// Minimal E.164 shape check: after stripping common separators, an
/// optional `+` followed by 7-15 digits. Returns the normalized
/// `+<digits>` form.
fn normalize_phone(raw: &str) -> Result<String, String> {
    if raw.is_empty() {
        return Err("missing phone number".to_string());
    }

    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let digits = stripped.strip_prefix('+').unwrap_or(&stripped);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid phone number format: '{raw}'"));
    }
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(format!("invalid phone number length: '{raw}'"));
    }

    Ok(format!("+{digits}"))
}
