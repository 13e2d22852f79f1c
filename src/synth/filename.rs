//! Output filenames

use chrono::NaiveDate;

use crate::record::SourceRecord;

/// `{first}_{last}_{kind}_{MM-DD-YYYY}.pdf` with unsafe characters replaced
pub fn output_filename(record: &SourceRecord, document_kind: &str, date: NaiveDate) -> String {
    let first = record.subject.get("firstName").map(String::as_str).unwrap_or("");
    let last = record.subject.get("lastName").map(String::as_str).unwrap_or("");
    let raw = format!(
        "{}_{}_{}_{}.pdf",
        first.trim(),
        last.trim(),
        document_kind.trim(),
        date.format("%m-%d-%Y")
    );
    sanitize_filename(&raw)
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Filename dated with the local clock
pub fn output_filename_today(record: &SourceRecord, document_kind: &str) -> String {
    output_filename(record, document_kind, chrono::Local::now().date_naive())
}
