//! Media folder naming.

use chrono::{DateTime, Datelike, Utc};

/// Folder a finalized upload is filed under:
/// `<namespace>/<month 1-12>/semana_<ISO week>`.
///
/// ISO weeks start on Monday, so the first days of January may belong to
/// week 52 or 53 of the previous year.
pub fn media_folder(namespace: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}/semana_{}",
        namespace.trim_matches('/'),
        at.month(),
        at.iso_week().week()
    )
}
