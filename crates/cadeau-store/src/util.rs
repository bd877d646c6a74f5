//! Row-mapping helpers shared by the CRUD modules.
//!
//! SQLite stores UUIDs and timestamps as TEXT; these helpers convert them
//! back, reporting failures as `FromSqlConversionFailure` on the offending
//! column so `query_row`/`query_map` callers see a plain `rusqlite::Error`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub(crate) fn uuid_col(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn opt_uuid_col(idx: usize, s: Option<&str>) -> rusqlite::Result<Option<Uuid>> {
    s.map(|v| uuid_col(idx, v)).transpose()
}

pub(crate) fn ts_col(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn opt_ts_col(idx: usize, s: Option<&str>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|v| ts_col(idx, v)).transpose()
}
