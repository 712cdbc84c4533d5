//! Release dates published by the chains are plain calendar dates in Korean
//! local time. A bare date read as UTC midnight would land nine hours late, so
//! every date is pinned to midnight at `+09:00` instead.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

pub const KST_OFFSET_SECS: i32 = 9 * 3600;

pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).expect("+09:00 is a valid offset")
}

/// Parse `YYYY.MM.DD` (or `-` / `/` separated) into midnight KST.
///
/// Anything after the date digits, such as a `(재개봉)` marker or a
/// time-of-day part, is ignored.
pub fn parse_kst_date(raw: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = || Error::InvalidDateFormat(raw.to_string());

    let trimmed = raw.trim();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '/')))
        .unwrap_or(trimmed.len());
    let date_part = trimmed[..end].trim_end_matches(['.', '-', '/']);

    let mut fields = date_part.split(['.', '-', '/']);
    let (Some(y), Some(m), Some(d), None) = (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid());
    };
    if y.len() != 4 || m.is_empty() || m.len() > 2 || d.is_empty() || d.len() > 2 {
        return Err(invalid());
    }
    let (year, month, day) = (
        y.parse::<i32>().map_err(|_| invalid())?,
        m.parse::<u32>().map_err(|_| invalid())?,
        d.parse::<u32>().map_err(|_| invalid())?,
    );

    let midnight = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?;

    kst().from_local_datetime(&midnight).single().ok_or_else(invalid)
}

/// Soft variant used by the adapters: unparsable dates become "unknown".
pub fn release_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    match parse_kst_date(raw) {
        Ok(date) => Some(date),
        Err(e) => {
            if !raw.trim().is_empty() {
                tracing::debug!(error = %e, "unparsable release date");
            }
            None
        }
    }
}
