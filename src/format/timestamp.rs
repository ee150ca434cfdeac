//! # Timestamp Normalizer
//!
//! Converts the logger's local record stamps into ISO-8601 / RFC 3339 text.
//!
//! Device stamps are always local time, zero padded and exactly 19
//! characters wide. Accepted layouts:
//!
//! | Layout | Example |
//! |--------|---------|
//! | `YYYY-MM-DD HH:MM:SS` | `2024-06-01 10:00:00` |
//! | `YYYY-MM-DDTHH:MM:SS` | `2024-06-01T10:00:00` |
//! | `MM/DD/YYYY HH:MM:SS` | `06/01/2024 10:00:00` |
//!
//! A stamp that fits none of these is an error. It is never replaced by the
//! current time.

use chrono::{Duration, FixedOffset, NaiveDateTime, TimeZone};

use super::settings::TimestampStyle;
use crate::error::{FormatterError, Result};

/// Width of every device timestamp
pub const DEVICE_TIMESTAMP_LEN: usize = 19;

const DEVICE_LAYOUTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Parse a device timestamp as naive local time
///
/// # Errors
///
/// Returns [`FormatterError::MalformedTimestamp`] if the stamp is not 19
/// characters or matches no device layout.
pub fn parse_local(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if raw.len() != DEVICE_TIMESTAMP_LEN {
        return Err(FormatterError::MalformedTimestamp(raw.to_string()));
    }

    DEVICE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .ok_or_else(|| FormatterError::MalformedTimestamp(raw.to_string()))
}

/// Render a local time as a canonical timestamp
///
/// # Arguments
///
/// * `local` - Device wall-clock time
/// * `offset_minutes` - Local offset from UTC (e.g. -300 for UTC-5)
/// * `style` - Keep local time with an offset suffix, or convert to UTC
///
/// # Returns
///
/// * `YYYY-MM-DDTHH:MM:SS±HH:MM`, or `...Z` when in UTC or the offset is zero
///
/// # Errors
///
/// Returns [`FormatterError::InvalidOffset`] if the offset is not a valid
/// fixed UTC offset.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use telemetry_formatter::format::settings::TimestampStyle;
/// use telemetry_formatter::format::timestamp::normalize;
///
/// let local = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
///
/// assert_eq!(normalize(local, 0, TimestampStyle::Offset)?, "2024-06-01T10:00:00Z");
/// assert_eq!(normalize(local, -300, TimestampStyle::Offset)?, "2024-06-01T10:00:00-05:00");
/// assert_eq!(normalize(local, -300, TimestampStyle::Utc)?, "2024-06-01T15:00:00Z");
/// # Ok::<(), telemetry_formatter::error::FormatterError>(())
/// ```
pub fn normalize(local: NaiveDateTime, offset_minutes: i32, style: TimestampStyle) -> Result<String> {
    let offset = offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(FormatterError::InvalidOffset(offset_minutes))?;

    match style {
        TimestampStyle::Offset if offset_minutes == 0 => {
            Ok(local.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        }
        TimestampStyle::Offset => {
            let stamped = offset
                .from_local_datetime(&local)
                .single()
                .ok_or(FormatterError::InvalidOffset(offset_minutes))?;
            Ok(stamped.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
        }
        TimestampStyle::Utc => {
            let utc = local
                .checked_sub_signed(Duration::minutes(i64::from(offset_minutes)))
                .ok_or(FormatterError::InvalidOffset(offset_minutes))?;
            Ok(utc.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        }
    }
}

/// Parse and render a raw device stamp in one step
///
/// # Errors
///
/// Fails if the stamp is malformed or the offset is invalid.
pub fn normalize_str(raw: &str, offset_minutes: i32, style: TimestampStyle) -> Result<String> {
    normalize(parse_local(raw)?, offset_minutes, style)
}
