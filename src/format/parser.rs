//! # CSV Record Parser
//!
//! Splits a telemetry buffer into [`TelemetryRecord`]s.
//!
//! ## Line Format
//!
//! ```text
//! <local-timestamp>,<value_1>,<value_2>,...,<value_n>
//! 2024-06-01 10:00:00,23.5,----
//! ```
//!
//! The logger appends newest records last. Lines are scanned from the end of
//! the buffer and scanning stops once `max_records` records are accepted.
//! At most `max_records * SCAN_LINES_PER_RECORD` lines are ever inspected, so
//! a buffer full of bad lines costs no more than the record cap allows.
//!
//! Without configured channels the column count is the most common field
//! count among lines with a valid timestamp, ties going to the newest line.
//!
//! Native per-measurement rows are handled by [`super::rows`].
//!
//! ## Error Policy
//!
//! | Problem | Effect |
//! |---------|--------|
//! | Wrong field count | Line dropped |
//! | Unparseable timestamp | Line dropped |
//! | Non-numeric value | That channel reported missing |

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::rows::parse_rows;
use super::settings::{FormatterConfig, InputFormat};
use super::timestamp::parse_local;
use crate::error::FormatterError;

/// Lines inspected per allowed record in column input
pub const SCAN_LINES_PER_RECORD: usize = 4;

/// One channel reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelValue {
    /// A finite numeric reading
    Reading(f64),
    /// No usable reading for this channel
    Missing,
}

/// One parsed CSV line
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Device timestamp as written by the logger
    pub raw_timestamp: String,

    /// Device timestamp as local wall time
    pub local_time: NaiveDateTime,

    /// `(label, value)` pairs in CSV column order
    pub values: Vec<(String, ChannelValue)>,
}

/// Result of parsing one buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    /// Accepted records, oldest first
    pub records: Vec<TelemetryRecord>,

    /// Lines dropped for a wrong field count
    pub malformed_records: usize,

    /// Lines dropped for a bad timestamp
    pub malformed_timestamps: usize,

    /// Channel values replaced by the missing marker
    pub malformed_values: usize,
}

/// Parse a telemetry buffer
///
/// # Arguments
///
/// * `buffer` - Newline-delimited CSV text, newest record last
/// * `config` - Channel labels, missing tokens and record cap
///
/// # Returns
///
/// * `ParseReport` - At most `config.max_records` records, the most recent
///   ones, in buffer order
///
/// # Examples
///
/// ```
/// use telemetry_formatter::format::parser::{parse_buffer, ChannelValue};
/// use telemetry_formatter::format::settings::FormatterConfig;
///
/// let config = FormatterConfig {
///     channels: vec!["AT".to_string(), "BP".to_string()],
///     ..FormatterConfig::default()
/// };
/// let report = parse_buffer("2024-06-01 10:00:00,23.5,----\n", &config);
///
/// assert_eq!(report.records.len(), 1);
/// assert_eq!(report.records[0].values[0], ("AT".to_string(), ChannelValue::Reading(23.5)));
/// assert_eq!(report.records[0].values[1], ("BP".to_string(), ChannelValue::Missing));
/// ```
pub fn parse_buffer(buffer: &str, config: &FormatterConfig) -> ParseReport {
    if config.max_records == 0 {
        return ParseReport::default();
    }

    let report = match config.input_format {
        InputFormat::Columns => parse_columns(buffer, config),
        InputFormat::Rows => parse_rows(buffer, config),
    };
    debug!(
        "Parsed {} records ({} bad records, {} bad timestamps, {} bad values)",
        report.records.len(),
        report.malformed_records,
        report.malformed_timestamps,
        report.malformed_values
    );
    report
}

fn parse_columns(buffer: &str, config: &FormatterConfig) -> ParseReport {
    let mut report = ParseReport::default();
    let budget = config.max_records.saturating_mul(SCAN_LINES_PER_RECORD);

    // Positions count back from the newest line (1 = last line of the buffer)
    let window: Vec<(usize, &str)> = buffer
        .lines()
        .rev()
        .take(budget)
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    let labels = if config.channels.is_empty() {
        infer_labels(&window)
    } else {
        config.channels.clone()
    };

    for &(from_end, line) in &window {
        if report.records.len() >= config.max_records {
            break;
        }

        match parse_line(line, from_end, &labels, config, &mut report.malformed_values) {
            Ok(record) => report.records.push(record),
            Err(FormatterError::MalformedRecord { .. }) => {
                report.malformed_records += 1;
            }
            Err(_) => {
                report.malformed_timestamps += 1;
            }
        }
    }

    report.records.reverse();
    report
}

/// Positional labels `M1..Mn` for the dominant column layout
///
/// Only lines whose first field is a valid timestamp vote, so a truncated or
/// garbled line cannot decide the layout.
fn infer_labels(window: &[(usize, &str)]) -> Vec<String> {
    // (value columns, lines), in order of first appearance from the newest end
    let mut tally: Vec<(usize, usize)> = Vec::new();
    for (_, line) in window {
        let mut fields = line.split(',');
        if fields.next().map_or(true, |first| parse_local(first).is_err()) {
            continue;
        }
        let columns = fields.count();
        match tally.iter_mut().find(|(c, _)| *c == columns) {
            Some((_, lines)) => *lines += 1,
            None => tally.push((columns, 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for &(columns, lines) in &tally {
        if best.map_or(true, |(_, most)| lines > most) {
            best = Some((columns, lines));
        }
    }

    let columns = best.map_or(0, |(columns, _)| columns);
    debug!("No channels configured, inferred {} columns", columns);
    (1..=columns).map(|n| format!("M{}", n)).collect()
}

/// Parse one CSV line into a record
///
/// # Arguments
///
/// * `line` - One line of the buffer, without its terminator
/// * `from_end` - Line position counted back from the newest line, for diagnostics
/// * `labels` - Channel labels; the line must have `labels.len() + 1` fields
/// * `config` - Supplies the missing-data tokens
/// * `malformed_values` - Incremented for each value replaced by missing
///
/// # Errors
///
/// Returns [`FormatterError::MalformedRecord`] for a wrong field count, or
/// [`FormatterError::MalformedTimestamp`] for a bad timestamp.
pub fn parse_line(
    line: &str,
    from_end: usize,
    labels: &[String],
    config: &FormatterConfig,
    malformed_values: &mut usize,
) -> Result<TelemetryRecord, FormatterError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    let expected = labels.len() + 1;
    if fields.len() != expected {
        let err = FormatterError::MalformedRecord {
            from_end,
            expected,
            found: fields.len(),
        };
        warn!("Skipping line: {}", err);
        return Err(err);
    }

    let local_time = parse_local(fields[0]).map_err(|err| {
        warn!("Skipping line {} from end: {}", from_end, err);
        err
    })?;

    let values = labels
        .iter()
        .zip(&fields[1..])
        .map(|(label, raw)| {
            let value = read_value(raw, label, from_end, config, malformed_values);
            (label.clone(), value)
        })
        .collect();

    Ok(TelemetryRecord {
        raw_timestamp: fields[0].to_string(),
        local_time,
        values,
    })
}

/// Interpret one raw field, counting and logging unusable values
pub(crate) fn read_value(
    raw: &str,
    label: &str,
    from_end: usize,
    config: &FormatterConfig,
    malformed_values: &mut usize,
) -> ChannelValue {
    let value = parse_value(raw, config);
    if value == ChannelValue::Missing && !config.is_missing_token(raw) {
        warn!(
            "Line {} from end: non-numeric {} value {:?}, reporting missing",
            from_end, label, raw
        );
        *malformed_values += 1;
    }
    value
}

fn parse_value(raw: &str, config: &FormatterConfig) -> ChannelValue {
    if config.is_missing_token(raw) {
        return ChannelValue::Missing;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => ChannelValue::Reading(value),
        _ => ChannelValue::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(channels: &[&str], max_records: usize) -> FormatterConfig {
        FormatterConfig {
            channels: channels.iter().map(|c| c.to_string()).collect(),
            max_records,
            ..FormatterConfig::default()
        }
    }

    const TWO_LINES: &str = "2024-06-01 10:00:00,23.5,----\n2024-06-01 11:00:00,24.1,30.2";

    #[test]
    fn test_parse_scenario_buffer() {
        let report = parse_buffer(TWO_LINES, &config_with(&["AT", "BP"], 10));

        assert_eq!(report.records.len(), 2);
        let first = &report.records[0];
        assert_eq!(first.raw_timestamp, "2024-06-01 10:00:00");
        assert_eq!(first.values[0], ("AT".to_string(), ChannelValue::Reading(23.5)));
        assert_eq!(first.values[1], ("BP".to_string(), ChannelValue::Missing));

        let second = &report.records[1];
        assert_eq!(second.values[0].1, ChannelValue::Reading(24.1));
        assert_eq!(second.values[1].1, ChannelValue::Reading(30.2));
        assert_eq!(report.malformed_values, 0);
    }

    #[test]
    fn test_values_keep_field_order() {
        let config = config_with(&["C", "A", "B"], 10);
        let report = parse_buffer("2024-06-01 10:00:00,3,1,2", &config);

        let labels: Vec<&str> = report.records[0].values.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["C", "A", "B"]);
        assert_eq!(report.records[0].values[0].1, ChannelValue::Reading(3.0));
    }

    #[test]
    fn test_cap_keeps_most_recent() {
        let report = parse_buffer(TWO_LINES, &config_with(&["AT", "BP"], 1));

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].raw_timestamp, "2024-06-01 11:00:00");
    }

    #[test]
    fn test_cap_stops_scanning_older_lines() {
        // The malformed oldest line is never reached once the cap is met
        let buffer = "garbage\n2024-06-01 10:00:00,1,2\n2024-06-01 11:00:00,3,4";
        let report = parse_buffer(buffer, &config_with(&["A", "B"], 2));

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.malformed_records, 0);
    }

    #[test]
    fn test_wrong_field_count_is_skipped() {
        let buffer = "2024-06-01 09:00:00,1\n\
                      2024-06-01 10:00:00,1,2\n\
                      2024-06-01 10:30:00,1,2,3\n\
                      2024-06-01 11:00:00,3,4";
        let report = parse_buffer(buffer, &config_with(&["A", "B"], 10));

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.malformed_records, 2);
        assert_eq!(report.records[0].raw_timestamp, "2024-06-01 10:00:00");
        assert_eq!(report.records[1].raw_timestamp, "2024-06-01 11:00:00");
    }

    #[test]
    fn test_bad_timestamp_excludes_record() {
        let buffer = "2024-06-01 10:00:00,1,2\nsometime today....,3,4\n,5,6";
        let report = parse_buffer(buffer, &config_with(&["A", "B"], 10));

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.malformed_timestamps, 2);
    }

    #[test]
    fn test_non_numeric_value_becomes_missing() {
        let buffer = "2024-06-01 10:00:00,abc,inf";
        let report = parse_buffer(buffer, &config_with(&["A", "B"], 10));

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].values[0].1, ChannelValue::Missing);
        assert_eq!(report.records[0].values[1].1, ChannelValue::Missing);
        assert_eq!(report.malformed_values, 2);
    }

    #[test]
    fn test_empty_field_is_missing_without_warning_count() {
        let report = parse_buffer("2024-06-01 10:00:00,,7", &config_with(&["A", "B"], 10));

        assert_eq!(report.records[0].values[0].1, ChannelValue::Missing);
        assert_eq!(report.records[0].values[1].1, ChannelValue::Reading(7.0));
        assert_eq!(report.malformed_values, 0);
    }

    #[test]
    fn test_custom_missing_tokens() {
        let config = FormatterConfig {
            missing_tokens: vec!["-99999".to_string()],
            ..config_with(&["A"], 10)
        };
        let report = parse_buffer("2024-06-01 10:00:00,-99999", &config);
        assert_eq!(report.records[0].values[0].1, ChannelValue::Missing);
        assert_eq!(report.malformed_values, 0);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let buffer = "\r\n2024-06-01 10:00:00,1\r\n\r\n  \n2024-06-01 11:00:00,2\r\n";
        let report = parse_buffer(buffer, &config_with(&["A"], 10));

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].values[0].1, ChannelValue::Reading(2.0));
        assert_eq!(report.malformed_records, 0);
    }

    #[test]
    fn test_empty_buffer() {
        let report = parse_buffer("", &config_with(&["A"], 10));
        assert!(report.records.is_empty());

        let report = parse_buffer("\n\n", &FormatterConfig::default());
        assert!(report.records.is_empty());
    }

    #[test]
    fn test_channels_inferred_from_timestamped_lines() {
        let buffer = "2024-06-01 09:00:00,1\n2024-06-01 10:00:00,1,2,3";
        let report = parse_buffer(buffer, &FormatterConfig::default());

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.malformed_records, 1);
        let labels: Vec<&str> = report.records[0].values.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["M1", "M2", "M3"]);
    }

    #[test]
    fn test_truncated_newest_line_does_not_decide_columns() {
        let buffer = "2024-06-01 10:00:00,1,2\n2024-06-01 11:00:00,3,4\n2024-06-01 12:0";
        let report = parse_buffer(buffer, &FormatterConfig::default());

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.malformed_records, 1);
        assert_eq!(report.records[1].values[1], ("M2".to_string(), ChannelValue::Reading(4.0)));
    }

    #[test]
    fn test_most_common_column_count_wins() {
        // The newest line has a valid stamp but lost a value
        let buffer = "2024-06-01 09:00:00,1,2\n\
                      2024-06-01 10:00:00,1,2\n\
                      2024-06-01 11:00:00,3";
        let report = parse_buffer(buffer, &FormatterConfig::default());

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.malformed_records, 1);
        assert_eq!(report.records[1].raw_timestamp, "2024-06-01 10:00:00");
    }

    #[test]
    fn test_no_timestamped_line_yields_nothing() {
        let report = parse_buffer("junk\nmore junk,1", &FormatterConfig::default());
        assert!(report.records.is_empty());
        assert_eq!(report.malformed_records + report.malformed_timestamps, 2);
    }

    #[test]
    fn test_lines_inspected_are_bounded_by_cap() {
        let mut buffer = String::from("2024-06-01 10:00:00,1,2\n");
        buffer.push_str(&"junk\n".repeat(200_000));

        let report = parse_buffer(&buffer, &config_with(&["A", "B"], 1));

        assert!(report.records.is_empty());
        assert_eq!(report.malformed_records, SCAN_LINES_PER_RECORD);
    }

    #[test]
    fn test_bad_lines_within_budget_do_not_consume_cap() {
        let buffer = "2024-06-01 10:00:00,1,2\njunk\n2024-06-01 11:00:00,3,4\njunk";
        let report = parse_buffer(buffer, &config_with(&["A", "B"], 2));

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.malformed_records, 2);
    }

    #[test]
    fn test_zero_cap_yields_nothing() {
        let report = parse_buffer(TWO_LINES, &config_with(&["AT", "BP"], 0));
        assert!(report.records.is_empty());
    }

    #[test]
    fn test_parse_line_reports_field_counts() {
        let labels = vec!["A".to_string()];
        let mut bad = 0;
        let err = parse_line("2024-06-01 10:00:00,1,2", 7, &labels, &FormatterConfig::default(), &mut bad)
            .unwrap_err();

        match err {
            FormatterError::MalformedRecord { from_end, expected, found } => {
                assert_eq!(from_end, 7);
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("Expected MalformedRecord, got: {:?}", other),
        }
    }
}
