//! # Native Row Parser
//!
//! The logger's own telemetry buffer carries one measurement per line:
//!
//! ```text
//! MM/DD/YYYY,HH:MM:SS,NAME,VALUE,UNITS,QUALITY
//! 09/20/2023,11:14:45,AT,26.65,,G
//! 09/20/2023,11:14:45,BP,96.65,,G
//! ```
//!
//! Rows are folded into one [`TelemetryRecord`] per timestamp, oldest first.
//! Channels are every measurement name seen, sorted; a name with no row at a
//! given time is reported missing. Units and quality are not carried over.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::parser::{read_value, ChannelValue, ParseReport, TelemetryRecord};
use super::settings::{unique_labels, FormatterConfig, MEAS_COUNT};
use super::timestamp::parse_local;
use crate::error::FormatterError;

/// Fields in one native telemetry row
pub const ROW_FIELDS: usize = 6;

/// One measurement row
#[derive(Debug, Clone, PartialEq)]
struct Row {
    raw_timestamp: String,
    local_time: NaiveDateTime,
    name: String,
    value: ChannelValue,
}

/// Readings gathered for one timestamp: raw stamp, value by name
type Folded = (String, BTreeMap<String, ChannelValue>);

/// Parse a buffer of native rows
///
/// Rows are scanned from the end of the buffer. At most
/// `max_records * MEAS_COUNT` lines are inspected, and only the newest
/// `max_records` timestamps are kept. A repeated name at the same timestamp
/// keeps the row nearest the end of the buffer.
///
/// # Examples
///
/// ```
/// use telemetry_formatter::format::parser::{parse_buffer, ChannelValue};
/// use telemetry_formatter::format::settings::{FormatterConfig, InputFormat};
///
/// let config = FormatterConfig {
///     input_format: InputFormat::Rows,
///     ..FormatterConfig::default()
/// };
/// let buffer = "09/20/2023,11:14:45,AT,26.65,,G\n09/20/2023,11:14:30,BP,97.33,,G\n";
/// let report = parse_buffer(buffer, &config);
///
/// assert_eq!(report.records.len(), 2);
/// assert_eq!(report.records[0].values[0], ("AT".to_string(), ChannelValue::Missing));
/// assert_eq!(report.records[0].values[1], ("BP".to_string(), ChannelValue::Reading(97.33)));
/// ```
pub fn parse_rows(buffer: &str, config: &FormatterConfig) -> ParseReport {
    let mut report = ParseReport::default();
    let budget = config.max_records.saturating_mul(MEAS_COUNT);
    let mut folded: BTreeMap<NaiveDateTime, Folded> = BTreeMap::new();

    for (i, line) in buffer.lines().rev().take(budget).enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(line, i + 1, config, &mut report.malformed_values) {
            Ok(row) => {
                let (_, values) = folded
                    .entry(row.local_time)
                    .or_insert_with(|| (row.raw_timestamp, BTreeMap::new()));
                values.entry(row.name).or_insert(row.value);
            }
            Err(FormatterError::MalformedRecord { .. }) => {
                report.malformed_records += 1;
            }
            Err(_) => {
                report.malformed_timestamps += 1;
            }
        }
    }

    while folded.len() > config.max_records {
        folded.pop_first();
    }

    let names: Vec<String> = folded
        .values()
        .flat_map(|(_, values)| values.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let labels = unique_labels(names.clone());
    debug!("Folded rows into {} timestamps over {:?}", folded.len(), labels);

    report.records = folded
        .into_iter()
        .map(|(local_time, (raw_timestamp, values))| TelemetryRecord {
            raw_timestamp,
            local_time,
            values: names
                .iter()
                .zip(&labels)
                .map(|(name, label)| {
                    let value = values.get(name).copied().unwrap_or(ChannelValue::Missing);
                    (label.clone(), value)
                })
                .collect(),
        })
        .collect();
    report
}

fn parse_row(
    line: &str,
    from_end: usize,
    config: &FormatterConfig,
    malformed_values: &mut usize,
) -> Result<Row, FormatterError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != ROW_FIELDS {
        let err = FormatterError::MalformedRecord {
            from_end,
            expected: ROW_FIELDS,
            found: fields.len(),
        };
        warn!("Skipping row: {}", err);
        return Err(err);
    }

    let raw_timestamp = format!("{} {}", fields[0], fields[1]);
    let local_time = parse_local(&raw_timestamp).map_err(|err| {
        warn!("Skipping row {} from end: {}", from_end, err);
        err
    })?;

    let name = fields[2].to_string();
    let value = read_value(fields[3], &name, from_end, config, malformed_values);

    Ok(Row {
        raw_timestamp,
        local_time,
        name,
        value,
    })
}
