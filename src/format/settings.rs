//! # Formatter Settings
//!
//! Resolves the [`FormatterConfig`] for one transmission from the logger's
//! named setup variables.
//!
//! Resolution never fails. Each option is read independently; an absent value
//! silently takes its default, a malformed one takes its default and logs a
//! warning.
//!
//! | Option | Setup variable | Default |
//! |--------|----------------|---------|
//! | station name | `station name` | `UNKNOWN` |
//! | time offset | `local time offset` | `0` |
//! | missing indicator | `missing indicator` | `MISSING` |
//! | record cap | `max records` | `10` |
//! | missing sentinels | `missing sentinel` | `----` |
//! | channels | `tx channels`, else active `M{n}` labels | none |
//! | timestamp style | `tx timestamp style` | `offset` |
//! | layout | `tx layout` | `records` |
//! | input format | `tx input format` | `columns` |
//! | message limit | `tx max message bytes` | unlimited |

use tracing::{debug, warn};

use crate::device::DeviceVariables;

/// Station name used when the logger has none configured
pub const DEFAULT_STATION_NAME: &str = "UNKNOWN";

/// Text emitted in place of a missing reading
pub const DEFAULT_MISSING_INDICATOR: &str = "MISSING";

/// Default cap on records formatted per transmission
pub const DEFAULT_MAX_RECORDS: usize = 10;

/// Token the logger writes for a missing reading
pub const DEFAULT_MISSING_TOKEN: &str = "----";

/// Number of measurement slots scanned for active channels
pub const MEAS_COUNT: usize = 48;

/// Largest accepted local time offset magnitude (23:59)
pub const MAX_OFFSET_MINUTES: i32 = 23 * 60 + 59;

/// Keys the assembler writes itself; channel labels may not reuse them
pub const RESERVED_KEYS: [&str; 3] = ["timestamp", "station", "location"];

/// How record timestamps are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampStyle {
    /// Local wall time with its offset suffix (`Z` when the offset is zero)
    #[default]
    Offset,
    /// Converted to UTC and suffixed `Z`
    Utc,
}

/// Shape of the output document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// Array of flat objects, one per record
    #[default]
    Records,
    /// Single GeoJSON-style Feature with observations keyed by timestamp
    Feature,
}

/// Shape of the incoming telemetry buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// One line per record: `<timestamp>,<value_1>,...,<value_n>`
    #[default]
    Columns,
    /// The logger's native telemetry rows, one line per measurement:
    /// `MM/DD/YYYY,HH:MM:SS,NAME,VALUE,UNITS,QUALITY`
    Rows,
}

/// Everything the formatter needs to know for one transmission
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterConfig {
    /// Station identifier emitted with every record
    pub station_name: String,

    /// Local time offset from UTC in minutes (e.g. -300 for UTC-5)
    pub time_offset_minutes: i32,

    /// Emitted in place of a missing reading
    pub missing_indicator: String,

    /// Hard cap on records formatted per transmission
    pub max_records: usize,

    /// Measurement labels, in CSV column order after the timestamp
    pub channels: Vec<String>,

    /// Raw tokens the logger uses for "no reading"
    pub missing_tokens: Vec<String>,

    pub timestamp_style: TimestampStyle,

    pub layout: OutputLayout,

    pub input_format: InputFormat,

    /// Split into one message per record above this size
    pub max_message_bytes: Option<usize>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            station_name: DEFAULT_STATION_NAME.to_string(),
            time_offset_minutes: 0,
            missing_indicator: DEFAULT_MISSING_INDICATOR.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
            channels: Vec::new(),
            missing_tokens: vec![DEFAULT_MISSING_TOKEN.to_string()],
            timestamp_style: TimestampStyle::default(),
            layout: OutputLayout::default(),
            input_format: InputFormat::default(),
            max_message_bytes: None,
        }
    }
}

impl FormatterConfig {
    /// Resolve the configuration from the logger's setup variables
    ///
    /// # Arguments
    ///
    /// * `vars` - The logger's setup variables
    ///
    /// # Returns
    ///
    /// * `FormatterConfig` - Fully populated; defaults fill every gap
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry_formatter::device::SetupVariables;
    /// use telemetry_formatter::format::settings::FormatterConfig;
    ///
    /// let vars: SetupVariables = [
    ///     ("station name", "A17_BS_128"),
    ///     ("local time offset", "-300 minutes"),
    ///     ("max records", "not a number"),
    /// ].into_iter().collect();
    ///
    /// let config = FormatterConfig::resolve(&vars);
    /// assert_eq!(config.station_name, "A17_BS_128");
    /// assert_eq!(config.time_offset_minutes, -300);
    /// assert_eq!(config.max_records, 10);
    /// ```
    pub fn resolve(vars: &dyn DeviceVariables) -> Self {
        let defaults = Self::default();

        let station_name = read_text(vars, "station name").unwrap_or(defaults.station_name);

        let time_offset_minutes = read_parsed(vars, "local time offset", parse_offset)
            .unwrap_or(defaults.time_offset_minutes);

        let missing_indicator =
            read_text(vars, "missing indicator").unwrap_or(defaults.missing_indicator);

        let max_records =
            read_parsed(vars, "max records", parse_positive).unwrap_or(defaults.max_records);

        let missing_tokens = read_text(vars, "missing sentinel")
            .map(|raw| split_list(&raw))
            .filter(|tokens| !tokens.is_empty())
            .unwrap_or(defaults.missing_tokens);

        let timestamp_style = read_parsed(vars, "tx timestamp style", parse_timestamp_style)
            .unwrap_or(defaults.timestamp_style);

        let layout = read_parsed(vars, "tx layout", parse_layout).unwrap_or(defaults.layout);

        let input_format = read_parsed(vars, "tx input format", parse_input_format)
            .unwrap_or(defaults.input_format);

        let max_message_bytes = read_parsed(vars, "tx max message bytes", parse_positive);

        let channels = unique_labels(resolve_channel_labels(vars));

        let config = Self {
            station_name,
            time_offset_minutes,
            missing_indicator,
            max_records,
            channels,
            missing_tokens,
            timestamp_style,
            layout,
            input_format,
            max_message_bytes,
        };
        debug!("Resolved formatter config: {:?}", config);
        config
    }

    /// Returns true if `raw` is one of the logger's missing-data tokens
    #[must_use]
    pub fn is_missing_token(&self, raw: &str) -> bool {
        raw.is_empty() || self.missing_tokens.iter().any(|t| t == raw)
    }
}

/// Read a trimmed, non-empty setup value
fn read_text(vars: &dyn DeviceVariables, name: &str) -> Option<String> {
    vars.setup_read(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a setup value, warning when the text is unusable
fn read_parsed<T>(
    vars: &dyn DeviceVariables,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = read_text(vars, name)?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!("Ignoring malformed setup value {:?} = {:?}, using default", name, raw);
    }
    parsed
}

/// Parse "-300 minutes" style offsets (first whitespace token)
fn parse_offset(raw: &str) -> Option<i32> {
    let minutes: i32 = raw.split_whitespace().next()?.parse().ok()?;
    (minutes.abs() <= MAX_OFFSET_MINUTES).then_some(minutes)
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|&n| n > 0)
}

fn parse_timestamp_style(raw: &str) -> Option<TimestampStyle> {
    match raw.to_lowercase().as_str() {
        "offset" | "local" => Some(TimestampStyle::Offset),
        "utc" | "z" => Some(TimestampStyle::Utc),
        _ => None,
    }
}

fn parse_layout(raw: &str) -> Option<OutputLayout> {
    match raw.to_lowercase().as_str() {
        "records" | "array" => Some(OutputLayout::Records),
        "feature" | "geojson" => Some(OutputLayout::Feature),
        _ => None,
    }
}

fn parse_input_format(raw: &str) -> Option<InputFormat> {
    match raw.to_lowercase().as_str() {
        "columns" | "csv" => Some(InputFormat::Columns),
        "rows" | "native" => Some(InputFormat::Rows),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Channel labels, in column order
///
/// An explicit `tx channels` list wins. Otherwise every measurement slot whose
/// `M{n} Active` reads "On" contributes its `M{n} Label`.
fn resolve_channel_labels(vars: &dyn DeviceVariables) -> Vec<String> {
    if let Some(raw) = read_text(vars, "tx channels") {
        // Keep empty entries so column positions are preserved
        return raw.split(',').map(|s| s.trim().to_string()).collect();
    }

    (1..=MEAS_COUNT)
        .filter(|n| {
            vars.setup_read(&format!("M{} Active", n))
                .map(|v| v.to_uppercase().contains("ON"))
                .unwrap_or(false)
        })
        .map(|n| {
            read_text(vars, &format!("M{} Label", n)).unwrap_or_else(|| format!("M{}", n))
        })
        .collect()
}

/// Make every label a usable, unique output key
///
/// Empty labels become `M{n}`; a label repeating an earlier one or a reserved
/// key becomes `{label}_{n}`, n being the 1-based column position.
pub(crate) fn unique_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for (i, label) in labels.into_iter().enumerate() {
        let position = i + 1;
        let label = if label.is_empty() {
            format!("M{}", position)
        } else {
            label
        };

        let clashes = RESERVED_KEYS.contains(&label.as_str()) || out.contains(&label);
        if clashes {
            let renamed = format!("{}_{}", label, position);
            warn!("Channel label {:?} clashes with another key, using {:?}", label, renamed);
            out.push(renamed);
        } else {
            out.push(label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MockDeviceVariables, SetupVariables};

    fn vars(pairs: &[(&str, &str)]) -> SetupVariables {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = FormatterConfig::resolve(&SetupVariables::new());
        assert_eq!(config, FormatterConfig::default());
        assert_eq!(config.station_name, "UNKNOWN");
        assert_eq!(config.time_offset_minutes, 0);
        assert_eq!(config.missing_indicator, "MISSING");
        assert_eq!(config.max_records, 10);
        assert_eq!(config.missing_tokens, vec!["----"]);
        assert!(config.channels.is_empty());
        assert!(config.max_message_bytes.is_none());
    }

    #[test]
    fn test_resolve_full_setup() {
        let config = FormatterConfig::resolve(&vars(&[
            ("station name", "A17_BS_128"),
            ("local time offset", "-300 minutes"),
            ("missing indicator", "NA"),
            ("max records", "25"),
            ("missing sentinel", "----, -99999"),
            ("tx channels", "AT, BP"),
            ("tx timestamp style", "UTC"),
            ("tx layout", "feature"),
            ("tx input format", "Native"),
            ("tx max message bytes", "1024"),
        ]));

        assert_eq!(config.station_name, "A17_BS_128");
        assert_eq!(config.time_offset_minutes, -300);
        assert_eq!(config.missing_indicator, "NA");
        assert_eq!(config.max_records, 25);
        assert_eq!(config.missing_tokens, vec!["----", "-99999"]);
        assert_eq!(config.channels, vec!["AT", "BP"]);
        assert_eq!(config.timestamp_style, TimestampStyle::Utc);
        assert_eq!(config.layout, OutputLayout::Feature);
        assert_eq!(config.input_format, InputFormat::Rows);
        assert_eq!(config.max_message_bytes, Some(1024));
    }

    #[test]
    fn test_malformed_values_fall_back_independently() {
        let config = FormatterConfig::resolve(&vars(&[
            ("station name", "XL2"),
            ("local time offset", "minus five hours"),
            ("max records", "0"),
            ("tx layout", "xml"),
            ("tx input format", "xlsx"),
            ("tx max message bytes", "-1"),
        ]));

        assert_eq!(config.station_name, "XL2");
        assert_eq!(config.time_offset_minutes, 0);
        assert_eq!(config.max_records, DEFAULT_MAX_RECORDS);
        assert_eq!(config.layout, OutputLayout::Records);
        assert_eq!(config.input_format, InputFormat::Columns);
        assert_eq!(config.max_message_bytes, None);
    }

    #[test]
    fn test_offset_out_of_range_uses_default() {
        let config = FormatterConfig::resolve(&vars(&[("local time offset", "1440")]));
        assert_eq!(config.time_offset_minutes, 0);

        let config = FormatterConfig::resolve(&vars(&[("local time offset", "-1439")]));
        assert_eq!(config.time_offset_minutes, -1439);
    }

    #[test]
    fn test_blank_values_are_treated_as_unset() {
        let config = FormatterConfig::resolve(&vars(&[
            ("station name", "   "),
            ("missing indicator", ""),
        ]));
        assert_eq!(config.station_name, DEFAULT_STATION_NAME);
        assert_eq!(config.missing_indicator, DEFAULT_MISSING_INDICATOR);
    }

    #[test]
    fn test_channels_from_active_measurements() {
        let config = FormatterConfig::resolve(&vars(&[
            ("M1 Active", "On"),
            ("M1 Label", "AT"),
            ("M2 Active", "Off"),
            ("M2 Label", "RH"),
            ("M3 Active", "ON"),
            ("M3 Label", "BP"),
            ("M4 Active", "on"),
        ]));

        assert_eq!(config.channels, vec!["AT", "BP", "M4"]);
    }

    #[test]
    fn test_explicit_channel_list_wins_over_measurement_scan() {
        let config = FormatterConfig::resolve(&vars(&[
            ("tx channels", "WSM,WDD"),
            ("M1 Active", "On"),
            ("M1 Label", "AT"),
        ]));
        assert_eq!(config.channels, vec!["WSM", "WDD"]);
    }

    #[test]
    fn test_duplicate_and_reserved_labels_are_renamed() {
        let config = FormatterConfig::resolve(&vars(&[("tx channels", "AT,,AT,station")]));
        assert_eq!(config.channels, vec!["AT", "M2", "AT_3", "station_4"]);
    }

    #[test]
    fn test_is_missing_token() {
        let config = FormatterConfig::default();
        assert!(config.is_missing_token(""));
        assert!(config.is_missing_token("----"));
        assert!(!config.is_missing_token("23.5"));
    }

    #[test]
    fn test_resolver_uses_device_trait() {
        let mut mock = MockDeviceVariables::new();
        mock.expect_setup_read().returning(|name| {
            name.eq_ignore_ascii_case("station name")
                .then(|| "MOCKED".to_string())
        });

        let config = FormatterConfig::resolve(&mock);
        assert_eq!(config.station_name, "MOCKED");
        assert_eq!(config.max_records, DEFAULT_MAX_RECORDS);
    }
}
