//! # Transmission Entry Point
//!
//! The function the host scheduler calls once per transmission window.
//!
//! Whatever happens inside, the host always receives syntactically valid
//! JSON: errors and panics are caught here and replaced by an empty array.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use super::assembler::{assemble, FeatureDocument, OutputEntry};
use super::location::StationMetadata;
use super::parser::parse_buffer;
use super::settings::{FormatterConfig, OutputLayout};
use crate::device::DeviceVariables;
use crate::error::{FormatterError, Result};

/// Payload returned when formatting fails
pub const EMPTY_PAYLOAD: &str = "[]";

/// Formatted output for one transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transmission {
    /// The whole document in one message
    Single(String),
    /// One self-contained JSON message per record
    Split(Vec<String>),
}

// A transmission always carries at least one message
#[allow(clippy::len_without_is_empty)]
impl Transmission {
    /// The messages to hand to the transport, in order
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        match self {
            Self::Single(message) => vec![message.as_str()],
            Self::Split(messages) => messages.iter().map(String::as_str).collect(),
        }
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Split(messages) => messages.len(),
        }
    }

    /// The payload as one string; split messages are joined one per line
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Single(message) => message,
            Self::Split(messages) => messages.join("\n"),
        }
    }

    fn empty() -> Self {
        Self::Single(EMPTY_PAYLOAD.to_string())
    }
}

/// Format a telemetry buffer using the logger's setup variables
///
/// Resolves the formatter config and station metadata, then formats the
/// buffer. Never fails and never panics back to the caller.
///
/// # Arguments
///
/// * `buffer` - Raw CSV telemetry as supplied by the scheduler
/// * `vars` - The logger's setup variables
///
/// # Examples
///
/// ```
/// use telemetry_formatter::device::SetupVariables;
/// use telemetry_formatter::format::transmit::tx_format;
///
/// let vars: SetupVariables = [
///     ("station name", "A17"),
///     ("tx channels", "AT"),
/// ].into_iter().collect();
///
/// let out = tx_format("2024-06-01 10:00:00,23.5", &vars).into_text();
/// assert_eq!(
///     out,
///     r#"[{"timestamp":"2024-06-01T10:00:00Z","station":"A17","location":{"lat":-1.0,"lon":-1.0,"elev":-1.0},"AT":23.5}]"#
/// );
/// ```
pub fn tx_format(buffer: &str, vars: &dyn DeviceVariables) -> Transmission {
    guarded(|| {
        let config = FormatterConfig::resolve(vars);
        let station = StationMetadata::resolve(vars, &config);
        try_format(buffer, &config, &station)
    })
}

/// Format a telemetry buffer with an already resolved configuration
///
/// Never fails and never panics back to the caller.
pub fn format_transmission(
    buffer: &str,
    config: &FormatterConfig,
    station: &StationMetadata,
) -> Transmission {
    guarded(|| try_format(buffer, config, station))
}

/// Run `f`, converting any error or panic into the empty payload
fn guarded<F>(f: F) -> Transmission
where
    F: FnOnce() -> Result<Transmission>,
{
    let outcome = catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(FormatterError::Internal(reason))
    });

    match outcome {
        Ok(transmission) => transmission,
        Err(e) => {
            error!("Formatting failed, sending empty payload: {}", e);
            Transmission::empty()
        }
    }
}

/// Format a buffer, propagating failures
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn try_format(
    buffer: &str,
    config: &FormatterConfig,
    station: &StationMetadata,
) -> Result<Transmission> {
    let report = parse_buffer(buffer, config);
    let entries = assemble(station, config, &report.records);
    info!(
        "Formatted {} record(s) for station {}",
        entries.len(),
        station.name
    );

    match config.layout {
        OutputLayout::Records => records_transmission(&entries, config.max_message_bytes),
        OutputLayout::Feature => feature_transmission(station, &entries, config.max_message_bytes),
    }
}

fn records_transmission(entries: &[OutputEntry], limit: Option<usize>) -> Result<Transmission> {
    let document = serde_json::to_string(entries)?;
    if fits(&document, limit) || entries.is_empty() {
        return Ok(Transmission::Single(document));
    }

    let messages = entries
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(split(messages, limit))
}

fn feature_transmission(
    station: &StationMetadata,
    entries: &[OutputEntry],
    limit: Option<usize>,
) -> Result<Transmission> {
    let document = serde_json::to_string(&FeatureDocument::from_entries(station, entries))?;
    if fits(&document, limit) || entries.len() <= 1 {
        return Ok(Transmission::Single(document));
    }

    let messages = entries
        .iter()
        .map(|entry| {
            let single = FeatureDocument::from_entries(station, std::slice::from_ref(entry));
            serde_json::to_string(&single)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(split(messages, limit))
}

fn fits(document: &str, limit: Option<usize>) -> bool {
    limit.map_or(true, |max| document.len() <= max)
}

fn split(messages: Vec<String>, limit: Option<usize>) -> Transmission {
    debug!("Document over message limit, splitting into {} messages", messages.len());
    for message in &messages {
        if !fits(message, limit) {
            warn!(
                "Single record message is {} bytes, over the {:?} byte limit",
                message.len(),
                limit
            );
        }
    }
    Transmission::Split(messages)
}
