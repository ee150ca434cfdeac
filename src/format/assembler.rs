//! # JSON Assembler
//!
//! Turns parsed records into output entries and serializes them.
//!
//! ## Records Layout
//!
//! One flat object per record, keys always in this order:
//!
//! ```json
//! {"timestamp":"2024-06-01T10:00:00Z","station":"A17","location":{"lat":-1.0,"lon":-1.0,"elev":-1.0},"AT":23.5,"BP":"NA"}
//! ```
//!
//! ## Feature Layout
//!
//! A single GeoJSON-style Feature with every record folded into
//! `properties.observations`, keyed by timestamp, values in
//! `observationNames` order.
//!
//! In both layouts a missing reading is written as the configured missing
//! indicator string, never as a number and never left out.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::warn;

use super::location::{Location, StationMetadata};
use super::parser::{ChannelValue, TelemetryRecord};
use super::settings::FormatterConfig;
use super::timestamp::normalize;

/// One measurement as written to JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeasurementField {
    /// Numeric reading
    Number(f64),
    /// Missing indicator text
    Missing(String),
}

/// One output object, built from one record
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEntry {
    pub timestamp: String,
    pub station: String,
    pub location: Location,
    /// `(label, field)` pairs in channel order
    pub measurements: Vec<(String, MeasurementField)>,
}

impl Serialize for OutputEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.measurements.len()))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("station", &self.station)?;
        map.serialize_entry("location", &self.location)?;
        for (label, field) in &self.measurements {
            map.serialize_entry(label, field)?;
        }
        map.end()
    }
}

/// Build one output entry per record
///
/// Records whose timestamp cannot be normalized are left out with a warning;
/// every other record yields exactly one entry, in input order.
///
/// # Arguments
///
/// * `station` - Station name and location
/// * `config` - Offset, timestamp style and missing indicator
/// * `records` - Parsed records, oldest first
pub fn assemble(
    station: &StationMetadata,
    config: &FormatterConfig,
    records: &[TelemetryRecord],
) -> Vec<OutputEntry> {
    records
        .iter()
        .filter_map(|record| {
            match normalize(record.local_time, config.time_offset_minutes, config.timestamp_style) {
                Ok(timestamp) => Some(build_entry(station, config, record, timestamp)),
                Err(e) => {
                    warn!("Dropping record {:?}: {}", record.raw_timestamp, e);
                    None
                }
            }
        })
        .collect()
}

fn build_entry(
    station: &StationMetadata,
    config: &FormatterConfig,
    record: &TelemetryRecord,
    timestamp: String,
) -> OutputEntry {
    let measurements = record
        .values
        .iter()
        .map(|(label, value)| (label.clone(), to_field(*value, config)))
        .collect();

    OutputEntry {
        timestamp,
        station: station.name.clone(),
        location: station.location,
        measurements,
    }
}

fn to_field(value: ChannelValue, config: &FormatterConfig) -> MeasurementField {
    match value {
        ChannelValue::Reading(v) => MeasurementField::Number(v),
        ChannelValue::Missing => MeasurementField::Missing(config.missing_indicator.clone()),
    }
}

/// GeoJSON point geometry: `[lon, lat, elev]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 3],
}

/// Observations keyed by timestamp, in record order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations(pub Vec<(String, Vec<MeasurementField>)>);

impl Serialize for Observations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (timestamp, values) in &self.0 {
            map.serialize_entry(timestamp, values)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureProperties {
    #[serde(rename = "loggerID")]
    pub logger_id: String,
    #[serde(rename = "observationNames")]
    pub observation_names: Vec<String>,
    pub observations: Observations,
}

/// Feature layout document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureDocument {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl FeatureDocument {
    /// Fold output entries into one Feature
    ///
    /// The station name doubles as the logger ID. A timestamp that appears
    /// twice keeps only the later record's values.
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry_formatter::format::assembler::FeatureDocument;
    /// use telemetry_formatter::format::location::{Location, StationMetadata};
    ///
    /// let station = StationMetadata { name: "XL2".to_string(), location: Location::default() };
    /// let doc = FeatureDocument::from_entries(&station, &[]);
    /// let json = serde_json::to_string(&doc).unwrap();
    /// assert!(json.starts_with(r#"{"type":"Feature","geometry":{"type":"Point""#));
    /// ```
    pub fn from_entries(station: &StationMetadata, entries: &[OutputEntry]) -> Self {
        let observation_names = entries
            .first()
            .map(|e| e.measurements.iter().map(|(label, _)| label.clone()).collect())
            .unwrap_or_default();

        let mut observations: Vec<(String, Vec<MeasurementField>)> = Vec::with_capacity(entries.len());
        for entry in entries {
            let values: Vec<MeasurementField> =
                entry.measurements.iter().map(|(_, field)| field.clone()).collect();
            match observations.iter_mut().find(|(ts, _)| *ts == entry.timestamp) {
                Some(existing) => existing.1 = values,
                None => observations.push((entry.timestamp.clone(), values)),
            }
        }

        let Location { lat, lon, elev } = station.location;
        Self {
            kind: "Feature",
            geometry: Geometry {
                kind: "Point",
                coordinates: [lon, lat, elev],
            },
            properties: FeatureProperties {
                logger_id: station.name.clone(),
                observation_names,
                observations: Observations(observations),
            },
        }
    }
}
