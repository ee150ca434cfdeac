//! # Station Location
//!
//! Reads the station coordinates from the GP variables labelled `Latitude`,
//! `Longitude` and `Elevation`. Each coordinate resolves on its own; one bad
//! value never affects the other two.

use serde::Serialize;
use tracing::warn;

use super::settings::FormatterConfig;
use crate::device::gp::find_value_by_label;
use crate::device::DeviceVariables;

/// Value reported for a coordinate that is unset or unreadable
pub const LOCATION_SENTINEL: f64 = -1.0;

/// Station position as emitted in every record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    /// Latitude in decimal degrees
    pub lat: f64,

    /// Longitude in decimal degrees
    pub lon: f64,

    /// Elevation in metres
    pub elev: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            lat: LOCATION_SENTINEL,
            lon: LOCATION_SENTINEL,
            elev: LOCATION_SENTINEL,
        }
    }
}

impl Location {
    /// Resolve the station location from GP variables
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry_formatter::device::SetupVariables;
    /// use telemetry_formatter::format::location::Location;
    ///
    /// let vars: SetupVariables = [
    ///     ("GP1 label", "Latitude"),
    ///     ("GP1 value", "38.996983"),
    ///     ("GP2 label", "Longitude"),
    ///     ("GP2 value", "garbage"),
    /// ].into_iter().collect();
    ///
    /// let location = Location::resolve(&vars);
    /// assert_eq!(location.lat, 38.996983);
    /// assert_eq!(location.lon, -1.0);
    /// assert_eq!(location.elev, -1.0);
    /// ```
    pub fn resolve(vars: &dyn DeviceVariables) -> Self {
        Self {
            lat: read_coordinate(vars, "latitude"),
            lon: read_coordinate(vars, "longitude"),
            elev: read_coordinate(vars, "elevation"),
        }
    }
}

/// Station identity and position for one transmission
#[derive(Debug, Clone, PartialEq)]
pub struct StationMetadata {
    pub name: String,
    pub location: Location,
}

impl StationMetadata {
    /// Resolve station metadata, taking the name from the resolved config
    pub fn resolve(vars: &dyn DeviceVariables, config: &FormatterConfig) -> Self {
        Self {
            name: config.station_name.clone(),
            location: Location::resolve(vars),
        }
    }
}

fn read_coordinate(vars: &dyn DeviceVariables, label: &str) -> f64 {
    let Some(raw) = find_value_by_label(vars, label) else {
        return LOCATION_SENTINEL;
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            warn!("Unreadable {} value {:?}, reporting {}", label, raw, LOCATION_SENTINEL);
            LOCATION_SENTINEL
        }
    }
}
