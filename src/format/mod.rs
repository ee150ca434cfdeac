//! # Format Module
//!
//! Converts the logger's CSV telemetry buffer into JSON for publication.
//!
//! This module handles:
//! - Resolving formatter settings and station location from setup variables
//! - Parsing CSV records or native measurement rows, bounded by the record cap
//! - Normalizing device timestamps to ISO-8601
//! - Assembling the JSON document with missing-data substitution
//! - The transmission entry point, which never fails back to the scheduler

pub mod assembler;
pub mod location;
pub mod parser;
pub mod rows;
pub mod settings;
pub mod timestamp;
pub mod transmit;

pub use location::{Location, StationMetadata};
pub use settings::FormatterConfig;
pub use transmit::{format_transmission, tx_format, Transmission};
