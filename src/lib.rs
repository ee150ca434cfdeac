//! # Telemetry Formatter Library
//!
//! Format scheduled data-logger CSV telemetry into JSON for publication.
//!
//! This library provides the formatter a remote environmental data logger
//! calls once per scheduled transmission: it reads the logger's setup
//! variables, parses the CSV telemetry buffer and returns a JSON payload
//! ready to be sent verbatim to a message broker.

pub mod config;
pub mod device;
pub mod error;
pub mod format;
