//! # Device Variables Module
//!
//! Access to the host logger's named setup variables.
//!
//! This module handles:
//! - Reading named setup values (station name, time offset, measurement setup)
//! - General purpose variables (`GP{n} label` / `GP{n} value`)
//! - An in-memory setup store backed by the configuration file
//!
//! The formatter never writes device variables; it only reads them once per
//! transmission.

pub mod gp;

use std::collections::BTreeMap;

/// Read-only view of the host's named setup variables
///
/// Variable names are matched case-insensitively. An absent variable returns
/// `None`; interpreting the text is left to the resolvers.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceVariables {
    /// Read the raw text of a setup variable
    fn setup_read(&self, name: &str) -> Option<String>;
}

/// Setup variables held in memory
///
/// Keys are stored lowercased so lookups ignore case, the way the logger's
/// own `setup_read` does.
///
/// # Examples
///
/// ```
/// use telemetry_formatter::device::{DeviceVariables, SetupVariables};
///
/// let vars: SetupVariables = [("Station Name", "A17_BS_128")].into_iter().collect();
/// assert_eq!(vars.setup_read("station name").as_deref(), Some("A17_BS_128"));
/// assert_eq!(vars.setup_read("local time offset"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupVariables {
    values: BTreeMap<String, String>,
}

impl SetupVariables {
    /// Create an empty variable store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.values.insert(normalize_name(name.as_ref()), value.into());
    }

    /// Number of variables held
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no variables are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs, names lowercased
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl DeviceVariables for SetupVariables {
    fn setup_read(&self, name: &str) -> Option<String> {
        self.values.get(&normalize_name(name)).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for SetupVariables
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        for (name, value) in iter {
            vars.insert(name, value);
        }
        vars
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
