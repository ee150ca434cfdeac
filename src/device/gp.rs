//! # General Purpose Variables
//!
//! The logger exposes 32 operator-editable variable slots, each with a label
//! and a value (`GP1 label`, `GP1 value`, ...). Station location is carried in
//! slots labelled `Latitude`, `Longitude` and `Elevation`.

use super::DeviceVariables;

/// Number of general purpose variable slots on the logger
pub const GP_COUNT: usize = 32;

/// Returns true if `index` names an existing GP slot (1-based)
#[must_use]
pub fn gp_index_valid(index: usize) -> bool {
    (1..=GP_COUNT).contains(&index)
}

/// Read the operator label of a GP slot
///
/// Returns `None` for an invalid index or an unset label.
pub fn read_label(vars: &dyn DeviceVariables, index: usize) -> Option<String> {
    if !gp_index_valid(index) {
        return None;
    }
    vars.setup_read(&format!("GP{} label", index))
}

/// Read the raw value text of a GP slot
///
/// Returns `None` for an invalid index or an unset value.
pub fn read_value(vars: &dyn DeviceVariables, index: usize) -> Option<String> {
    if !gp_index_valid(index) {
        return None;
    }
    vars.setup_read(&format!("GP{} value", index))
}

/// Find the value of the first GP slot whose label matches `label`
///
/// Labels are compared trimmed and case-insensitively. Slots are searched in
/// index order, so the lowest-numbered match wins.
///
/// # Examples
///
/// ```
/// use telemetry_formatter::device::SetupVariables;
/// use telemetry_formatter::device::gp::find_value_by_label;
///
/// let vars: SetupVariables = [
///     ("GP3 label", "Elevation"),
///     ("GP3 value", "88.0"),
/// ].into_iter().collect();
///
/// assert_eq!(find_value_by_label(&vars, "elevation").as_deref(), Some("88.0"));
/// assert_eq!(find_value_by_label(&vars, "latitude"), None);
/// ```
pub fn find_value_by_label(vars: &dyn DeviceVariables, label: &str) -> Option<String> {
    let wanted = label.trim();
    (1..=GP_COUNT)
        .find(|&index| {
            read_label(vars, index)
                .map(|l| l.trim().eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        })
        .and_then(|index| read_value(vars, index))
}
