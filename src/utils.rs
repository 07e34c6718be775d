/// Utility functions for log formatting
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::delivery::payload::UNSYNCED_MARKER;
use crate::models::{CivilTimestamp, Reading};

const LOG_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Format a sample timestamp for human-readable logging
///
/// Falls back to the default string representation if formatting fails.
pub fn format_timestamp(ts: &CivilTimestamp) -> String {
    match ts {
        CivilTimestamp::Synced(dt) => dt.format(LOG_FORMAT).unwrap_or_else(|_| dt.to_string()),
        CivilTimestamp::Unsynced => UNSYNCED_MARKER.to_string(),
    }
}

/// One-line summary of the cached sensor values
pub fn format_reading(reading: &Reading) -> String {
    format!(
        "Temp={:.2}C Lux={:.1} Motion={}",
        reading.temperature_c, reading.illuminance_lux, reading.motion_instant
    )
}
