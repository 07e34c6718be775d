use time::PrimitiveDateTime;

/// Longest building/number string carried in a sample
pub const IDENTITY_FIELD_MAX_CHARS: usize = 15;

/// Latest known value of every sensor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub temperature_c: f64,
    pub illuminance_lux: f64,
    pub motion_instant: bool,
}

/// Local wall-clock time of a sample, or the marker for a clock that has not synced yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CivilTimestamp {
    Synced(PrimitiveDateTime),
    Unsynced,
}

impl CivilTimestamp {
    pub fn is_synced(&self) -> bool {
        matches!(self, CivilTimestamp::Synced(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    building: String,
    number: String,
}

impl DeviceIdentity {
    /// Build an identity, cutting each field to `IDENTITY_FIELD_MAX_CHARS` characters
    pub fn new(building: &str, number: &str) -> Self {
        DeviceIdentity {
            building: truncate_chars(building, IDENTITY_FIELD_MAX_CHARS),
            number: truncate_chars(number, IDENTITY_FIELD_MAX_CHARS),
        }
    }

    pub fn building(&self) -> &str {
        &self.building
    }

    pub fn number(&self) -> &str {
        &self.number
    }
}

/// One assembled observation, never mutated once built
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub local_time: CivilTimestamp,
    pub temperature_c: f64,
    pub illuminance_lux: f64,
    pub motion: bool,
    pub device_building: String,
    pub device_number: String,
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
