/// Sensor access seen by the sampling loop
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor not configured")]
    NotConfigured,
    #[error("sensor I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unparseable sensor value: {0:?}")]
    InvalidData(String),
}

/// Capability for reading the physical sensors
///
/// Every call may fail independently; callers decide what a failure means.
/// Motion is a plain level read and has no failure outcome.
pub trait SensorSource: Send + Sync {
    fn read_temperature(&self) -> Result<f64, SensorError>;

    fn read_illuminance(&self) -> Result<f64, SensorError>;

    fn read_motion_level(&self) -> bool;
}
