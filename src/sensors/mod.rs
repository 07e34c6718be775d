pub mod cache;
pub mod source;
pub mod sysfs;

#[cfg(test)]
pub mod fake;

pub use cache::SensorCache;
pub use source::{SensorError, SensorSource};
pub use sysfs::SysfsSensors;
