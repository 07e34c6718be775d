/// Linux sysfs-backed sensors (thermal zone, IIO light sensor, GPIO value file)
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sensors::source::{SensorError, SensorSource};

/// Thermal zone and hwmon files report millidegrees Celsius
const MILLIDEGREES_PER_DEGREE: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct SysfsSensors {
    temperature_path: Option<PathBuf>,
    illuminance_path: Option<PathBuf>,
    motion_path: Option<PathBuf>,
}

impl SysfsSensors {
    pub fn new(
        temperature_path: Option<PathBuf>,
        illuminance_path: Option<PathBuf>,
        motion_path: Option<PathBuf>,
    ) -> Self {
        SysfsSensors {
            temperature_path,
            illuminance_path,
            motion_path,
        }
    }
}

fn read_value(path: Option<&Path>) -> Result<f64, SensorError> {
    let path = path.ok_or(SensorError::NotConfigured)?;
    let raw = fs::read_to_string(path)?;
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| SensorError::InvalidData(trimmed.to_string()))
}

impl SensorSource for SysfsSensors {
    fn read_temperature(&self) -> Result<f64, SensorError> {
        let milli = read_value(self.temperature_path.as_deref())?;
        // Two decimals, same as the compensated BME280 output
        Ok((milli / MILLIDEGREES_PER_DEGREE * 100.0).round() / 100.0)
    }

    fn read_illuminance(&self) -> Result<f64, SensorError> {
        let lux = read_value(self.illuminance_path.as_deref())?;
        Ok((lux * 10.0).round() / 10.0)
    }

    fn read_motion_level(&self) -> bool {
        let Some(path) = self.motion_path.as_deref() else {
            return false;
        };
        match fs::read_to_string(path) {
            Ok(raw) => raw.trim() != "0",
            Err(e) => {
                warn!("Motion GPIO read failed ({}): {}", path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "telemetry-node-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_millidegree_temperature() {
        let path = temp_file("temp", "23456\n");
        let sensors = SysfsSensors::new(Some(path.clone()), None, None);
        assert_eq!(sensors.read_temperature().unwrap(), 23.46);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_paths_fail_without_panicking() {
        let sensors = SysfsSensors::new(None, Some(PathBuf::from("/nonexistent/lux")), None);
        assert!(matches!(
            sensors.read_temperature(),
            Err(SensorError::NotConfigured)
        ));
        assert!(matches!(sensors.read_illuminance(), Err(SensorError::Io(_))));
        assert!(!sensors.read_motion_level());
    }

    #[test]
    fn garbage_value_is_invalid_data() {
        let path = temp_file("lux", "n/a\n");
        let sensors = SysfsSensors::new(None, Some(path.clone()), None);
        assert!(matches!(
            sensors.read_illuminance(),
            Err(SensorError::InvalidData(ref v)) if v == "n/a"
        ));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn gpio_value_maps_to_motion_level() {
        let path = temp_file("gpio", "1\n");
        let sensors = SysfsSensors::new(None, None, Some(path.clone()));
        assert!(sensors.read_motion_level());
        fs::write(&path, "0\n").unwrap();
        assert!(!sensors.read_motion_level());
        fs::remove_file(path).unwrap();
    }
}
