//! Scriptable sensor source for tests
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::sensors::source::{SensorError, SensorSource};

#[derive(Default)]
pub struct FakeSource {
    temperature: Mutex<Option<f64>>,
    illuminance: Mutex<Option<f64>>,
    motion: AtomicBool,
}

impl FakeSource {
    pub fn new() -> Self {
        FakeSource {
            temperature: Mutex::new(Some(0.0)),
            illuminance: Mutex::new(Some(0.0)),
            motion: AtomicBool::new(false),
        }
    }

    pub fn set_temperature(&self, value: Result<f64, ()>) {
        *self.temperature.lock().unwrap() = value.ok();
    }

    pub fn set_illuminance(&self, value: Result<f64, ()>) {
        *self.illuminance.lock().unwrap() = value.ok();
    }

    pub fn fail_temperature(&self) {
        self.set_temperature(Err(()));
    }

    pub fn set_motion(&self, level: bool) {
        self.motion.store(level, Ordering::SeqCst);
    }
}

impl SensorSource for FakeSource {
    fn read_temperature(&self) -> Result<f64, SensorError> {
        self.temperature
            .lock()
            .unwrap()
            .ok_or_else(|| SensorError::InvalidData("scripted failure".into()))
    }

    fn read_illuminance(&self) -> Result<f64, SensorError> {
        self.illuminance
            .lock()
            .unwrap()
            .ok_or_else(|| SensorError::InvalidData("scripted failure".into()))
    }

    fn read_motion_level(&self) -> bool {
        self.motion.load(Ordering::SeqCst)
    }
}
