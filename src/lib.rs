//! Multi-rate telemetry node
//!
//! A fast sampler keeps [`sensors::SensorCache`] fresh and latches motion
//! edges, a slower publisher turns the cache into immutable [`models::Sample`]s
//! queued in a bounded [`delivery::DeliveryBuffer`], and an uploader posts the
//! queue as one JSON batch per cycle, draining it only on confirmed delivery.

pub mod assembler;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod models;
pub mod sensors;
pub mod timezone;
pub mod utils;
