/// Turns the cached sensor state into one immutable sample per publish period
use crate::clock::Clock;
use crate::models::{CivilTimestamp, DeviceIdentity, Sample};
use crate::sensors::SensorCache;

/// Build a sample from the cache, the clock and the device identity
///
/// Reading and latch are captured together and the latch is cleared inside the
/// same critical section, so a rising edge reported by the sampler during this
/// call lands either in this sample or in the next one, never in neither.
/// Never fails: an unsynchronized clock yields `CivilTimestamp::Unsynced`.
pub fn assemble(cache: &SensorCache, clock: &dyn Clock, identity: &DeviceIdentity) -> Sample {
    let (reading, latched) = cache.latch_and_fetch();

    let local_time = if clock.is_synchronized() {
        let now = clock.now_local();
        // Wire format carries whole seconds only
        CivilTimestamp::Synced(now.replace_nanosecond(0).unwrap_or(now))
    } else {
        CivilTimestamp::Unsynced
    };

    Sample {
        local_time,
        temperature_c: reading.temperature_c,
        illuminance_lux: reading.illuminance_lux,
        motion: reading.motion_instant || latched,
        device_building: identity.building().to_string(),
        device_number: identity.number().to_string(),
    }
}
