/// JSON batch format accepted by the collector
///
/// A batch is an array with one object per sample, fields in this order:
/// `date` (YYYY-MM-DD), `time` (HH:MM:SS), `temp`, `lux`, `motion`,
/// `building`, `number`. Samples taken before the clock synced carry
/// `"UNSYNCED"` in both `date` and `time`.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

use crate::models::{CivilTimestamp, Sample};

pub const UNSYNCED_MARKER: &str = "UNSYNCED";

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
    #[error("timestamp parsing failed: {0}")]
    Parse(#[from] time::error::Parse),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire record; field order here is the order on the wire
#[derive(Debug, Serialize, Deserialize)]
struct SampleRecord<'a> {
    date: String,
    time: String,
    temp: f64,
    lux: f64,
    motion: bool,
    #[serde(borrow)]
    building: std::borrow::Cow<'a, str>,
    #[serde(borrow)]
    number: std::borrow::Cow<'a, str>,
}

fn split_timestamp(local_time: &CivilTimestamp) -> Result<(String, String), PayloadError> {
    match local_time {
        CivilTimestamp::Synced(dt) => Ok((dt.format(DATE_FORMAT)?, dt.format(TIME_FORMAT)?)),
        CivilTimestamp::Unsynced => Ok((UNSYNCED_MARKER.to_string(), UNSYNCED_MARKER.to_string())),
    }
}

fn join_timestamp(date: &str, time: &str) -> Result<CivilTimestamp, PayloadError> {
    if date == UNSYNCED_MARKER || time == UNSYNCED_MARKER {
        return Ok(CivilTimestamp::Unsynced);
    }
    let date = Date::parse(date, DATE_FORMAT)?;
    let time = Time::parse(time, TIME_FORMAT)?;
    Ok(CivilTimestamp::Synced(PrimitiveDateTime::new(date, time)))
}

/// Serialize samples, in order, into one batch body
pub fn encode_batch(samples: &[Sample]) -> Result<Vec<u8>, PayloadError> {
    let records = samples
        .iter()
        .map(|s| -> Result<SampleRecord<'_>, PayloadError> {
            let (date, time) = split_timestamp(&s.local_time)?;
            Ok(SampleRecord {
                date,
                time,
                temp: s.temperature_c,
                lux: s.illuminance_lux,
                motion: s.motion,
                building: s.device_building.as_str().into(),
                number: s.device_number.as_str().into(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(serde_json::to_vec(&records)?)
}

/// Parse a batch body back into samples
pub fn decode_batch(body: &[u8]) -> Result<Vec<Sample>, PayloadError> {
    let records: Vec<SampleRecord<'_>> = serde_json::from_slice(body)?;
    records
        .into_iter()
        .map(|r| -> Result<Sample, PayloadError> {
            Ok(Sample {
                local_time: join_timestamp(&r.date, &r.time)?,
                temperature_c: r.temp,
                illuminance_lux: r.lux,
                motion: r.motion,
                device_building: r.building.into_owned(),
                device_number: r.number.into_owned(),
            })
        })
        .collect()
}
