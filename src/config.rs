use log::warn;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::delivery::buffer::DEFAULT_CAPACITY;
use crate::models::{DeviceIdentity, IDENTITY_FIELD_MAX_CHARS};
use crate::timezone::{TzParseError, TzRule};

const DEFAULT_BUILDING: &str = "Ficus";
const DEFAULT_NUMBER: &str = "101";
const DEFAULT_TZ_RULE: &str = "IST-2IDT,M3.4.4/26,M10.5.0";
const DEFAULT_TEMPERATURE_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("TZ_RULE is invalid: {0}")]
    TimeZone(#[from] TzParseError),
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub collector_url: Url,
    pub require_https: bool,
    pub ca_cert_path: Option<PathBuf>,
    pub identity: DeviceIdentity,
    pub buffer_capacity: usize,
    pub sample_interval: Duration,
    pub publish_interval: Duration,
    pub upload_interval: Duration,
    pub request_timeout: Duration,
    pub max_backoff: Duration,
    pub tz_rule: TzRule,
    pub temperature_path: Option<PathBuf>,
    pub illuminance_path: Option<PathBuf>,
    pub motion_path: Option<PathBuf>,
    pub log_payload: bool,
}

impl NodeConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_url = get("COLLECTOR_URL").ok_or(ConfigError::Missing("COLLECTOR_URL"))?;
        let collector_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            key: "COLLECTOR_URL",
            value: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let require_https = parse_or(&get, "REQUIRE_HTTPS", true)?;
        if require_https && collector_url.scheme() != "https" {
            return Err(ConfigError::Invalid {
                key: "COLLECTOR_URL",
                value: raw_url,
                reason: "https is required (set REQUIRE_HTTPS=false to allow)".into(),
            });
        }

        let building = get("DEVICE_BUILDING").unwrap_or_else(|| DEFAULT_BUILDING.to_string());
        let number = get("DEVICE_NUMBER").unwrap_or_else(|| DEFAULT_NUMBER.to_string());
        for (key, value) in [("DEVICE_BUILDING", &building), ("DEVICE_NUMBER", &number)] {
            if value.chars().count() > IDENTITY_FIELD_MAX_CHARS {
                warn!(
                    "{} longer than {} characters, truncating: {}",
                    key, IDENTITY_FIELD_MAX_CHARS, value
                );
            }
        }

        let buffer_capacity: usize = parse_or(&get, "BUFFER_CAPACITY", DEFAULT_CAPACITY)?;
        if buffer_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "BUFFER_CAPACITY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let sample_interval = Duration::from_millis(positive(&get, "SAMPLE_INTERVAL_MS", 100)?);
        let publish_interval = Duration::from_secs(positive(&get, "PUBLISH_INTERVAL_SECS", 10)?);
        let upload_interval = Duration::from_secs(positive(&get, "UPLOAD_INTERVAL_SECS", 10)?);
        let request_timeout = Duration::from_secs(positive(&get, "REQUEST_TIMEOUT_SECS", 10)?);
        let max_backoff = Duration::from_secs(parse_or(&get, "UPLOAD_MAX_BACKOFF_SECS", 0)?);

        let tz_rule = TzRule::parse(&get("TZ_RULE").unwrap_or_else(|| DEFAULT_TZ_RULE.into()))?;

        Ok(NodeConfig {
            collector_url,
            require_https,
            ca_cert_path: get("CA_CERT_PATH").map(PathBuf::from),
            identity: DeviceIdentity::new(&building, &number),
            buffer_capacity,
            sample_interval,
            publish_interval,
            upload_interval,
            request_timeout,
            max_backoff,
            tz_rule,
            temperature_path: Some(PathBuf::from(
                get("TEMPERATURE_PATH").unwrap_or_else(|| DEFAULT_TEMPERATURE_PATH.into()),
            )),
            illuminance_path: get("ILLUMINANCE_PATH").map(PathBuf::from),
            motion_path: get("MOTION_PATH").map(PathBuf::from),
            log_payload: parse_or(&get, "LOG_PAYLOAD", false)?,
        })
    }

    /// Upload cycles the backoff may skip in a row
    pub fn max_backoff_cycles(&self) -> u32 {
        let interval = self.upload_interval.as_secs().max(1);
        u32::try_from(self.max_backoff.as_secs() / interval).unwrap_or(u32::MAX)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn positive<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("COLLECTOR_URL", "https://collector.example/sensors/upload")]).unwrap();
        assert_eq!(cfg.buffer_capacity, 20);
        assert_eq!(cfg.sample_interval, Duration::from_millis(100));
        assert_eq!(cfg.publish_interval, Duration::from_secs(10));
        assert_eq!(cfg.upload_interval, Duration::from_secs(10));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.identity, DeviceIdentity::new("Ficus", "101"));
        assert_eq!(cfg.tz_rule, TzRule::parse(DEFAULT_TZ_RULE).unwrap());
        assert_eq!(cfg.max_backoff_cycles(), 0);
        assert!(cfg.illuminance_path.is_none());
        assert!(!cfg.log_payload);
    }

    #[test]
    fn collector_url_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("COLLECTOR_URL"))));
        assert!(matches!(
            config(&[("COLLECTOR_URL", "   ")]),
            Err(ConfigError::Missing("COLLECTOR_URL"))
        ));
    }

    #[test]
    fn plain_http_needs_opt_out() {
        let err = config(&[("COLLECTOR_URL", "http://10.0.0.2:8080/upload")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "COLLECTOR_URL", .. }));

        let cfg = config(&[
            ("COLLECTOR_URL", "http://10.0.0.2:8080/upload"),
            ("REQUIRE_HTTPS", "false"),
        ])
        .unwrap();
        assert!(!cfg.require_https);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("COLLECTOR_URL", "https://collector.example/up"),
            ("DEVICE_BUILDING", "Oak Conference Centre"),
            ("DEVICE_NUMBER", "B-12"),
            ("BUFFER_CAPACITY", "3"),
            ("UPLOAD_INTERVAL_SECS", "10"),
            ("UPLOAD_MAX_BACKOFF_SECS", "300"),
            ("TZ_RULE", "UTC0"),
            ("MOTION_PATH", "/sys/class/gpio/gpio27/value"),
            ("LOG_PAYLOAD", "true"),
        ])
        .unwrap();
        assert_eq!(cfg.identity.building(), "Oak Conference ");
        assert_eq!(cfg.identity.number(), "B-12");
        assert_eq!(cfg.buffer_capacity, 3);
        assert_eq!(cfg.max_backoff_cycles(), 30);
        assert_eq!(cfg.tz_rule, TzRule::utc());
        assert_eq!(
            cfg.motion_path,
            Some(PathBuf::from("/sys/class/gpio/gpio27/value"))
        );
        assert!(cfg.log_payload);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let base = ("COLLECTOR_URL", "https://collector.example/up");
        assert!(matches!(
            config(&[base, ("BUFFER_CAPACITY", "0")]),
            Err(ConfigError::Invalid { key: "BUFFER_CAPACITY", .. })
        ));
        assert!(matches!(
            config(&[base, ("SAMPLE_INTERVAL_MS", "fast")]),
            Err(ConfigError::Invalid { key: "SAMPLE_INTERVAL_MS", .. })
        ));
        assert!(matches!(
            config(&[base, ("PUBLISH_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { key: "PUBLISH_INTERVAL_SECS", .. })
        ));
        assert!(matches!(
            config(&[base, ("TZ_RULE", "nope")]),
            Err(ConfigError::TimeZone(_))
        ));
    }
}
