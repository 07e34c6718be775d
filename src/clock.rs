/// Wall-clock capability and the system implementation
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::timezone::TzRule;

/// Earliest plausible synced time (2023-11-14); anything before means SNTP has not run yet
pub const SYNC_EPOCH_THRESHOLD: i64 = 1_700_000_000;

pub trait Clock: Send + Sync {
    /// Local civil time under the configured zone rule
    fn now_local(&self) -> PrimitiveDateTime;

    fn is_synchronized(&self) -> bool;
}

/// System time with a POSIX TZ rule applied; synchronization is judged from the epoch value
#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: TzRule,
}

impl SystemClock {
    pub fn new(tz: TzRule) -> Self {
        SystemClock { tz }
    }

    pub fn tz(&self) -> &TzRule {
        &self.tz
    }
}

impl Clock for SystemClock {
    fn now_local(&self) -> PrimitiveDateTime {
        let local = self.tz.to_local(OffsetDateTime::now_utc());
        PrimitiveDateTime::new(local.date(), local.time())
    }

    fn is_synchronized(&self) -> bool {
        OffsetDateTime::now_utc().unix_timestamp() >= SYNC_EPOCH_THRESHOLD
    }
}
