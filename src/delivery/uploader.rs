/// Periodic batch delivery with keep-on-failure semantics
use log::{error, info, warn};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::delivery::buffer::DeliveryBuffer;
use crate::delivery::payload::{encode_batch, PayloadError};
use crate::delivery::transport::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("batch serialization failed: {0}")]
    Serialization(#[from] PayloadError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("collector answered HTTP {0}")]
    Status(u16),
}

/// Result of one send cycle
#[derive(Debug)]
pub enum Outcome {
    /// Delivered and drained this many samples
    Sent(usize),
    /// Nothing buffered, no request made
    Empty,
    /// Nothing drained; the same samples go out again next cycle
    Failed(UploadError),
}

#[derive(Debug, Clone)]
pub struct Uploader {
    endpoint: Url,
    request_timeout: Duration,
    log_payload: bool,
}

impl Uploader {
    pub fn new(endpoint: Url, request_timeout: Duration) -> Self {
        Uploader {
            endpoint,
            request_timeout,
            log_payload: false,
        }
    }

    /// Echo each JSON payload to the log before posting it
    pub fn with_payload_logging(mut self, enable: bool) -> Self {
        self.log_payload = enable;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send everything currently buffered as one batch
    ///
    /// Only a 2xx answer drains, and it drains exactly the samples that were
    /// serialized; samples appended while the request was in flight stay queued.
    pub async fn send_cycle(&self, buffer: &DeliveryBuffer, transport: &dyn Transport) -> Outcome {
        let batch = buffer.snapshot_for_send();
        if batch.is_empty() {
            return Outcome::Empty;
        }
        let count = batch.len();

        let body = match encode_batch(&batch) {
            Ok(body) => body,
            Err(e) => {
                error!("Could not serialize {} sample(s): {}", count, e);
                return Outcome::Failed(e.into());
            }
        };

        info!("Preparing to POST {} sample(s) to {}", count, self.endpoint);
        if self.log_payload {
            info!("JSON payload: {}", String::from_utf8_lossy(&body));
        }

        let reply = tokio::time::timeout(
            self.request_timeout,
            transport.post_json(&self.endpoint, body),
        )
        .await;

        match reply {
            Ok(Ok(status)) if status.is_success() => {
                info!(
                    "HTTP status: {}, content-length: {}",
                    status.status, status.content_length
                );
                let drained = buffer.drain(count);
                info!("Upload OK - cleared {} buffered sample(s)", drained);
                Outcome::Sent(drained)
            }
            Ok(Ok(status)) => {
                warn!(
                    "Upload failed (status {}) - keeping {} sample(s) buffered",
                    status.status,
                    buffer.len()
                );
                Outcome::Failed(UploadError::Status(status.status))
            }
            Ok(Err(e)) => {
                error!(
                    "POST failed: {} - keeping {} sample(s) buffered",
                    e,
                    buffer.len()
                );
                Outcome::Failed(e.into())
            }
            Err(_) => {
                error!(
                    "POST timed out after {:?} - keeping {} sample(s) buffered",
                    self.request_timeout,
                    buffer.len()
                );
                Outcome::Failed(UploadError::Timeout(self.request_timeout))
            }
        }
    }
}

/// Skips upload cycles after consecutive failures, doubling up to a cap
///
/// With a cap of zero every cycle is attempted.
#[derive(Debug, Clone)]
pub struct Backoff {
    max_skip_cycles: u32,
    consecutive_failures: u32,
    skip_remaining: u32,
}

impl Backoff {
    pub fn new(max_skip_cycles: u32) -> Self {
        Backoff {
            max_skip_cycles,
            consecutive_failures: 0,
            skip_remaining: 0,
        }
    }

    /// Whether this cycle should attempt a send; consumes one skipped cycle otherwise
    pub fn ready(&mut self) -> bool {
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            false
        } else {
            true
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Failed(_) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let wanted = 1u32
                    .checked_shl(self.consecutive_failures)
                    .map_or(u32::MAX, |v| v - 1);
                self.skip_remaining = wanted.min(self.max_skip_cycles);
            }
            Outcome::Sent(_) | Outcome::Empty => {
                self.consecutive_failures = 0;
                self.skip_remaining = 0;
            }
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
