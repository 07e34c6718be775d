/// Bounded FIFO of samples waiting for delivery
use log::warn;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::models::Sample;

pub const DEFAULT_CAPACITY: usize = 20;

/// One producer (assembler) appends, one consumer (uploader) snapshots and drains.
///
/// The lock only covers in-memory bookkeeping and is never held across a send,
/// so `append` fails fast on a full buffer instead of waiting.
#[derive(Debug)]
pub struct DeliveryBuffer {
    samples: Mutex<VecDeque<Sample>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl Default for DeliveryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DeliveryBuffer {
    pub fn new(capacity: usize) -> Self {
        DeliveryBuffer {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Sample>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a sample; a full buffer rejects the new sample and stays unchanged
    pub fn append(&self, sample: Sample) -> bool {
        let mut samples = self.lock();
        if samples.len() >= self.capacity {
            drop(samples);
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Delivery buffer full ({} samples) - sample dropped ({} dropped so far)",
                self.capacity, dropped
            );
            return false;
        }
        samples.push_back(sample);
        true
    }

    /// Copy of everything currently queued, oldest first
    pub fn snapshot_for_send(&self) -> Vec<Sample> {
        self.lock().iter().cloned().collect()
    }

    /// Remove the `n` oldest samples after their delivery was confirmed
    ///
    /// Samples appended after the snapshot sit behind those `n` and are kept.
    /// Returns how many were actually removed.
    pub fn drain(&self, n: usize) -> usize {
        let mut samples = self.lock();
        let n = if n > samples.len() {
            warn!(
                "Drain of {} requested but only {} buffered",
                n,
                samples.len()
            );
            samples.len()
        } else {
            n
        };
        samples.drain(..n);
        n
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples rejected because the buffer was full, since startup
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
