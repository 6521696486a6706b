//! Time-ordered 64-bit message ids.
//!
//! An id packs, from the high bits down, 42 bits of milliseconds since
//! [`EPOCH_MS`], a 10-bit worker id and a 12-bit per-millisecond sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 2025-01-01T00:00:00Z in Unix milliseconds.
pub const EPOCH_MS: u64 = 1_735_689_600_000;

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// The fields of a generated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeParts {
    /// Unix milliseconds.
    pub timestamp_ms: u64,
    pub worker_id: u16,
    pub sequence: u16,
}

impl SnowflakeParts {
    pub fn of(id: u64) -> Self {
        Self {
            timestamp_ms: (id >> (WORKER_BITS + SEQUENCE_BITS)) + EPOCH_MS,
            worker_id: ((id >> SEQUENCE_BITS) & WORKER_MASK) as u16,
            sequence: (id & SEQUENCE_MASK) as u16,
        }
    }
}

/// Lock-free id generator. Ids from one generator strictly increase.
///
/// The last issued `(elapsed_ms, sequence)` pair is kept packed in a single
/// word. When a millisecond's sequence runs out, or the clock steps back,
/// the generator continues from the last issued pair instead of waiting.
pub struct SnowflakeGenerator {
    worker_id: u64,
    last: AtomicU64,
}

impl SnowflakeGenerator {
    /// Only the low 10 bits of `worker_id` are kept.
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: u64::from(worker_id) & WORKER_MASK,
            last: AtomicU64::new(0),
        }
    }

    pub fn worker_id(&self) -> u16 {
        self.worker_id as u16
    }

    pub fn generate(&self) -> u64 {
        let elapsed = elapsed_ms();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = advance(last, elapsed);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return self.compose(next),
                Err(current) => last = current,
            }
        }
    }

    fn compose(&self, packed: u64) -> u64 {
        let ms = packed >> SEQUENCE_BITS;
        let sequence = packed & SEQUENCE_MASK;
        (ms << (WORKER_BITS + SEQUENCE_BITS)) | (self.worker_id << SEQUENCE_BITS) | sequence
    }
}

/// Next packed `(elapsed_ms, sequence)` after `last` at clock reading `elapsed`.
fn advance(last: u64, elapsed: u64) -> u64 {
    let fresh = elapsed << SEQUENCE_BITS;
    if fresh > last {
        fresh
    } else {
        // Sequence overflow carries into the millisecond bits.
        last + 1
    }
}

fn elapsed_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_millis() as u64).saturating_sub(EPOCH_MS))
        .unwrap_or(0)
}
