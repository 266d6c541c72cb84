//! IdGenerator port - run id generation.
//!
//! # Implementations
//! - **UlidGenerator**: ULID based, timestamp taken from a `Clock`

use ulid::Ulid;

use crate::domain::RunId;
use crate::ports::Clock;

/// Generates run ids.
///
/// # ULID properties
/// - sortable by creation time
/// - no coordination needed
/// - 128-bit
pub trait IdGenerator: Send + Sync {
    fn generate_run_id(&self) -> RunId;
}

/// ULID generator whose timestamp part comes from `C`, so a `FixedClock`
/// makes the time component deterministic.
#[derive(Debug, Clone)]
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_run_id(&self) -> RunId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        RunId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
