//! Error types and invariant reporting.
//!
//! Two kinds of failure live in this crate:
//! - Recoverable slot/pool failures, reported as [`HandleError`] by the
//!   `try_*` entry points.
//! - Invariant violations (pool exhaustion through the infallible API, a
//!   service created twice). These go through `fail_fast!`: always logged,
//!   and a panic in builds with debug assertions. Release builds keep running
//!   and hand back an empty value instead.

use thiserror::Error;

/// Failures raised by the slot table and the dense pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("pool exhausted: all {capacity} slots are in use")]
    PoolExhausted { capacity: usize },

    #[error("capacity {capacity} exceeds the {max} slots a handle can address")]
    CapacityTooLarge { capacity: usize, max: usize },

    #[error("empty handle")]
    EmptyHandle,

    #[error("slot index {index} is outside the table capacity {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("slot {index} is already occupied")]
    SlotOccupied { index: usize },

    #[error("slot {index} has exhausted its generation counter and is retired")]
    SlotRetired { index: usize },

    #[error("slot {index} already issued generation {issued}; {requested} is not newer")]
    GenerationRollback {
        index: usize,
        requested: u32,
        issued: u32,
    },

    #[error("handle {raw:#010x} does not refer to a live object")]
    StaleHandle { raw: u32 },
}

/// Logs an invariant violation, then panics when debug assertions are enabled.
macro_rules! fail_fast {
    ($($arg:tt)+) => {{
        ::tracing::error!($($arg)+);
        if cfg!(debug_assertions) {
            panic!($($arg)+);
        }
    }};
}

pub(crate) use fail_fast;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = HandleError::PoolExhausted { capacity: 4 };
        assert_eq!(err.to_string(), "pool exhausted: all 4 slots are in use");

        let err = HandleError::StaleHandle { raw: 0x0002_0001 };
        assert_eq!(
            err.to_string(),
            "handle 0x00020001 does not refer to a live object"
        );
    }
}
