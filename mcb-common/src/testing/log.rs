//! Structured test logging.
//!
//! ```ignore
//! use mcb_common::testing::{TestPhase, init_test_logging};
//!
//! #[test]
//! fn test_example() {
//!     init_test_logging();
//!     tracing::info!(test = "test_example", phase = %TestPhase::Setup);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Test execution phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    Setup,
    Execute,
    Verify,
    Teardown,
}

impl std::fmt::Display for TestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Execute => write!(f, "execute"),
            Self::Verify => write!(f, "verify"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

static INIT: Once = Once::new();

/// Install a JSON test-writer subscriber once per process.
///
/// Level comes from `MCB_TEST_LOG_LEVEL` (default `info`). Safe to call from
/// every test; only the first call has an effect.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let level = std::env::var("MCB_TEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .json(),
            )
            .with(filter)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::info!(test = "init_is_idempotent", phase = %TestPhase::Verify);
    }

    #[test]
    fn phase_display() {
        assert_eq!(TestPhase::Execute.to_string(), "execute");
        assert_eq!(
            serde_json::to_string(&TestPhase::Teardown).unwrap(),
            "\"teardown\""
        );
    }
}
