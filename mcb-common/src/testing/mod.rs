//! Test helpers shared by every crate in the workspace.

pub mod log;

pub use log::{TestPhase, init_test_logging};
