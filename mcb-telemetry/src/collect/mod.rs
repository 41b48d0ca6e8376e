//! Raw `/proc` collectors.

pub mod cpu;
pub mod memory;
