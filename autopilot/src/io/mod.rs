//! I/O helpers for autopilot: filesystem, configuration, process execution.

pub mod config;
pub mod memory;
pub mod objective;
pub mod process;
pub mod sentinel;
pub mod signals;
pub mod worker;
pub mod workspace;
