//! Deterministic, pure logic shared by autopilot.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod budget;
pub mod controller;
pub mod layout;
pub mod prompt;
pub mod slug;
pub mod types;
