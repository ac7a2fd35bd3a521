//! Deterministic, pure logic shared by the roaster controller.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! records and return deterministic outputs suitable for tests.

pub mod outputs;
pub mod transitions;
pub mod types;
