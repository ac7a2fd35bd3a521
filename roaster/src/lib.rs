//! Safety-gated controller for a heat + fan coffee roaster.
//!
//! A one-shot CLI re-run for every change: each invocation loads the
//! persisted roaster record, applies one command, saves the record and
//! mirrors it on the heater PWM and fan-stage pins. The architecture keeps
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (level domains, interlock
//!   transitions, output encoding). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (config file, record store, sysfs
//!   pins). Behind traits so tests can swap them out.
//!
//! [`controller`] and [`command`] coordinate core logic with I/O to implement
//! the CLI commands.

pub mod command;
pub mod controller;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
