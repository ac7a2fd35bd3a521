//! I/O adapters for the roaster: configuration, record storage, pin drivers.

pub mod actuator;
pub mod config;
pub mod lock;
pub mod state_store;
pub mod sysfs;
