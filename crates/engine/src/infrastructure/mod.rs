//! Infrastructure: ports, adapters, locks, and settings.

pub mod clock;
pub mod locks;
pub mod persistence;
pub mod ports;
pub mod settings;
