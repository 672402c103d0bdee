//! System-wide constants and hardware-specific values.

pub mod fs;
pub mod ports;
pub mod processes;
