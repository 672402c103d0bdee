//! Kernel core: a FAT-style filesystem over block devices and a
//! round-robin task scheduler.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]
extern crate alloc;

pub mod constants;
#[cfg(target_arch = "x86_64")]
pub mod devices;
pub mod filesys;
pub mod interrupts;
pub mod logging;
pub mod processes;

#[cfg(target_arch = "x86_64")]
pub use devices::serial;
