//! 8254 PIT channel 0 as the scheduler tick source

use super::TickSource;
use crate::constants::ports::PIT_FREQ;

/// Channel 0, access mode LSB/MSB, mode 2 (rate generator)
const RATE_GENERATOR: u8 = 0x34;

/// Reload value that makes channel 0 fire `hz` times per second
pub fn divisor(hz: u32) -> u16 {
    if hz == 0 {
        return u16::MAX;
    }
    (PIT_FREQ / hz).clamp(1, u16::MAX as u32) as u16
}

#[cfg(target_arch = "x86_64")]
pub use hardware::Pit;

#[cfg(target_arch = "x86_64")]
mod hardware {
    use super::{divisor, TickSource, RATE_GENERATOR};
    use crate::constants::ports::{PIT_CHANNEL_0, PIT_MODE_CMD};
    use x86_64::instructions::port::Port;

    pub struct Pit {
        channel0: Port<u8>,
        mode_cmd: Port<u8>,
    }

    impl Pit {
        pub const fn new() -> Self {
            Self {
                channel0: Port::new(PIT_CHANNEL_0),
                mode_cmd: Port::new(PIT_MODE_CMD),
            }
        }
    }

    impl Default for Pit {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TickSource for Pit {
        fn arm_periodic(&mut self, hz: u32) {
            let count = divisor(hz);
            unsafe {
                self.mode_cmd.write(RATE_GENERATOR);

                // Write count value - LSB first, then MSB
                self.channel0.write((count & 0xFF) as u8);
                self.channel0.write((count >> 8) as u8);
            }
            log::debug!("PIT armed at {} Hz (divisor {})", hz, count);
        }
    }
}
