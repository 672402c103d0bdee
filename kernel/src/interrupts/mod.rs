//! Interrupt masking and the periodic tick source.
//!
//! Scheduler state may only be touched while a [`CriticalSection`] is held.

pub mod pit;

/// Hardware interrupt flag of the current CPU.
pub trait InterruptControl {
    fn are_enabled(&self) -> bool;
    fn enable(&self);
    fn disable(&self);
}

/// Something that can fire the scheduler tick periodically.
pub trait TickSource {
    fn arm_periodic(&mut self, hz: u32);
}

/// Masks interrupts for its lifetime.
///
/// The interrupt flag is restored to the state it had on entry when the
/// guard is dropped, on every exit path.
pub struct CriticalSection<'a, I: InterruptControl + ?Sized> {
    irq: &'a I,
    were_enabled: bool,
}

impl<'a, I: InterruptControl + ?Sized> CriticalSection<'a, I> {
    pub fn new(irq: &'a I) -> Self {
        let were_enabled = irq.are_enabled();
        irq.disable();
        Self { irq, were_enabled }
    }
}

impl<I: InterruptControl + ?Sized> Drop for CriticalSection<'_, I> {
    fn drop(&mut self) {
        if self.were_enabled {
            self.irq.enable();
        }
    }
}

/// Executes a closure with interrupts disabled.
///
/// # Arguments
/// * `irq` - The interrupt controller to mask
/// * `f` - The closure to execute
///
/// # Returns
/// Returns the result of the closure
pub fn without_interrupts<I, F, R>(irq: &I, f: F) -> R
where
    I: InterruptControl + ?Sized,
    F: FnOnce() -> R,
{
    let _section = CriticalSection::new(irq);
    f()
}

/// The `IF` flag of the executing x86_64 core.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuInterrupts;

#[cfg(target_arch = "x86_64")]
impl InterruptControl for CpuInterrupts {
    fn are_enabled(&self) -> bool {
        x86_64::instructions::interrupts::are_enabled()
    }

    fn enable(&self) {
        x86_64::instructions::interrupts::enable();
    }

    fn disable(&self) {
        x86_64::instructions::interrupts::disable();
    }
}
