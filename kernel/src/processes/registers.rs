/// Execution context saved for a task that is not running.
///
/// Only the opaque switch primitive reads or writes these fields.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TaskContext {
    pub pc: u64,
    pub sp: u64,
    pub base_sp: u64,
    /// Kernel stack loaded on a privilege-level change
    pub esp0: u64,
    pub ss0: u16,
}

impl TaskContext {
    pub const fn new() -> Self {
        Self {
            pc: 0,
            sp: 0,
            base_sp: 0,
            esp0: 0,
            ss0: 0,
        }
    }

    /// Context for a task that starts at `pc` on a fresh stack
    pub const fn entry(pc: u64, sp: u64) -> Self {
        Self {
            pc,
            sp,
            base_sp: sp,
            esp0: 0,
            ss0: 0,
        }
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut ds = f.debug_struct("TaskContext");

        ds.field("pc", &format_args!("{:#016x}", self.pc))
            .field("sp", &format_args!("{:#016x}", self.sp))
            .field("base_sp", &format_args!("{:#016x}", self.base_sp))
            .field("esp0", &format_args!("{:#016x}", self.esp0))
            .field("ss0", &format_args!("{:#06x}", self.ss0));

        ds.finish()
    }
}
