//! Scheduler configuration constants.

/// Capacity of the task arena.
pub const MAX_TASKS: usize = 64;

/// Scheduler tick rate in Hertz (one tick every 10ms).
pub const SCHEDULER_HZ: u32 = 100;
