use super::registers::TaskContext;
use core::sync::atomic::{AtomicU32, Ordering};

// process counter must be thread-safe
static NEXT_PID: AtomicU32 = AtomicU32::new(1);

/// Hands out process ids, never reusing one
pub fn new_pid() -> u32 {
    NEXT_PID.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Terminated,
}

/// Task control block
#[derive(Debug, Clone)]
pub struct TaskControlBlock {
    pub pid: u32,
    pub state: TaskState,
    pub context: TaskContext,
    pub flags: u32,
}

impl TaskControlBlock {
    /// A READY task with the given entry point and stack
    pub fn new(pid: u32, pc: u64, sp: u64) -> Self {
        Self {
            pid,
            state: TaskState::Ready,
            context: TaskContext::entry(pc, sp),
            flags: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    pub fn is_terminated(&self) -> bool {
        self.state == TaskState::Terminated
    }
}
