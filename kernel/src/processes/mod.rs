//! Tasks and the round-robin scheduler.

use core::fmt;

pub mod registers;
pub mod registry;
pub mod scheduler;
pub mod task;

pub use registers::TaskContext;
pub use registry::{TaskId, TaskTable};
pub use scheduler::{ContextSwitch, Scheduler};
pub use task::{new_pid, TaskControlBlock, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    TableFull,
    NoSuchTask,
    NotInitialized,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::TableFull => write!(f, "Task table is full"),
            SchedError::NoSuchTask => write!(f, "No such task"),
            SchedError::NotInitialized => write!(f, "Scheduler has no current task"),
        }
    }
}
