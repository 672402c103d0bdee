//! Round-robin dispatcher over the task arena

use super::registry::{TaskId, TaskTable};
use super::task::{new_pid, TaskControlBlock, TaskState};
use super::SchedError;
use crate::constants::processes::SCHEDULER_HZ;
use crate::interrupts::{CriticalSection, InterruptControl, TickSource};
use log::{debug, info};

/// Opaque low-level switch into a task's saved context.
pub trait ContextSwitch {
    fn switch_to(&mut self, next: &TaskControlBlock);
}

pub struct Scheduler<I: InterruptControl, S: ContextSwitch> {
    tasks: TaskTable,
    current: Option<TaskId>,
    irq: I,
    switcher: S,
    ticks: u64,
}

impl<I: InterruptControl, S: ContextSwitch> Scheduler<I, S> {
    /// An empty scheduler; `schedule` does nothing until a task is current
    pub fn new(irq: I, switcher: S) -> Self {
        Self {
            tasks: TaskTable::new(),
            current: None,
            irq,
            switcher,
            ticks: 0,
        }
    }

    /// Bootstraps the ring with the running kernel task and arms the tick
    /// source at `SCHEDULER_HZ`.
    pub fn init_scheduler(
        irq: I,
        switcher: S,
        timer: &mut impl TickSource,
    ) -> Result<Self, SchedError> {
        let mut scheduler = Self::new(irq, switcher);
        let id = scheduler
            .tasks
            .insert(TaskControlBlock::new(new_pid(), 0, 0))?;
        scheduler.current = Some(id);

        timer.arm_periodic(SCHEDULER_HZ);
        info!("Scheduler initialized, tick every {}ms", 1000 / SCHEDULER_HZ);
        Ok(scheduler)
    }

    /// Picks the next READY task in ring order and switches to it.
    ///
    /// Terminated tasks passed over are reaped. With no other READY task the
    /// current one is dispatched again. Returns the dispatched task, or
    /// `None` when there is nothing to run.
    pub fn schedule(&mut self) -> Option<TaskId> {
        let current = self.current?;

        let next = {
            let _section = CriticalSection::new(&self.irq);

            let next = self.tasks.next_runnable(current);
            if self.tasks.get(next)?.is_terminated() {
                // only the exited current task is left
                return None;
            }

            if next != current {
                if let Some(prev) = self.tasks.get_mut(current) {
                    if prev.state == TaskState::Running {
                        prev.state = TaskState::Ready;
                    }
                }
            }
            let tcb = self.tasks.get_mut(next)?;
            tcb.state = TaskState::Running;
            self.current = Some(next);

            self.switcher.switch_to(tcb);
            next
        };

        if let Some(tcb) = self.tasks.get(next) {
            debug!(
                "Current process: {} | sp: {:#x} | pc: {:#x}",
                tcb.pid, tcb.context.sp, tcb.context.pc
            );
        }
        Some(next)
    }

    /// Gives any READY peer the CPU before the next tick
    pub fn yield_now(&mut self) -> Option<TaskId> {
        self.schedule()
    }

    /// Timer interrupt entry
    pub fn on_tick(&mut self) -> Option<TaskId> {
        self.ticks += 1;
        self.schedule()
    }

    /// Adds a READY task to the ring
    pub fn spawn(&mut self, pc: u64, sp: u64) -> Result<TaskId, SchedError> {
        let _section = CriticalSection::new(&self.irq);
        self.tasks.insert(TaskControlBlock::new(new_pid(), pc, sp))
    }

    /// Marks a task TERMINATED; a later pass removes it from the ring
    pub fn terminate(&mut self, id: TaskId) -> Result<(), SchedError> {
        let _section = CriticalSection::new(&self.irq);
        let tcb = self.tasks.get_mut(id).ok_or(SchedError::NoSuchTask)?;
        tcb.state = TaskState::Terminated;
        Ok(())
    }

    /// Terminates the running task and hands the CPU on
    pub fn exit_current(&mut self) -> Result<Option<TaskId>, SchedError> {
        let current = self.current.ok_or(SchedError::NotInitialized)?;
        self.terminate(current)?;
        Ok(self.schedule())
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn current_task(&self) -> Option<&TaskControlBlock> {
        self.tasks.get(self.current?)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskControlBlock> {
        self.tasks.get(id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn switcher(&self) -> &S {
        &self.switcher
    }

    pub fn interrupts(&self) -> &I {
        &self.irq
    }

    pub fn log_task_table(&self) {
        info!("Task table contents:");
        info!("========================");
        if self.tasks.is_empty() {
            info!("No tasks found");
            return;
        }
        for (id, tcb) in self.tasks.iter() {
            info!(
                "Slot {}: PID {}: State: {:?}, Context: {:?}{}",
                id.index(),
                tcb.pid,
                tcb.state,
                tcb.context,
                if Some(id) == self.current { " <- current" } else { "" }
            );
        }
        info!("========================");
    }
}
