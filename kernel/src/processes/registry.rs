//! Task arena
//!
//! Tasks live in fixed slots addressed by [`TaskId`]. The run ring is the
//! occupied slots in ascending order, wrapping from the last back to the
//! first; removing a task just frees its slot.

use super::task::{TaskControlBlock, TaskState};
use super::SchedError;
use crate::constants::processes::MAX_TASKS;
use arrayvec::ArrayVec;
use log::debug;

/// Stable handle to an arena slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct TaskTable {
    slots: ArrayVec<Option<TaskControlBlock>, MAX_TASKS>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            slots: ArrayVec::new(),
        }
    }

    /// Places a task in the lowest free slot
    pub fn insert(&mut self, tcb: TaskControlBlock) -> Result<TaskId, SchedError> {
        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(tcb);
            return Ok(TaskId(index));
        }
        self.slots
            .try_push(Some(tcb))
            .map_err(|_| SchedError::TableFull)?;
        Ok(TaskId(self.slots.len() - 1))
    }

    pub fn remove(&mut self, id: TaskId) -> Option<TaskControlBlock> {
        let tcb = self.slots.get_mut(id.0)?.take();
        self.trim();
        tcb
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskControlBlock> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskControlBlock> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskControlBlock)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|tcb| (TaskId(index), tcb)))
    }

    /// Walks the ring forward from `current`.
    ///
    /// TERMINATED tasks met on the way are removed. Returns the first READY
    /// task, or `current` itself when the walk comes back around.
    pub fn next_runnable(&mut self, current: TaskId) -> TaskId {
        let len = self.slots.len();
        if current.0 >= len {
            return current;
        }

        let mut index = current.0;
        let next = loop {
            index = (index + 1) % len;
            if index == current.0 {
                break current;
            }
            match self.slots[index].as_ref().map(|tcb| tcb.state) {
                Some(TaskState::Terminated) => {
                    if let Some(tcb) = self.slots[index].take() {
                        debug!("Reaped terminated process {}", tcb.pid);
                    }
                }
                Some(TaskState::Ready) => break TaskId(index),
                _ => {}
            }
        };

        self.trim();
        next
    }

    /// Drops free slots at the tail so the ring stays short
    fn trim(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(pid: u32, state: TaskState) -> TaskControlBlock {
        let mut tcb = TaskControlBlock::new(pid, 0, 0);
        tcb.state = state;
        tcb
    }

    fn table(states: &[TaskState]) -> TaskTable {
        let mut table = TaskTable::new();
        for (i, &state) in states.iter().enumerate() {
            table.insert(task(i as u32 + 1, state)).unwrap();
        }
        table
    }

    #[test]
    fn test_insert_reuses_lowest_slot() {
        let mut table = table(&[TaskState::Ready; 3]);
        table.remove(TaskId(1)).unwrap();
        assert_eq!(table.len(), 2);
        let id = table.insert(task(9, TaskState::Ready)).unwrap();
        assert_eq!(id, TaskId(1));
        assert_eq!(table.get(id).unwrap().pid, 9);
    }

    #[test]
    fn test_table_full() {
        let mut table = table(&[TaskState::Ready; MAX_TASKS]);
        assert_eq!(
            table.insert(task(0, TaskState::Ready)).unwrap_err(),
            SchedError::TableFull
        );
    }

    #[test]
    fn test_walk_skips_and_reaps_terminated() {
        let mut table = table(&[TaskState::Running, TaskState::Terminated, TaskState::Ready]);
        assert_eq!(table.next_runnable(TaskId(0)), TaskId(2));
        assert!(table.get(TaskId(1)).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_walk_wraps_around() {
        let mut table = table(&[TaskState::Ready, TaskState::Terminated, TaskState::Running]);
        assert_eq!(table.next_runnable(TaskId(2)), TaskId(0));
        // slot 1 lies beyond the task that was picked
        assert!(table.get(TaskId(1)).is_some());

        table.get_mut(TaskId(2)).unwrap().state = TaskState::Ready;
        assert_eq!(table.next_runnable(TaskId(0)), TaskId(2));
        assert!(table.get(TaskId(1)).is_none());
    }

    #[test]
    fn test_walk_returns_current_when_alone() {
        let mut table = table(&[TaskState::Ready]);
        assert_eq!(table.next_runnable(TaskId(0)), TaskId(0));

        let mut table = table_with_tail_terminated();
        assert_eq!(table.next_runnable(TaskId(0)), TaskId(0));
        assert_eq!(table.iter().count(), 1);
    }

    fn table_with_tail_terminated() -> TaskTable {
        table(&[TaskState::Running, TaskState::Terminated, TaskState::Terminated])
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut table = table(&[TaskState::Ready]);
        assert!(table.remove(TaskId(5)).is_none());
        assert!(table.remove(TaskId(0)).is_some());
        assert!(table.is_empty());
    }
}
