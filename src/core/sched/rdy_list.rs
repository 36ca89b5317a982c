//! Ready list - doubly linked list of TCBs at a given priority
//!
//! Each priority level has its own ready list. Tasks are added to the
//! tail (FIFO for round-robin) and scheduled from the head. Links are
//! [`TaskId`]s stored in the TCBs themselves, so every operation takes the
//! kernel's task table.

use crate::task::OsTcb;
use crate::types::TaskId;

/// Ready list for a single priority level
#[derive(Debug, Clone, Copy)]
pub struct ReadyList {
    head: Option<TaskId>,
    tail: Option<TaskId>,
    count: usize,
}

impl ReadyList {
    /// Create a new empty ready list
    pub const fn new() -> Self {
        ReadyList {
            head: None,
            tail: None,
            count: 0,
        }
    }

    /// Get head of list (first to be scheduled)
    #[inline]
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    /// Get tail of list
    #[inline]
    pub fn tail(&self) -> Option<TaskId> {
        self.tail
    }

    /// Check if list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of tasks in the list
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert a task at the tail of the list (FIFO order)
    ///
    /// The task must not already be linked into a ready list.
    pub fn insert_tail(&mut self, id: TaskId, tasks: &mut [OsTcb]) {
        let tcb = &mut tasks[id.index()];
        tcb.next = None;
        tcb.prev = self.tail;

        match self.tail {
            Some(tail) => tasks[tail.index()].next = Some(id),
            None => self.head = Some(id),
        }

        self.tail = Some(id);
        self.count += 1;
    }

    /// Remove a task from the list
    ///
    /// The task must be linked into this list.
    pub fn remove(&mut self, id: TaskId, tasks: &mut [OsTcb]) {
        let (prev, next) = {
            let tcb = &mut tasks[id.index()];
            let links = (tcb.prev, tcb.next);
            tcb.prev = None;
            tcb.next = None;
            links
        };

        match prev {
            Some(prev) => tasks[prev.index()].next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => tasks[next.index()].prev = prev,
            None => self.tail = prev,
        }

        self.count = self.count.saturating_sub(1);
    }

    /// Move the head to the tail; returns the new head
    pub fn rotate(&mut self, tasks: &mut [OsTcb]) -> Option<TaskId> {
        let head = self.head?;
        if self.count > 1 {
            self.remove(head, tasks);
            self.insert_tail(head, tasks);
        }
        self.head
    }

    /// Iterate the list from head to tail
    pub fn iter<'a>(&self, tasks: &'a [OsTcb]) -> impl Iterator<Item = TaskId> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let id = cursor?;
            cursor = tasks[id.index()].next;
            Some(id)
        })
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> [OsTcb; 4] {
        [const { OsTcb::new() }; 4]
    }

    #[test]
    fn test_fifo_order() {
        let mut tasks = table();
        let mut list = ReadyList::new();

        list.insert_tail(TaskId(2), &mut tasks);
        list.insert_tail(TaskId(0), &mut tasks);
        list.insert_tail(TaskId(3), &mut tasks);

        let order: [Option<TaskId>; 3] = {
            let mut it = list.iter(&tasks);
            [it.next(), it.next(), it.next()]
        };
        assert_eq!(order, [Some(TaskId(2)), Some(TaskId(0)), Some(TaskId(3))]);
        assert_eq!(list.count(), 3);
    }

    #[test]
    fn test_remove_middle_and_ends() {
        let mut tasks = table();
        let mut list = ReadyList::new();
        for i in 0..3 {
            list.insert_tail(TaskId(i), &mut tasks);
        }

        list.remove(TaskId(1), &mut tasks);
        assert_eq!(list.head(), Some(TaskId(0)));
        assert_eq!(list.tail(), Some(TaskId(2)));

        list.remove(TaskId(0), &mut tasks);
        list.remove(TaskId(2), &mut tasks);
        assert!(list.is_empty());
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn test_rotate() {
        let mut tasks = table();
        let mut list = ReadyList::new();
        list.insert_tail(TaskId(0), &mut tasks);
        assert_eq!(list.rotate(&mut tasks), Some(TaskId(0)));

        list.insert_tail(TaskId(1), &mut tasks);
        assert_eq!(list.rotate(&mut tasks), Some(TaskId(1)));
        assert_eq!(list.tail(), Some(TaskId(0)));
    }
}
