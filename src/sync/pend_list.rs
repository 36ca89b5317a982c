//! Wait list for tasks blocked on a kernel object
//!
//! Ordered by effective priority, most urgent first, FIFO among equal
//! priorities. The head is always the task a give wakes next.

use crate::task::OsTcb;
use crate::types::TaskId;

/// Pend list for tasks waiting on a kernel object
#[derive(Debug, Clone, Copy)]
pub struct PendList {
    head: Option<TaskId>,
    tail: Option<TaskId>,
    count: usize,
}

impl PendList {
    /// Create a new empty pend list
    pub const fn new() -> Self {
        PendList {
            head: None,
            tail: None,
            count: 0,
        }
    }

    /// Check if list is empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Get head of list
    #[inline(always)]
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    /// Number of waiting tasks
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert in priority order, behind every waiter of equal priority
    pub fn insert_by_prio(&mut self, id: TaskId, tasks: &mut [OsTcb]) {
        let prio = tasks[id.index()].prio;

        let mut current = self.head;
        let mut prev: Option<TaskId> = None;

        while let Some(cur) = current {
            if prio > tasks[cur.index()].prio {
                break;
            }
            prev = current;
            current = tasks[cur.index()].pend_next;
        }

        let tcb = &mut tasks[id.index()];
        tcb.pend_prev = prev;
        tcb.pend_next = current;

        match prev {
            Some(p) => tasks[p.index()].pend_next = Some(id),
            None => self.head = Some(id),
        }

        match current {
            Some(c) => tasks[c.index()].pend_prev = Some(id),
            None => self.tail = Some(id),
        }

        self.count += 1;
    }

    /// Remove specific task from list
    pub fn remove(&mut self, id: TaskId, tasks: &mut [OsTcb]) {
        let (prev, next) = {
            let tcb = &mut tasks[id.index()];
            let links = (tcb.pend_prev, tcb.pend_next);
            tcb.pend_prev = None;
            tcb.pend_next = None;
            links
        };

        match prev {
            Some(prev) => tasks[prev.index()].pend_next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => tasks[next.index()].pend_prev = prev,
            None => self.tail = prev,
        }

        self.count = self.count.saturating_sub(1);
    }

    /// Re-sort a waiter whose priority changed
    pub fn reposition(&mut self, id: TaskId, tasks: &mut [OsTcb]) {
        self.remove(id, tasks);
        self.insert_by_prio(id, tasks);
    }

    /// Iterate waiters from head to tail
    pub fn iter<'a>(&self, tasks: &'a [OsTcb]) -> impl Iterator<Item = TaskId> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let id = cursor?;
            cursor = tasks[id.index()].pend_next;
            Some(id)
        })
    }
}

impl Default for PendList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(prios: [u8; 5]) -> [OsTcb; 5] {
        let mut tasks = [const { OsTcb::new() }; 5];
        for (tcb, prio) in tasks.iter_mut().zip(prios) {
            tcb.prio = prio;
        }
        tasks
    }

    fn order(list: &PendList, tasks: &[OsTcb]) -> [Option<TaskId>; 5] {
        let mut it = list.iter(tasks);
        core::array::from_fn(|_| it.next())
    }

    #[test]
    fn test_prio_then_fifo() {
        let mut tasks = table([2, 5, 2, 7, 5]);
        let mut list = PendList::new();
        for i in 0..5 {
            list.insert_by_prio(TaskId(i), &mut tasks);
        }

        assert_eq!(
            order(&list, &tasks),
            [
                Some(TaskId(3)),
                Some(TaskId(1)),
                Some(TaskId(4)),
                Some(TaskId(0)),
                Some(TaskId(2)),
            ]
        );
    }

    #[test]
    fn test_reposition_after_boost() {
        let mut tasks = table([1, 3, 2, 0, 0]);
        let mut list = PendList::new();
        for i in 0..3 {
            list.insert_by_prio(TaskId(i), &mut tasks);
        }
        assert_eq!(list.head(), Some(TaskId(1)));

        tasks[0].prio = 4;
        list.reposition(TaskId(0), &mut tasks);
        assert_eq!(list.head(), Some(TaskId(0)));
        assert_eq!(list.count(), 3);

        list.remove(TaskId(0), &mut tasks);
        list.remove(TaskId(2), &mut tasks);
        assert_eq!(list.head(), Some(TaskId(1)));
        list.remove(TaskId(1), &mut tasks);
        assert!(list.is_empty());
    }
}
