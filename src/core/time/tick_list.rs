//! Tick list - delayed tasks and pend timeouts sorted by deadline
//!
//! The tick handler only ever looks at the head, so expiring N tasks costs
//! N unlinks regardless of how many tasks are waiting. Deadlines are
//! absolute tick values compared relative to the current tick, which keeps
//! ordering correct across counter wrap-around. Waits are clamped to
//! [`MAX_WAIT`] so a deadline never lands in the half of the range that
//! reads as already passed.

use crate::task::OsTcb;
use crate::types::{OsTick, TaskId};

/// Longest wait the wrap-safe comparison can represent
pub const MAX_WAIT: OsTick = i32::MAX as OsTick;

/// Deadline `ticks` after `now`, with the wait clamped to [`MAX_WAIT`]
#[inline]
pub fn deadline_after(now: OsTick, ticks: OsTick) -> OsTick {
    now.wrapping_add(ticks.min(MAX_WAIT))
}

/// Whether `deadline` has been reached at tick `now`
#[inline]
pub fn deadline_reached(now: OsTick, deadline: OsTick) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Deadline-ordered list of waiting tasks
#[derive(Debug, Clone, Copy)]
pub struct TickList {
    head: Option<TaskId>,
}

impl TickList {
    pub const fn new() -> Self {
        TickList { head: None }
    }

    /// Task with the earliest deadline
    #[inline]
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert a task that wakes at `wake_at`, behind equal deadlines
    pub fn insert(&mut self, id: TaskId, wake_at: OsTick, now: OsTick, tasks: &mut [OsTcb]) {
        let dist = wake_at.wrapping_sub(now);

        let mut current = self.head;
        let mut prev: Option<TaskId> = None;

        while let Some(cur) = current {
            if tasks[cur.index()].wake_at.wrapping_sub(now) > dist {
                break;
            }
            prev = current;
            current = tasks[cur.index()].tick_next;
        }

        let tcb = &mut tasks[id.index()];
        tcb.wake_at = wake_at;
        tcb.tick_prev = prev;
        tcb.tick_next = current;
        tcb.in_tick_list = true;

        match prev {
            Some(p) => tasks[p.index()].tick_next = Some(id),
            None => self.head = Some(id),
        }

        if let Some(c) = current {
            tasks[c.index()].tick_prev = Some(id);
        }
    }

    /// Remove a task; no-op if it is not in the list
    pub fn remove(&mut self, id: TaskId, tasks: &mut [OsTcb]) {
        let (prev, next) = {
            let tcb = &mut tasks[id.index()];
            if !tcb.in_tick_list {
                return;
            }
            let links = (tcb.tick_prev, tcb.tick_next);
            tcb.tick_prev = None;
            tcb.tick_next = None;
            tcb.in_tick_list = false;
            links
        };

        match prev {
            Some(prev) => tasks[prev.index()].tick_next = next,
            None => self.head = next,
        }

        if let Some(next) = next {
            tasks[next.index()].tick_prev = prev;
        }
    }
}

impl Default for TickList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_wraps() {
        assert!(deadline_reached(10, 10));
        assert!(!deadline_reached(9, 10));
        assert!(deadline_reached(3, u32::MAX - 2));
        assert!(!deadline_reached(u32::MAX - 2, 3));
    }

    #[test]
    fn test_long_wait_clamped() {
        let now = 100;
        let deadline = deadline_after(now, u32::MAX);
        assert_eq!(deadline, now + MAX_WAIT);
        assert!(!deadline_reached(now + 1, deadline));
        assert!(!deadline_reached(now + MAX_WAIT - 1, deadline));
        assert!(deadline_reached(now + MAX_WAIT, deadline));

        assert_eq!(deadline_after(u32::MAX, 5), 4);
    }

    #[test]
    fn test_sorted_across_wrap() {
        let mut tasks = [const { OsTcb::new() }; 3];
        let mut list = TickList::new();
        let now = u32::MAX - 5;

        list.insert(TaskId(0), 10, now, &mut tasks);
        list.insert(TaskId(1), u32::MAX, now, &mut tasks);
        list.insert(TaskId(2), 10, now, &mut tasks);

        assert_eq!(list.head(), Some(TaskId(1)));
        assert_eq!(tasks[1].tick_next, Some(TaskId(0)));
        assert_eq!(tasks[0].tick_next, Some(TaskId(2)));

        list.remove(TaskId(1), &mut tasks);
        assert_eq!(list.head(), Some(TaskId(0)));
        list.remove(TaskId(1), &mut tasks);
        assert!(!tasks[1].in_tick_list);
    }
}
