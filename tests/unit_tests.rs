//! Unit tests for core RTOS modules
//!
//! These tests run on the host (not embedded target) to verify
//! the core algorithms work correctly.

#[cfg(test)]
mod prio_tests {
    use rtcore::config::CFG_PRIO_MAX;
    use rtcore::prio::PrioTable;

    #[test]
    fn test_highest_is_most_urgent() {
        let mut table = PrioTable::new();

        table.insert(3);
        table.insert(12);
        table.insert(0);
        table.insert(7);
        assert_eq!(table.get_highest(), Some(12));

        table.remove(12);
        assert_eq!(table.get_highest(), Some(7));

        table.remove(7);
        table.remove(3);
        assert_eq!(table.get_highest(), Some(0));

        table.remove(0);
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_all_priorities() {
        let mut table = PrioTable::new();

        for i in 0..CFG_PRIO_MAX {
            table.insert(i as u8);
        }

        // Remove from most to least urgent
        for i in (0..CFG_PRIO_MAX).rev() {
            assert_eq!(table.get_highest(), Some(i as u8));
            table.remove(i as u8);
        }

        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_insert_remove() {
        let mut table = PrioTable::new();

        // The table tracks presence, not a count per priority
        table.insert(10);
        table.insert(10);
        assert_eq!(table.get_highest(), Some(10));

        table.remove(10);
        assert!(table.is_empty());
    }
}

#[cfg(test)]
mod error_tests {
    use rtcore::error::{ErrorKind, OsError};

    #[test]
    fn test_error_kinds() {
        assert_eq!(OsError::QFull.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(OsError::TaskNoMoreTcb.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(OsError::MutexOwner.kind(), ErrorKind::UsageError);
        assert_eq!(OsError::QItemSize.kind(), ErrorKind::UsageError);
        assert_eq!(OsError::OsNoAppTask.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OsError::PendIsr.code(), 25006);
        assert_eq!(OsError::StkOvf.code(), 28210);
        assert_ne!(OsError::MutexOwner, OsError::MutexNotOwner);
    }

    #[test]
    fn test_error_debug() {
        // Ensure errors can be formatted for debugging
        let err = OsError::PendIsr;
        let _ = format!("{:?}", err);
    }
}

#[cfg(test)]
mod types_tests {
    use rtcore::types::*;

    #[test]
    fn test_timeout_may_block() {
        assert!(!Timeout::NoWait.may_block());
        assert!(!Timeout::Ticks(0).may_block());
        assert!(Timeout::Ticks(1).may_block());
        assert!(Timeout::Forever.may_block());
    }

    #[test]
    fn test_timeout_from_ticks() {
        assert_eq!(Timeout::from(0), Timeout::NoWait);
        assert_eq!(Timeout::from(100), Timeout::Ticks(100));
    }

    #[test]
    fn test_pend_resolved() {
        assert_eq!(Pend::Acquired.resolved(), Some(TakeResult::Acquired));
        assert_eq!(Pend::TimedOut.resolved(), Some(TakeResult::TimedOut));
        assert_eq!(Pend::Blocked.resolved(), None);
        assert!(TakeResult::Acquired.is_acquired());
    }
}

#[cfg(test)]
mod config_tests {
    use rtcore::config::*;

    #[test]
    fn test_config_values() {
        assert!(CFG_PRIO_MAX >= 8, "Need at least 8 priority levels");
        assert!(CFG_PRIO_MAX <= 256, "Too many priority levels");

        assert!(CFG_STK_SIZE_MIN >= 32, "Stack too small");
        assert!(CFG_STK_GUARD_WORDS < CFG_STK_SIZE_MIN);

        assert!(CFG_TICK_RATE_HZ >= 10, "Tick rate too slow");
        assert!(CFG_TICK_RATE_HZ <= 10000, "Tick rate too fast");

        // Idle priority is the least urgent
        assert_eq!(CFG_PRIO_IDLE, 0);
    }

    #[test]
    fn test_ms_to_ticks() {
        use rtcore::ms_to_ticks;

        assert_eq!(ms_to_ticks(1000), CFG_TICK_RATE_HZ);
        assert!(ms_to_ticks(1) >= 1);
    }
}

#[cfg(test)]
mod sched_tests {
    use rtcore::config::{CFG_MAX_TASKS, CFG_PRIO_MAX};
    use rtcore::error::OsError;
    use rtcore::kernel::Kernel;
    use rtcore::types::{OsTaskState, TaskId};

    const STK: usize = 128;

    fn task_body() -> ! {
        loop {
            std::hint::spin_loop();
        }
    }

    /// One tick through the interrupt path, then the pending switch
    fn tick(k: &mut Kernel) {
        k.int_enter();
        k.tick();
        k.int_exit();
        if k.switch_pending() {
            k.complete_switch();
        }
    }

    fn started(prios: &[u8]) -> (Kernel, Vec<TaskId>) {
        let mut k = Kernel::new();
        k.init().unwrap();
        let ids = prios
            .iter()
            .map(|&p| k.task_create("T", task_body, p, STK).unwrap())
            .collect();
        k.start().unwrap();
        (k, ids)
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut k = Kernel::new();
        assert_eq!(k.start(), Err(OsError::OsNotInit));
        assert_eq!(k.task_create("T", task_body, 1, STK), Err(OsError::OsNotInit));

        k.init().unwrap();
        assert_eq!(k.start(), Err(OsError::OsNoAppTask));

        k.task_create("T", task_body, 1, STK).unwrap();
        k.start().unwrap();
        assert_eq!(k.start(), Err(OsError::OsRunning));
        assert_eq!(k.init(), Err(OsError::OsRunning));
    }

    #[test]
    fn test_create_errors() {
        let mut k = Kernel::new();
        k.init().unwrap();

        assert_eq!(k.task_create("T", task_body, 0, STK), Err(OsError::PrioInvalid));
        assert_eq!(
            k.task_create("T", task_body, CFG_PRIO_MAX as u8, STK),
            Err(OsError::PrioInvalid)
        );
        assert_eq!(k.task_create("T", task_body, 1, 8), Err(OsError::StkSizeInvalid));

        for _ in 1..CFG_MAX_TASKS {
            k.task_create("T", task_body, 1, 64).unwrap();
        }
        assert_eq!(k.task_create("T", task_body, 1, 64), Err(OsError::TaskNoMoreTcb));
    }

    #[test]
    fn test_start_picks_most_urgent() {
        let (k, ids) = started(&[1, 3, 2]);

        assert_eq!(k.current(), Some(ids[1]));
        assert_eq!(k.task_state(ids[1]), OsTaskState::Running);
        assert_eq!(k.task_state(ids[0]), OsTaskState::Ready);
        assert_eq!(k.task_state(ids[2]), OsTaskState::Ready);
    }

    #[test]
    fn test_create_preempts() {
        let (mut k, ids) = started(&[2]);

        let low = k.task_create("Low", task_body, 1, STK).unwrap();
        assert!(!k.switch_pending());

        let high = k.task_create("High", task_body, 3, STK).unwrap();
        assert!(k.switch_pending());
        assert_eq!(k.complete_switch(), Some(high));
        assert_eq!(k.task_state(ids[0]), OsTaskState::Ready);
        assert_eq!(k.task_state(low), OsTaskState::Ready);
    }

    #[test]
    fn test_delay_expires() {
        let (mut k, ids) = started(&[1, 2]);
        let (low, high) = (ids[0], ids[1]);

        k.time_dly(5).unwrap();
        assert_eq!(k.task_state(high), OsTaskState::Delayed);
        assert_eq!(k.complete_switch(), Some(low));

        for _ in 0..4 {
            tick(&mut k);
        }
        assert_eq!(k.current(), Some(low));

        tick(&mut k);
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.task_state(low), OsTaskState::Ready);
    }

    #[test]
    fn test_longest_delay_holds() {
        let (mut k, ids) = started(&[1, 2]);
        let (low, high) = (ids[0], ids[1]);

        k.time_dly(u32::MAX).unwrap();
        assert_eq!(k.complete_switch(), Some(low));

        for _ in 0..1000 {
            tick(&mut k);
        }
        assert_eq!(k.task_state(high), OsTaskState::Delayed);
        assert_eq!(k.current(), Some(low));
    }

    #[test]
    fn test_round_robin() {
        let (mut k, ids) = started(&[2, 2, 1]);
        let (a, b) = (ids[0], ids[1]);

        assert_eq!(k.current(), Some(a));
        tick(&mut k);
        assert_eq!(k.current(), Some(b));
        tick(&mut k);
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.task_state(ids[2]), OsTaskState::Ready);
    }

    #[test]
    fn test_alone_keeps_cpu() {
        let (mut k, ids) = started(&[2, 1]);

        tick(&mut k);
        tick(&mut k);
        assert_eq!(k.current(), Some(ids[0]));

        k.yield_now().unwrap();
        assert!(!k.switch_pending());
        assert_eq!(k.task_state(ids[0]), OsTaskState::Running);
    }

    #[test]
    fn test_yield_and_zero_delay() {
        let (mut k, ids) = started(&[2, 2]);
        let (a, b) = (ids[0], ids[1]);

        k.yield_now().unwrap();
        assert_eq!(k.complete_switch(), Some(b));

        // A zero delay is a yield
        k.time_dly(0).unwrap();
        assert_eq!(k.complete_switch(), Some(a));
        assert_eq!(k.task_state(b), OsTaskState::Ready);
    }

    #[test]
    fn test_isr_restrictions() {
        let (mut k, _) = started(&[1]);

        k.int_enter();
        assert_eq!(k.yield_now(), Err(OsError::YieldIsr));
        assert_eq!(k.time_dly(1), Err(OsError::TimeDlyIsr));
        assert_eq!(k.task_create("T", task_body, 1, STK), Err(OsError::TaskCreateIsr));
        assert!(!k.int_exit());
        assert_eq!(k.int_nesting(), 0);
    }

    #[test]
    fn test_nested_interrupts_defer_switch() {
        let (mut k, ids) = started(&[1, 2]);
        let (low, high) = (ids[0], ids[1]);

        k.time_dly(1).unwrap();
        k.complete_switch();
        assert_eq!(k.current(), Some(low));

        k.int_enter();
        k.int_enter();
        assert!(!k.tick());
        assert!(k.switch_pending());

        // Only the outermost exit requests the switch
        assert!(!k.int_exit());
        assert!(k.int_exit());
        assert_eq!(k.complete_switch(), Some(high));
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use rtcore::{os_time_dly, os_time_dly_ms, os_yield};

    // The global kernel is never started in this binary

    #[test]
    #[should_panic(expected = "fatal kernel error")]
    fn test_delay_before_start_is_fatal() {
        os_time_dly(5);
    }

    #[test]
    #[should_panic(expected = "fatal kernel error")]
    fn test_delay_ms_before_start_is_fatal() {
        os_time_dly_ms(100);
    }

    #[test]
    #[should_panic(expected = "fatal kernel error")]
    fn test_yield_before_start_is_fatal() {
        os_yield();
    }
}
