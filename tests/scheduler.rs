mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use embassy_time::{Duration, Instant};
    use shift_register_pwm::{DEFAULT_TICK_INTERVAL, IntervalTimer, ScheduleError, SoftTimer};

    static FIRST_CALLS: AtomicUsize = AtomicUsize::new(0);
    static SECOND_CALLS: AtomicUsize = AtomicUsize::new(0);
    static DRIFT_CALLS: AtomicUsize = AtomicUsize::new(0);
    static DETACH_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn first() {
        FIRST_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    fn second() {
        SECOND_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    fn drift() {
        DRIFT_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    fn detached() {
        DETACH_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    fn noop() {}

    #[test]
    fn test_default_interval() {
        assert_eq!(DEFAULT_TICK_INTERVAL, Duration::from_micros(20));
    }

    #[test]
    fn test_attach_fails_when_slots_are_full() {
        let mut timer = SoftTimer::<2>::new();
        assert!(timer.is_empty());
        assert_eq!(timer.attach(Duration::from_micros(10), noop), Ok(()));
        assert_eq!(timer.attach(Duration::from_micros(10), noop), Ok(()));
        assert_eq!(
            timer.attach(Duration::from_micros(10), noop),
            Err(ScheduleError::NoFreeSlot)
        );
        assert_eq!(timer.len(), 2);
    }

    #[test]
    fn test_attach_rejects_zero_interval() {
        let mut timer = SoftTimer::<1>::new();
        assert_eq!(
            timer.attach(Duration::from_ticks(0), noop),
            Err(ScheduleError::ZeroInterval)
        );
        assert!(timer.is_empty());
    }

    #[test]
    fn test_run_fires_due_callbacks() {
        let mut timer = SoftTimer::<2>::new();
        timer.attach(Duration::from_micros(20), first).unwrap();
        timer.attach(Duration::from_micros(50), second).unwrap();

        assert_eq!(timer.run(Instant::from_micros(0)), 2);
        assert_eq!(timer.next_deadline(), Some(Instant::from_micros(20)));

        assert_eq!(timer.run(Instant::from_micros(10)), 0);
        assert_eq!(timer.run(Instant::from_micros(20)), 1);
        assert_eq!(timer.run(Instant::from_micros(40)), 1);
        assert_eq!(timer.run(Instant::from_micros(50)), 1);

        assert_eq!(FIRST_CALLS.load(Ordering::Relaxed), 3);
        assert_eq!(SECOND_CALLS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_run_skips_backlog_after_stall() {
        let mut timer = SoftTimer::<1>::new();
        timer.attach(Duration::from_micros(20), drift).unwrap();

        timer.run(Instant::from_micros(0));
        assert_eq!(timer.run(Instant::from_micros(1_000)), 1);
        assert_eq!(timer.next_deadline(), Some(Instant::from_micros(1_020)));
        assert_eq!(timer.run(Instant::from_micros(1_010)), 0);
        assert_eq!(DRIFT_CALLS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_detach() {
        let mut timer = SoftTimer::<2>::new();
        timer.attach(Duration::from_micros(20), noop).unwrap();
        timer.attach(Duration::from_micros(20), detached).unwrap();

        assert!(timer.detach(detached));
        assert!(!timer.detach(detached));
        assert_eq!(timer.len(), 1);

        timer.run(Instant::from_micros(0));
        assert_eq!(DETACH_CALLS.load(Ordering::Relaxed), 0);
        assert_eq!(timer.next_deadline(), Some(Instant::from_micros(20)));
    }
}
