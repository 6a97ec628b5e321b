//! The dispatch slot is process-wide, so everything touching it lives in a
//! single test.

mod tests {
    use embassy_time::{Duration, Instant};
    use shift_register_pwm::{
        BitPlane, DEFAULT_TICK_INTERVAL, IntervalTimer, RefreshCycle, ScheduleError,
        ShiftRegisterChain, SoftTimer, dispatch,
    };

    #[derive(Debug, Default)]
    struct CountingChain {
        emitted: Vec<u8>,
        commits: usize,
    }

    impl ShiftRegisterChain for CountingChain {
        fn register_count(&self) -> u8 {
            1
        }

        fn emit(&mut self, byte: u8) {
            self.emitted.push(byte);
        }

        fn commit(&mut self) {
            self.commits += 1;
        }
    }

    fn noop() {}

    fn counting_refresh() -> &'static RefreshCycle<CountingChain, 4> {
        let front: &'static BitPlane<4> = Box::leak(Box::new(BitPlane::new(4, 1).unwrap()));
        Box::leak(Box::new(
            RefreshCycle::new(CountingChain::default(), front).unwrap(),
        ))
    }

    fn commits(refresh: &RefreshCycle<CountingChain, 4>) -> usize {
        refresh.with_chain(|chain| chain.commits)
    }

    #[test]
    fn test_timer_drives_bound_refresh_cycle() {
        let refresh = counting_refresh();
        let pwm = refresh.handle().unwrap();
        pwm.set(0, 255);

        // Unbound trampoline does nothing
        dispatch::unbind();
        assert!(!dispatch::is_bound());
        dispatch::dispatch();
        assert_eq!(commits(refresh), 0);

        // Registration failure leaves the slot unbound
        let mut full = SoftTimer::<1>::new();
        full.attach(Duration::from_micros(5), noop).unwrap();
        assert_eq!(
            pwm.start(&mut full, DEFAULT_TICK_INTERVAL),
            Err(ScheduleError::NoFreeSlot)
        );
        assert!(!dispatch::is_bound());

        let mut timer = SoftTimer::<1>::new();
        pwm.start(&mut timer, DEFAULT_TICK_INTERVAL).unwrap();
        assert!(dispatch::is_bound());

        // A second start keeps the single attachment
        assert_eq!(
            pwm.start(&mut timer, DEFAULT_TICK_INTERVAL),
            Err(ScheduleError::AlreadyStarted)
        );
        assert_eq!(timer.len(), 1);

        for micros in [0, 20, 40, 50, 60] {
            timer.run(Instant::from_micros(micros));
        }
        refresh.with_chain(|chain| {
            assert_eq!(chain.commits, 4);
            assert_eq!(chain.emitted, [1, 1, 1, 1]);
        });
        assert_eq!(refresh.cursor(), 0);

        // The trampoline can also be called directly from an interrupt handler
        dispatch::dispatch();
        assert_eq!(refresh.cursor(), 1);

        assert!(pwm.stop(&mut timer));
        assert!(!dispatch::is_bound());
        assert!(timer.is_empty());
        dispatch::dispatch();
        assert_eq!(refresh.cursor(), 1);

        // A stopped handle cannot halt the refresh cycle bound after it
        let other = counting_refresh();
        let other_pwm = other.handle().unwrap();
        let mut other_timer = SoftTimer::<1>::new();
        other_pwm
            .start(&mut other_timer, DEFAULT_TICK_INTERVAL)
            .unwrap();

        let mut idle = SoftTimer::<1>::new();
        idle.attach(Duration::from_micros(5), noop).unwrap();
        assert!(!pwm.stop(&mut idle));
        assert!(!pwm.stop(&mut other_timer));
        assert_eq!(idle.len(), 1);
        assert_eq!(other_timer.len(), 1);
        assert!(dispatch::is_bound());

        other_timer.run(Instant::from_micros(0));
        assert_eq!(commits(other), 1);
        assert_eq!(refresh.cursor(), 1);

        assert!(other_pwm.stop(&mut other_timer));
        assert!(!dispatch::is_bound());
        assert!(other_timer.is_empty());
    }
}
