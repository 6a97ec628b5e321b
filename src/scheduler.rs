//! Periodic callback scheduling
//!
//! [`IntervalTimer`] is the contract the refresh cycle needs from its
//! environment: call a context-free function at a fixed interval. Hardware
//! timer drivers implement it directly. [`SoftTimer`] is a software-polled
//! implementation for targets without a free hardware timer; the caller is
//! responsible for calling [`SoftTimer::run`] often enough.

use embassy_time::{Duration, Instant};
use heapless::Vec;

/// Default refresh period
///
/// With the default resolution of 255 slices a full PWM cycle takes about
/// 5 ms, which is fast enough to avoid visible flicker.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_micros(20);

/// Error returned when a callback cannot be scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// All timer slots are taken
    NoFreeSlot,
    /// Interval is shorter than one timer tick
    ZeroInterval,
    /// The refresh cycle is already bound to the trampoline
    AlreadyStarted,
}

/// Facility calling a function at a fixed interval
pub trait IntervalTimer {
    /// Call `callback` every `interval`
    fn attach(&mut self, interval: Duration, callback: fn()) -> Result<(), ScheduleError>;

    /// Stop calling `callback`
    ///
    /// Returns `false` if it was not attached.
    fn detach(&mut self, callback: fn()) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    callback: fn(),
    interval: Duration,
    next: Instant,
}

/// Software-polled timer with a fixed number of slots
///
/// # Usage
///
/// ```ignore
/// let mut timer = SoftTimer::<4>::new();
/// pwm.start(&mut timer, DEFAULT_TICK_INTERVAL)?;
///
/// loop {
///     timer.run(Instant::now());
/// }
/// ```
#[derive(Debug, Default)]
pub struct SoftTimer<const SLOTS: usize> {
    slots: Vec<TimerSlot, SLOTS>,
}

impl<const SLOTS: usize> SoftTimer<SLOTS> {
    /// Create a timer with all slots free
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of attached callbacks
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no callback is attached
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Earliest deadline of all attached callbacks
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().map(|slot| slot.next).min()
    }

    /// Fire every callback whose deadline has passed
    ///
    /// Each due callback fires once and is re-armed one interval later. A
    /// slot that is still behind after that is re-armed from `now` instead,
    /// so a long stall does not turn into a burst of catch-up calls.
    ///
    /// Returns the number of callbacks fired.
    pub fn run(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        for slot in &mut self.slots {
            if now < slot.next {
                continue;
            }
            (slot.callback)();
            fired += 1;

            slot.next += slot.interval;
            if slot.next <= now {
                slot.next = now + slot.interval;
            }
        }
        fired
    }
}

impl<const SLOTS: usize> IntervalTimer for SoftTimer<SLOTS> {
    fn attach(&mut self, interval: Duration, callback: fn()) -> Result<(), ScheduleError> {
        if interval.as_ticks() == 0 {
            return Err(ScheduleError::ZeroInterval);
        }
        // First run fires right away
        let slot = TimerSlot {
            callback,
            interval,
            next: Instant::from_ticks(0),
        };
        self.slots
            .push(slot)
            .map_err(|_| ScheduleError::NoFreeSlot)
    }

    fn detach(&mut self, callback: fn()) -> bool {
        let Some(index) = self
            .slots
            .iter()
            .position(|slot| core::ptr::fn_addr_eq(slot.callback, callback))
        else {
            return false;
        };
        self.slots.swap_remove(index);
        true
    }
}
