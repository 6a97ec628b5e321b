#![no_std]

pub mod dispatch;
pub mod plane;
pub mod refresh;
pub mod scheduler;

pub use dispatch::{Refresh, dispatch};
pub use plane::{BitPlane, DEFAULT_RESOLUTION, PINS_PER_REGISTER, PlaneError, duty_to_slices};
pub use refresh::{RefreshCycle, ShiftPwm};
pub use scheduler::{DEFAULT_TICK_INTERVAL, IntervalTimer, ScheduleError, SoftTimer};
pub use embassy_time::{Duration, Instant};

/// Abstract shift register transport
///
/// Implement this trait for the pins (or peripheral) driving the chain.
/// The refresh cycle is generic over this trait and calls it from the timer
/// interrupt, so implementations must not block.
pub trait ShiftRegisterChain {
    /// Number of 8-output registers wired in series
    fn register_count(&self) -> u8;

    /// Shift one byte into the chain
    fn emit(&mut self, byte: u8);

    /// Latch the shifted bytes to the outputs
    fn commit(&mut self);
}
