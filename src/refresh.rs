//! Refresh cycle and its writer handle
//!
//! The refresh cycle owns the shift register chain and re-emits one time
//! slice of the active bit-plane per timer tick. The handle is the single
//! application-side writer: it sets pins, swaps planes and starts the timer.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::Mutex;
use embassy_time::Duration;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::ShiftRegisterChain;
use crate::dispatch;
use crate::plane::{BitPlane, PlaneError};
use crate::scheduler::{IntervalTimer, ScheduleError};

/// Periodic emitter of the active bit-plane
///
/// Usually placed in a `static` (or leaked) so the timer interrupt can reach
/// it through [`dispatch`](crate::dispatch::dispatch).
///
/// # Usage
///
/// ```ignore
/// static FRONT: BitPlane<64> = match BitPlane::new(32, 2) {
///     Ok(plane) => plane,
///     Err(_) => panic!("plane does not fit"),
/// };
///
/// let refresh = REFRESH.init(RefreshCycle::new(chain, &FRONT)?);
/// let pwm = refresh.handle().unwrap();
/// pwm.start(&mut timer, DEFAULT_TICK_INTERVAL)?;
/// pwm.set(3, 128);
/// ```
pub struct RefreshCycle<C, const N: usize> {
    chain: Mutex<RefCell<C>>,
    plane: Mutex<Cell<&'static BitPlane<N>>>,
    cursor: AtomicU8,
    registers: u8,
    claimed: Mutex<Cell<bool>>,
}

impl<C: ShiftRegisterChain, const N: usize> RefreshCycle<C, N> {
    /// Create a refresh cycle emitting `plane` through `chain`
    ///
    /// Fails with [`PlaneError::ShapeMismatch`] if the plane does not cover
    /// exactly the registers of the chain.
    pub fn new(chain: C, plane: &'static BitPlane<N>) -> Result<Self, PlaneError> {
        let registers = chain.register_count();
        if registers == 0 {
            return Err(PlaneError::ZeroRegisters);
        }
        if registers != plane.registers() {
            return Err(PlaneError::ShapeMismatch);
        }
        Ok(Self {
            chain: Mutex::new(RefCell::new(chain)),
            plane: Mutex::new(Cell::new(plane)),
            cursor: AtomicU8::new(0),
            registers,
            claimed: Mutex::new(Cell::new(false)),
        })
    }

    /// Emit the current time slice and advance the cursor
    ///
    /// Called once per timer period, usually from interrupt context.
    /// Registers are emitted last-to-first so the first emitted byte ends up
    /// at the far end of the chain once latched.
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let Ok(mut chain) = self.chain.borrow(cs).try_borrow_mut() else {
                return;
            };
            let plane = self.plane.borrow(cs).get();
            let resolution = plane.resolution();
            let mut time = self.cursor.load(Ordering::Relaxed);
            if time >= resolution {
                time = 0;
            }

            if self.registers == 1 {
                chain.emit(plane.byte(time, 0));
            } else {
                for register in (0..self.registers).rev() {
                    chain.emit(plane.byte(time, register));
                }
            }
            chain.commit();

            let next = time + 1;
            self.cursor
                .store(if next == resolution { 0 } else { next }, Ordering::Relaxed);
        });
    }

    /// Time slice the next tick will emit
    pub fn cursor(&self) -> u8 {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Currently emitted plane
    pub fn plane(&self) -> &'static BitPlane<N> {
        critical_section::with(|cs| self.plane.borrow(cs).get())
    }

    /// Number of registers in the chain
    pub const fn registers(&self) -> u8 {
        self.registers
    }

    /// Run a closure with exclusive access to the chain
    pub fn with_chain<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.chain.borrow(cs).borrow_mut()))
    }

    /// Release the chain
    pub fn into_chain(self) -> C {
        self.chain.into_inner().into_inner()
    }

    /// Take the writer handle
    ///
    /// Returns `None` if the handle was already taken.
    pub fn handle(&'static self) -> Option<ShiftPwm<C, N>>
    where
        C: 'static,
    {
        let taken = critical_section::with(|cs| self.claimed.borrow(cs).replace(true));
        if taken {
            return None;
        }
        Some(ShiftPwm {
            refresh: self,
            plane: self.plane(),
        })
    }

    /// Replace the active plane and restart the cycle
    fn replace_plane(&self, plane: &'static BitPlane<N>) -> &'static BitPlane<N> {
        critical_section::with(|cs| {
            let previous = self.plane.borrow(cs).replace(plane);
            self.cursor.store(0, Ordering::Relaxed);
            previous
        })
    }
}

/// Writer handle of a [`RefreshCycle`]
///
/// There is exactly one handle per refresh cycle, so pin writes never race
/// each other. Writes go straight to the active plane without masking
/// interrupts.
pub struct ShiftPwm<C: 'static, const N: usize> {
    refresh: &'static RefreshCycle<C, N>,
    plane: &'static BitPlane<N>,
}

impl<C: ShiftRegisterChain + Send + 'static, const N: usize> ShiftPwm<C, N> {
    /// Set a pin of the active plane to a PWM value
    ///
    /// See [`BitPlane::set`]. `pin` must be below [`BitPlane::pins`]: an
    /// out-of-range pin panics in debug builds and is silently ignored in
    /// release builds. Use [`Self::try_set`] to get
    /// [`PlaneError::PinOutOfRange`] instead.
    #[inline]
    pub fn set(&self, pin: u16, value: u8) {
        self.plane.set(pin, value);
    }

    /// Checked variant of [`Self::set`]
    pub fn try_set(&self, pin: u16, value: u8) -> Result<(), PlaneError> {
        self.plane.try_set(pin, value)
    }

    /// Set every pin of the active plane to the same PWM value
    pub fn set_all(&self, value: u8) {
        self.plane.set_all(value);
    }

    /// Switch every pin of the active plane off
    pub fn clear(&self) {
        self.plane.clear();
    }

    /// Active plane
    pub const fn plane(&self) -> &'static BitPlane<N> {
        self.plane
    }

    /// Refresh cycle this handle writes to
    pub const fn refresh(&self) -> &'static RefreshCycle<C, N> {
        self.refresh
    }

    /// Replace the active plane
    ///
    /// The next tick emits slice 0 of the new plane. The new plane may use a
    /// different resolution, but must cover the same registers; otherwise it
    /// is returned as `Err` and nothing changes.
    ///
    /// Returns the previously active plane.
    pub fn swap(
        &mut self,
        plane: &'static BitPlane<N>,
    ) -> Result<&'static BitPlane<N>, &'static BitPlane<N>> {
        if plane.registers() != self.refresh.registers() {
            return Err(plane);
        }
        let previous = self.refresh.replace_plane(plane);
        self.plane = plane;

        #[cfg(feature = "esp32-log")]
        println!(
            "[shift-pwm] plane swapped: resolution {} -> {}",
            previous.resolution(),
            plane.resolution()
        );

        Ok(previous)
    }

    /// Register the refresh cycle with a periodic timer
    ///
    /// Attaches the [`dispatch`](crate::dispatch::dispatch) trampoline at
    /// `interval` and binds this refresh cycle to it. Fails with
    /// [`ScheduleError::AlreadyStarted`] while this refresh cycle is bound,
    /// and leaves the timer untouched.
    pub fn start<T: IntervalTimer + ?Sized>(
        &self,
        timer: &mut T,
        interval: Duration,
    ) -> Result<(), ScheduleError> {
        if dispatch::is_bound_to(self.refresh) {
            return Err(ScheduleError::AlreadyStarted);
        }
        timer.attach(interval, dispatch::dispatch)?;
        dispatch::bind(self.refresh);

        #[cfg(feature = "esp32-log")]
        println!(
            "[shift-pwm] started: {} registers, every {} us",
            self.refresh.registers(),
            interval.as_micros()
        );

        Ok(())
    }

    /// Unbind the refresh cycle and detach the trampoline from the timer
    ///
    /// Does nothing and returns `false` unless this refresh cycle is the
    /// bound one. Another bound refresh cycle keeps running.
    pub fn stop<T: IntervalTimer + ?Sized>(&self, timer: &mut T) -> bool {
        if !dispatch::unbind_if(self.refresh) {
            return false;
        }
        timer.detach(dispatch::dispatch)
    }
}
