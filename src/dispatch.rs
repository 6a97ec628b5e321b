//! Interrupt trampoline
//!
//! Timer facilities usually accept a plain `fn()` with no context. This
//! module keeps the one global slot that lets such a callback reach the
//! active refresh cycle. Only [`dispatch`] reads it; everything else takes the
//! refresh cycle by reference.

use core::cell::Cell;

use critical_section::Mutex;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::ShiftRegisterChain;
use crate::refresh::RefreshCycle;

/// Something that can be refreshed from the timer interrupt
pub trait Refresh: Sync {
    /// Emit the next time slice
    fn tick(&self);
}

impl<C: ShiftRegisterChain + Send, const N: usize> Refresh for RefreshCycle<C, N> {
    fn tick(&self) {
        RefreshCycle::tick(self);
    }
}

static ACTIVE: Mutex<Cell<Option<&'static dyn Refresh>>> = Mutex::new(Cell::new(None));

/// Bind the refresh cycle driven by [`dispatch`]
///
/// Returns the previously bound one, if any.
pub fn bind(refresh: &'static dyn Refresh) -> Option<&'static dyn Refresh> {
    let previous = critical_section::with(|cs| ACTIVE.borrow(cs).replace(Some(refresh)));

    #[cfg(feature = "esp32-log")]
    if previous.is_some() {
        println!("[shift-pwm] dispatch rebound, previous refresh cycle released");
    }

    previous
}

/// Unbind the refresh cycle, turning [`dispatch`] into a no-op
pub fn unbind() -> Option<&'static dyn Refresh> {
    critical_section::with(|cs| ACTIVE.borrow(cs).take())
}

/// Unbind `refresh`, leaving any other bound refresh cycle in place
///
/// Returns `false` if `refresh` was not the bound one.
pub fn unbind_if(refresh: &'static dyn Refresh) -> bool {
    critical_section::with(|cs| {
        let slot = ACTIVE.borrow(cs);
        match slot.get() {
            Some(active) if core::ptr::addr_eq(active, refresh) => {
                slot.set(None);
                true
            }
            _ => false,
        }
    })
}

/// Check if a refresh cycle is bound
pub fn is_bound() -> bool {
    critical_section::with(|cs| ACTIVE.borrow(cs).get().is_some())
}

/// Check if `refresh` is the bound refresh cycle
pub fn is_bound_to(refresh: &'static dyn Refresh) -> bool {
    critical_section::with(|cs| {
        ACTIVE
            .borrow(cs)
            .get()
            .is_some_and(|active| core::ptr::addr_eq(active, refresh))
    })
}

/// Timer callback: tick the bound refresh cycle
///
/// Pass this function to the timer facility. Does nothing when unbound.
pub fn dispatch() {
    let active = critical_section::with(|cs| ACTIVE.borrow(cs).get());
    if let Some(refresh) = active {
        refresh.tick();
    }
}
