//! Bit-plane buffer
//!
//! Stores the PWM waveform of every pin in the chain as a grid of bytes,
//! one per (time slice, register) pair. Bit `b` of the byte at
//! `time + register * resolution` is the state of pin `register * 8 + b`
//! during that time slice.
//!
//! Bytes are atomics so the refresh interrupt can read them while
//! application code rewrites a pin. Writes assume a single writer.

use core::sync::atomic::{AtomicU8, Ordering};

/// Default number of time slices per PWM cycle
pub const DEFAULT_RESOLUTION: u8 = 255;

/// Number of outputs on one register in the chain
pub const PINS_PER_REGISTER: u16 = 8;

/// Error returned when a bit-plane cannot be built or addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneError {
    /// Resolution must be at least one time slice
    ZeroResolution,
    /// The chain must contain at least one register
    ZeroRegisters,
    /// `resolution * registers` does not fit the plane capacity
    OutOfMemory,
    /// Pin is beyond the last register of the chain
    PinOutOfRange,
    /// Register count differs from the one of the chain
    ShapeMismatch,
}

/// Rescale an 8-bit duty value to a number of "on" time slices
///
/// Rounds half up, the same as `(value / 255 * resolution + 0.5) as u8`,
/// but in exact integer math.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub const fn duty_to_slices(value: u8, resolution: u8) -> u8 {
    ((2 * value as u32 * resolution as u32 + 255) / 510) as u8
}

/// Time × register grid holding the waveform of every pin
///
/// `N` is the byte capacity. A plane of `resolution` slices over `registers`
/// registers needs `resolution * registers` bytes.
#[derive(Debug)]
pub struct BitPlane<const N: usize> {
    bytes: [AtomicU8; N],
    resolution: u8,
    registers: u8,
}

impl<const N: usize> BitPlane<N> {
    /// Create a zero-filled plane (all pins off)
    ///
    /// `const` so the plane can be placed in a `static`.
    pub const fn new(resolution: u8, registers: u8) -> Result<Self, PlaneError> {
        if resolution == 0 {
            return Err(PlaneError::ZeroResolution);
        }
        if registers == 0 {
            return Err(PlaneError::ZeroRegisters);
        }
        if resolution as usize * registers as usize > N {
            return Err(PlaneError::OutOfMemory);
        }
        Ok(Self {
            bytes: [const { AtomicU8::new(0) }; N],
            resolution,
            registers,
        })
    }

    /// Number of time slices per cycle
    pub const fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Number of registers covered by the plane
    pub const fn registers(&self) -> u8 {
        self.registers
    }

    /// Number of addressable pins
    pub const fn pins(&self) -> u16 {
        self.registers as u16 * PINS_PER_REGISTER
    }

    /// Number of bytes in use
    ///
    /// Never zero: [`Self::new`] rejects empty shapes.
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        self.resolution as usize * self.registers as usize
    }

    /// Byte capacity of the plane
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Set a pin to a PWM value
    ///
    /// `pin` counts across the chain: the first pin of the second register is 8.
    /// `value` is scaled from 0..=255 to the plane resolution. The pin is on
    /// for the leading `duty_to_slices(value, resolution)` slices of each cycle.
    ///
    /// An out-of-range pin is a caller bug. It trips a debug assertion and is
    /// otherwise ignored; use [`Self::try_set`] for a checked variant.
    pub fn set(&self, pin: u16, value: u8) {
        debug_assert!(pin < self.pins(), "pin out of range");
        self.write_pin(pin, value);
    }

    /// Checked variant of [`Self::set`]
    pub fn try_set(&self, pin: u16, value: u8) -> Result<(), PlaneError> {
        if pin >= self.pins() {
            return Err(PlaneError::PinOutOfRange);
        }
        self.write_pin(pin, value);
        Ok(())
    }

    /// Set every pin of the chain to the same PWM value
    pub fn set_all(&self, value: u8) {
        let scaled = duty_to_slices(value, self.resolution);
        for register in 0..self.registers {
            for (time, byte) in self.column(register).iter().enumerate() {
                byte.store(if time < scaled as usize { 0xFF } else { 0 }, Ordering::Relaxed);
            }
        }
    }

    /// Switch every pin off
    pub fn clear(&self) {
        self.set_all(0);
    }

    /// Read the byte of a register at a time slice
    ///
    /// Returns 0 for coordinates outside the plane.
    #[inline]
    pub fn byte(&self, time: u8, register: u8) -> u8 {
        if time >= self.resolution || register >= self.registers {
            return 0;
        }
        let index = time as usize + register as usize * self.resolution as usize;
        self.bytes
            .get(index)
            .map_or(0, |byte| byte.load(Ordering::Relaxed))
    }

    /// Check if a pin is on at a time slice
    pub fn is_on(&self, pin: u16, time: u8) -> bool {
        let Some(register) = register_of(pin) else {
            return false;
        };
        self.byte(time, register) & bit_of(pin) != 0
    }

    /// Number of time slices the pin is on per cycle
    #[allow(clippy::cast_possible_truncation)]
    pub fn on_slices(&self, pin: u16) -> u8 {
        (0..self.resolution)
            .filter(|&time| self.is_on(pin, time))
            .count() as u8
    }

    fn write_pin(&self, pin: u16, value: u8) {
        let Some(register) = register_of(pin) else {
            return;
        };
        let scaled = duty_to_slices(value, self.resolution);
        let mask = bit_of(pin);
        for (time, byte) in self.column(register).iter().enumerate() {
            // 0xFF while the slice is inside the duty window, 0x00 after it
            let on = 0u8.wrapping_sub(u8::from(time < scaled as usize));
            let old = byte.load(Ordering::Relaxed);
            byte.store(old ^ ((on ^ old) & mask), Ordering::Relaxed);
        }
    }

    /// All time slices of one register
    fn column(&self, register: u8) -> &[AtomicU8] {
        if register >= self.registers {
            return &[];
        }
        let start = register as usize * self.resolution as usize;
        let end = start + self.resolution as usize;
        self.bytes.get(start..end).unwrap_or(&[])
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn register_of(pin: u16) -> Option<u8> {
    let register = pin / PINS_PER_REGISTER;
    if register > u8::MAX as u16 {
        return None;
    }
    Some(register as u8)
}

#[allow(clippy::cast_possible_truncation)]
const fn bit_of(pin: u16) -> u8 {
    1 << (pin % PINS_PER_REGISTER) as u8
}
