//! 8-bit integer helpers for the pixel pipeline.
//!
//! The smallest targets have no hardware multiplier, so the transmitter scales
//! bytes with [`ScaleStepper`]: one shift-and-conditional-add per emitted bit.

/// Scale an 8-bit value by a factor (0-255 = 0.0-1.0).
///
/// Computes `(value * (scale + 1)) >> 8`, so a scale of 255 passes `value` through
/// unchanged. This is at most one above the plain `(value * scale) >> 8` product.
#[inline]
#[must_use]
pub const fn scale8(value: u8, scale: u8) -> u8 {
    ((value as u16 * (1 + scale as u16)) >> 8) as u8
}

/// Saturating 8-bit add.
#[inline]
#[must_use]
pub const fn qadd8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Saturating 8-bit subtract.
#[inline]
#[must_use]
pub const fn qsub8(a: u8, b: u8) -> u8 {
    a.saturating_sub(b)
}

/// Add a dither offset to a non-zero byte. Zero stays zero so "off" LEDs never flicker.
#[inline]
#[must_use]
pub const fn dither8(value: u8, offset: u8) -> u8 {
    if value == 0 { 0 } else { qadd8(value, offset) }
}

/// Bit-serial `value × scale` that runs one step at a time.
///
/// Eight calls to [`step`](Self::step) walk the scale's bits from least to most
/// significant; each step conditionally adds `value` and shifts right by one. The
/// accumulator is seeded with `value`, which yields [`scale8`]'s full-scale-exact
/// result: `(value * (scale + 1)) >> 8`.
///
/// ```
/// use clockless_envoy::math8::{ScaleStepper, scale8};
///
/// let mut stepper = ScaleStepper::new(200, 255);
/// while !stepper.is_done() {
///     stepper.step();
/// }
/// assert_eq!(stepper.result(), 200);
/// assert_eq!(stepper.result(), scale8(200, 255));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScaleStepper {
    value: u8,
    scale: u8,
    accumulator: u16,
    steps_done: u8,
}

impl ScaleStepper {
    /// Number of steps needed to finish one byte.
    pub const STEPS: u8 = 8;

    /// Start scaling `value` by `scale`.
    #[must_use]
    pub const fn new(value: u8, scale: u8) -> Self {
        Self {
            value,
            scale,
            accumulator: value as u16,
            steps_done: 0,
        }
    }

    /// A finished stepper holding `value` (used before the first byte is loaded).
    #[must_use]
    pub const fn ready(value: u8) -> Self {
        Self {
            value,
            scale: 255,
            accumulator: value as u16,
            steps_done: Self::STEPS,
        }
    }

    /// Run one shift-and-conditional-add step. Extra calls after the eighth do nothing.
    #[inline(always)]
    pub const fn step(&mut self) {
        if self.steps_done < Self::STEPS {
            if self.scale & (1 << self.steps_done) != 0 {
                self.accumulator += self.value as u16;
            }
            self.accumulator >>= 1;
            self.steps_done += 1;
        }
    }

    /// True once all eight steps have run.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.steps_done >= Self::STEPS
    }

    /// Run any remaining steps and return the scaled byte.
    #[must_use]
    pub const fn finish(mut self) -> u8 {
        while !self.is_done() {
            self.step();
        }
        self.result()
    }

    /// The scaled byte. Only meaningful once [`is_done`](Self::is_done).
    #[must_use]
    pub const fn result(&self) -> u8 {
        self.accumulator as u8
    }
}
