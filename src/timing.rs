//! Per-chipset bit timing and its conversion into target clock cycles.
//!
//! A clockless bit period has three control points, all measured from the rising edge:
//!
//! ```text
//!        t1        t2        t3
//!  ┌─────┬─────────┐         │
//!  │ 0 ──┘         │         │   zero bit drops at t1
//!  │ 1 ────────────┘         │   one bit drops at t2
//! ─┘                         └── next bit may rise at t3
//! ```
//!
//! [`TimingConfig`] stores those points in nanoseconds; [`CycleBudget`] turns them
//! into ticks of a free-running counter. Both constructors are `const fn` that
//! `assert!`, so an impossible chipset/clock pairing is a build error, never a
//! corrupted strip at run time.

use derive_more::{Display, Error as DeriveError};
use embassy_time::Duration;

/// Why a timing configuration was rejected.
#[derive(Clone, Copy, Debug, Display, DeriveError, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingError {
    /// A control point or the latch gap is zero.
    #[display("timing values must be positive")]
    ZeroPhase,
    /// Control points are not strictly increasing (`t1 < t2 < t3`).
    #[display("timing must satisfy t1 < t2 < t3")]
    PhaseOrder,
    /// The clock is too slow to fit the emit loop's overhead into every segment.
    #[display("clock too slow for this chipset")]
    ClockTooSlow,
}

/// Bit timing of one clockless chipset.
///
/// `t1_ns < t2_ns < t3_ns` are cumulative times since the rising edge (see the
/// [module documentation](self)). `reset_us` is the low time that latches a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    t1_ns: u32,
    t2_ns: u32,
    t3_ns: u32,
    reset_us: u32,
}

impl TimingConfig {
    /// Create a timing config from cumulative control points.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in a `const`) if any value is zero or the points are not
    /// strictly increasing.
    #[must_use]
    pub const fn new(t1_ns: u32, t2_ns: u32, t3_ns: u32, reset_us: u32) -> Self {
        match Self::try_new(t1_ns, t2_ns, t3_ns, reset_us) {
            Ok(timing) => timing,
            Err(TimingError::ZeroPhase) => panic!("timing values must be positive"),
            Err(_) => panic!("timing must satisfy t1 < t2 < t3"),
        }
    }

    /// Create a timing config from datasheet-style segment lengths: the always-high part,
    /// the extra high time of a one bit, and the trailing low time.
    #[must_use]
    pub const fn from_segments(high_ns: u32, one_extra_ns: u32, low_ns: u32, reset_us: u32) -> Self {
        Self::new(
            high_ns,
            high_ns + one_extra_ns,
            high_ns + one_extra_ns + low_ns,
            reset_us,
        )
    }

    /// Fallible form of [`new`](Self::new) for configs built at run time.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::ZeroPhase`] or [`TimingError::PhaseOrder`].
    pub const fn try_new(
        t1_ns: u32,
        t2_ns: u32,
        t3_ns: u32,
        reset_us: u32,
    ) -> Result<Self, TimingError> {
        if t1_ns == 0 || t2_ns == 0 || t3_ns == 0 || reset_us == 0 {
            return Err(TimingError::ZeroPhase);
        }
        if !(t1_ns < t2_ns && t2_ns < t3_ns) {
            return Err(TimingError::PhaseOrder);
        }
        Ok(Self {
            t1_ns,
            t2_ns,
            t3_ns,
            reset_us,
        })
    }

    /// Time after the rising edge at which a zero bit drops.
    #[must_use]
    pub const fn t1_ns(&self) -> u32 {
        self.t1_ns
    }

    /// Time after the rising edge at which a one bit drops.
    #[must_use]
    pub const fn t2_ns(&self) -> u32 {
        self.t2_ns
    }

    /// Full bit period.
    #[must_use]
    pub const fn t3_ns(&self) -> u32 {
        self.t3_ns
    }

    /// Minimum low time that latches a frame.
    #[must_use]
    pub const fn reset_us(&self) -> u32 {
        self.reset_us
    }

    /// Latch gap as an [`embassy_time::Duration`].
    #[must_use]
    pub const fn reset(&self) -> Duration {
        Duration::from_micros(self.reset_us as u64)
    }

    /// Wire time of `leds` LEDs at `bytes_per_led` bytes, each byte followed by `extra_bits` dummy bits.
    #[must_use]
    pub const fn frame_duration(&self, leds: usize, bytes_per_led: usize, extra_bits: u8) -> Duration {
        let bits = leds as u64 * bytes_per_led as u64 * (8 + extra_bits as u64);
        let nanos = bits * self.t3_ns as u64;
        Duration::from_micros(nanos.div_ceil(1_000))
    }
}

/// Ceiling conversion of nanoseconds into ticks of a `clock_hz` counter.
#[must_use]
pub const fn ns_to_cycles(ns: u32, clock_hz: u32) -> u32 {
    let cycles = (ns as u64 * clock_hz as u64).div_ceil(1_000_000_000);
    if cycles > u32::MAX as u64 {
        u32::MAX
    } else {
        cycles as u32
    }
}

/// A [`TimingConfig`] expressed in ticks of the target's free-running counter.
///
/// The emit loop spends `overhead` ticks between its wait points; each of the three
/// segments (`t1`, `t2 - t1`, `t3 - t2`) must be able to absorb that.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleBudget {
    /// Ticks from rise to the zero-bit drop.
    pub t1: u32,
    /// Ticks from rise to the one-bit drop.
    pub t2: u32,
    /// Ticks of a whole bit period.
    pub t3: u32,
    /// Ticks the emit loop needs between wait points.
    pub overhead: u32,
    /// Counter frequency the budget was computed for.
    pub clock_hz: u32,
}

impl CycleBudget {
    /// Compute the budget.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in a `const`) if the clock cannot express the timing.
    #[must_use]
    pub const fn new(timing: TimingConfig, clock_hz: u32, overhead: u32) -> Self {
        match Self::try_new(timing, clock_hz, overhead) {
            Ok(budget) => budget,
            Err(_) => panic!("clock too slow for this chipset"),
        }
    }

    /// Fallible form of [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::ClockTooSlow`] if a segment is shorter than `overhead`
    /// or rounding collapses two control points.
    pub const fn try_new(
        timing: TimingConfig,
        clock_hz: u32,
        overhead: u32,
    ) -> Result<Self, TimingError> {
        let t1 = ns_to_cycles(timing.t1_ns, clock_hz);
        let t2 = ns_to_cycles(timing.t2_ns, clock_hz);
        let t3 = ns_to_cycles(timing.t3_ns, clock_hz);
        if !(t1 < t2 && t2 < t3) {
            return Err(TimingError::ClockTooSlow);
        }
        if t1 < overhead || t2 - t1 < overhead || t3 - t2 < overhead {
            return Err(TimingError::ClockTooSlow);
        }
        Ok(Self {
            t1,
            t2,
            t3,
            overhead,
            clock_hz,
        })
    }

    /// Ticks left over in one bit period after the loop overhead of all three segments.
    #[must_use]
    pub const fn slack(&self) -> u32 {
        self.t3 - 3 * self.overhead
    }

    /// Convert counter ticks into microseconds (rounded up).
    #[must_use]
    pub const fn ticks_to_micros(&self, ticks: u32) -> u64 {
        (ticks as u64 * 1_000_000).div_ceil(self.clock_hz as u64)
    }

    /// Convert microseconds into counter ticks (saturating).
    #[must_use]
    pub const fn micros_to_ticks(&self, micros: u32) -> u32 {
        let ticks = micros as u64 * self.clock_hz as u64 / 1_000_000;
        if ticks > u32::MAX as u64 {
            u32::MAX
        } else {
            ticks as u32
        }
    }
}

/// Capability: a type that names one chipset's timing.
///
/// Implemented by the zero-sized chipset types below; implement it on your own type for
/// custom parts.
pub trait TimingProvider {
    /// The chipset's timing.
    const TIMING: TimingConfig;
}

macro_rules! clockless_chipsets {
    (
        $(
            $(#[$meta:meta])*
            $name:ident => ($high:expr, $one_extra:expr, $low:expr, $reset:expr)
        ),+ $(,)?
    ) => {
        /// The supported clockless chipsets, enumerable via [`Chipset::ALL`].
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum Chipset {
            $( $(#[$meta])* $name, )+
        }

        impl Chipset {
            /// Every supported chipset.
            pub const ALL: &'static [Self] = &[ $( Self::$name, )+ ];

            /// Timing of this chipset.
            #[must_use]
            pub const fn timing(self) -> TimingConfig {
                match self {
                    $( Self::$name => <$name as TimingProvider>::TIMING, )+
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
            pub struct $name;

            impl TimingProvider for $name {
                const TIMING: TimingConfig =
                    TimingConfig::from_segments($high, $one_extra, $low, $reset);
            }
        )+
    };
}

clockless_chipsets! {
    /// WorldSemi WS2812 / WS2812B, 800 kHz.
    Ws2812 => (250, 625, 375, 280),
    /// WorldSemi WS2811, 800 kHz.
    Ws2811 => (320, 320, 640, 280),
    /// WorldSemi WS2811 in 400 kHz mode.
    Ws2811Slow => (800, 800, 900, 280),
    /// WorldSemi WS2813, 800 kHz.
    Ws2813 => (320, 320, 640, 300),
    /// Opsco SK6812 (RGB and RGBW), 800 kHz.
    Sk6812 => (300, 600, 300, 80),
    /// Opsco SK6822.
    Sk6822 => (375, 1000, 375, 50),
    /// Titan Micro TM1803, 400 kHz.
    Tm1803 => (700, 1100, 700, 50),
    /// Titan Micro TM1809 / TM1804, 800 kHz.
    Tm1809 => (350, 350, 450, 50),
    /// Titan Micro TM1829, 800 kHz.
    Tm1829 => (340, 340, 550, 500),
    /// UCS1903, 400 kHz.
    Ucs1903 => (500, 1500, 500, 50),
    /// UCS1903B, 800 kHz.
    Ucs1903B => (400, 450, 450, 50),
    /// UCS1904, 800 kHz.
    Ucs1904 => (400, 400, 450, 50),
    /// UCS2903.
    Ucs2903 => (250, 750, 250, 50),
    /// GW6205, 800 kHz.
    Gw6205 => (400, 400, 400, 50),
    /// GW6205 in 400 kHz mode.
    Gw6205Slow => (800, 800, 800, 50),
    /// GE8822.
    Ge8822 => (350, 660, 350, 50),
    /// LPD1886.
    Lpd1886 => (200, 400, 200, 50),
    /// APA106.
    Apa106 => (400, 1000, 400, 50),
    /// PL9823.
    Pl9823 => (350, 1010, 350, 50),
    /// SM16703.
    Sm16703 => (300, 600, 300, 50),
}
