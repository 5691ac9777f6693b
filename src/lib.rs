//! Drive clockless (WS2812-style) LED strips from microcontrollers.
//!
//! The crate has two layers:
//!
//! - a **protocol engine** ([`transmitter`]) that bit-bangs one strip on one data line against a
//!   [cycle budget](timing::CycleBudget) derived from the chipset's [`TimingConfig`](timing::TimingConfig),
//!   overlapping the next byte's dither + scale with the current byte's pulses, and
//! - a **bulk orchestration layer** ([`controller::BulkController`]) that owns many strips, maps them
//!   onto bounded hardware channels ([`channel`]), carries default and per-strip [`Settings`](strip::Settings),
//!   and hands each frame to a [`StripDriver`](driver::StripDriver): software bit-bang, dedicated
//!   or pooled hardware transmitters, or a parallel DMA engine fed by the [`transposer`].
//!
//! # Glossary
//!
//! - **Clockless protocol:** a single-wire LED protocol that encodes each bit purely as a pulse width.
//! - **T1 / T2 / T3:** the three control points of one bit period: the line rises, a zero bit drops
//!   at T1, a one bit drops at T2, and the next bit may rise at T3.
//! - **Latch (reset) gap:** minimum low time after the last bit before the strip shows the frame.
//! - **Lane:** one physical data line of a parallel (DMA) transmission.
//! - **Channel:** a slot on a hardware transmitter allocated to one strip.
//! - **Worker pool:** more strips than hardware transmitters; transmitters are borrowed per frame.
//! - **Bit transposition:** turning per-strip bytes into per-bit words with one bit per lane.
//! - **Dithering:** frame-to-frame noise on low values that hides 8-bit banding.
#![cfg_attr(not(feature = "host"), no_std)]
#![allow(async_fn_in_trait, reason = "single-threaded embedded")]

// Compile-time checks: on hardware, exactly one board must be selected
#[cfg(all(feature = "arm", not(any(feature = "pico1", feature = "pico2"))))]
compile_error!("Must enable exactly one board feature with 'arm': 'pico1' or 'pico2'");

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

// Logging macros must be defined before the modules that use them.
#[macro_use]
mod fmt;

pub mod channel;
pub mod controller;
pub mod driver;
mod error;
pub mod hal;
pub mod layout;
pub mod math8;
pub mod pixel;
#[cfg(all(feature = "arm", any(feature = "pico1", feature = "pico2")))]
pub mod rp;
#[cfg(feature = "host")]
pub mod sim;
pub mod strip;
pub mod timing;
pub mod transmitter;
pub mod transposer;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};

/// RGB color type of caller-owned pixel buffers, re-exported from the `smart_leds` crate.
pub use smart_leds::RGB8;

/// Predefined RGB color constants from the `smart_leds` crate.
#[doc(inline)]
pub use smart_leds::colors;
