//! Error and result types shared by the whole crate.

use derive_more::{Display, Error as DeriveError, From};

use crate::timing::TimingError;

/// Result type for `clockless-envoy` operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors reported synchronously by the call that caused them.
///
/// Every error leaves the prior state intact: a rejected [`add`](crate::controller::BulkController::add)
/// registers nothing and allocates no channel.
#[derive(Clone, Copy, Debug, Display, DeriveError, From, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The pin cannot carry LED data on this peripheral.
    #[display("pin {_0} is not valid for this peripheral")]
    InvalidPin(#[error(not(source))] u8),

    /// The pin already has a strip registered.
    #[display("pin {_0} already has a strip")]
    DuplicatePin(#[error(not(source))] u8),

    /// Every hardware channel is in use.
    #[display("all {max} hardware channels are in use")]
    ChannelsExhausted {
        /// Channel limit of the peripheral.
        max: usize,
    },

    /// The controller's strip table is full.
    #[display("strip table is full ({max} strips)")]
    StripTableFull {
        /// Capacity of the strip table.
        max: usize,
    },

    /// The peripheral needs every strip to have the same LED count.
    #[display("peripheral needs uniform strips: expected {expected} LEDs, got {actual}")]
    LengthMismatch {
        /// LED count of the strips already registered.
        expected: usize,
        /// LED count that was requested.
        actual: usize,
    },

    /// The pixel buffer holds fewer LEDs than requested.
    #[display("pixel buffer holds {available} LEDs but {count} were requested")]
    BufferTooShort {
        /// Requested LED count.
        count: usize,
        /// LEDs available in the buffer.
        available: usize,
    },

    /// A mapped layout does not describe the strip's LED count.
    #[display("layout describes {layout} LEDs but the strip has {count}")]
    LayoutMismatch {
        /// LED count of the strip.
        count: usize,
        /// LED count described by the layout.
        layout: usize,
    },

    /// Timing constants are invalid for the target clock.
    #[display("invalid timing: {_0}")]
    #[from]
    InvalidTiming(TimingError),

    /// The peripheral could not be initialized.
    #[display("peripheral initialization failed")]
    PeripheralInit,

    /// The DMA output buffer is too small for the frame.
    #[display("DMA output needs {needed} words but has {available}")]
    OutputTooSmall {
        /// Words needed for the frame.
        needed: usize,
        /// Words available.
        available: usize,
    },

    /// Lanes sharing one DMA transfer must all emit the same bytes per LED.
    #[display("lanes mix RGB and RGBW pixel widths")]
    MixedPixelWidth,

    /// The operation needs an initialized peripheral.
    #[display("peripheral is not initialized")]
    NotInitialized,
}
