//! Parallel DMA driver: every strip is a lane of one bit-transposed transfer.
//!
//! One engine may serve several controllers (for example two groups of strips with different
//! chipsets). Share it as a [`SharedDma`]; each `show` locks the engine, waits for the
//! transfer in flight to finish, transposes its own frame, starts it, and releases the lock.
//! The transfer then completes in the background while the next caller prepares.
//! Every transfer carries its chipset's [`TimingConfig`], so the engine reprograms its bit
//! phases whenever consecutive callers drive different chipsets.

use core::marker::PhantomData;

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use heapless::Vec;

use crate::channel::Channel;
use crate::driver::{FrameJob, PeripheralKind, StripDriver, TransmitReport};
use crate::pixel::{PixelController, PixelSource};
use crate::timing::{TimingConfig, TimingProvider};
use crate::transposer::{LaneWord, transpose_lanes};
use crate::{Error, Result};

/// Most lanes any engine can drive.
pub const MAX_LANES: usize = 32;

/// The narrow surface of a DMA-fed parallel output peripheral.
pub trait DmaEngine {
    /// Output word; bit `i` drives lane `i`.
    type Word: LaneWord;

    /// Lanes this engine drives (at most `Self::Word::LANES`).
    const MAX_LANES: usize;

    /// True if `pin` can be a lane of this engine.
    fn is_valid_pin(pin: u8) -> bool;

    /// Start shifting out `words` with the bit phases of `timing`. `lane_pins[i]` names the pin
    /// of lane `i` (`None` = unused).
    ///
    /// Returns once the transfer is queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start the transfer.
    fn start(
        &mut self,
        timing: &TimingConfig,
        lane_pins: &[Option<u8>],
        words: &[Self::Word],
    ) -> Result<()>;

    /// True while a transfer is in flight.
    fn is_busy(&self) -> bool;
}

/// A DMA engine shared by several drivers; `show` calls serialize on it.
pub type SharedDma<E> = Mutex<CriticalSectionRawMutex, E>;

/// Sends every strip as one lane of a parallel DMA transfer, chipset `C`.
///
/// The driver owns its frame buffer; size it with [`frame_words`](crate::transposer::frame_words).
pub struct ParallelDmaDriver<'d, E: DmaEngine, C: TimingProvider> {
    engine: &'d SharedDma<E>,
    buffer: &'d mut [E::Word],
    lane_pins: [Option<u8>; MAX_LANES],
    bits: u8,
    uniform: bool,
    _chipset: PhantomData<C>,
}

impl<'d, E: DmaEngine, C: TimingProvider> ParallelDmaDriver<'d, E, C> {
    /// Create a driver on a shared `engine`, transposing into `buffer`.
    #[must_use]
    pub fn new(engine: &'d SharedDma<E>, buffer: &'d mut [E::Word]) -> Self {
        Self {
            engine,
            buffer,
            lane_pins: [None; MAX_LANES],
            bits: 8,
            uniform: false,
            _chipset: PhantomData,
        }
    }

    /// Emit only the top `bits` bits of each byte (width-limited peripherals).
    #[must_use]
    pub fn with_bits_per_channel(mut self, bits: u8) -> Self {
        self.bits = bits.clamp(1, 8);
        self
    }

    /// Require every strip to have the same LED count.
    #[must_use]
    pub fn with_uniform_length(mut self, uniform: bool) -> Self {
        self.uniform = uniform;
        self
    }

    /// The transposed words of the last frame.
    #[must_use]
    pub fn buffer(&self) -> &[E::Word] {
        self.buffer
    }

    fn lane_limit() -> usize {
        E::MAX_LANES.min(E::Word::LANES).min(MAX_LANES)
    }
}

impl<E: DmaEngine, C: TimingProvider> StripDriver for ParallelDmaDriver<'_, E, C> {
    const KIND: PeripheralKind = PeripheralKind::ParallelDma;

    fn max_channels(&self) -> usize {
        Self::lane_limit()
    }

    fn is_valid_pin(&self, pin: u8) -> bool {
        E::is_valid_pin(pin)
    }

    fn requires_uniform_length(&self) -> bool {
        self.uniform
    }

    fn timing(&self) -> TimingConfig {
        C::TIMING
    }

    fn begin(&mut self) -> Result<()> {
        info!(
            "parallel DMA driver ready: {} lanes, {} bits per byte, {} word buffer",
            Self::lane_limit(),
            self.bits,
            self.buffer.len()
        );
        Ok(())
    }

    fn attach(&mut self, channel: Channel, pin: u8) -> Result<()> {
        let lane = self
            .lane_pins
            .get_mut(channel.index())
            .filter(|_| channel.index() < Self::lane_limit())
            .ok_or(Error::ChannelsExhausted {
                max: Self::lane_limit(),
            })?;
        *lane = Some(pin);
        Ok(())
    }

    fn detach(&mut self, channel: Channel, _pin: u8) {
        if let Some(lane) = self.lane_pins.get_mut(channel.index()) {
            *lane = None;
        }
    }

    async fn transmit(&mut self, job: &FrameJob<'_, '_>) -> Result<TransmitReport> {
        let mut sources: Vec<(usize, PixelController<'_>), MAX_LANES> = Vec::new();
        for strip in job.strips() {
            sources
                .push((strip.channel().index(), job.source(strip)))
                .map_err(|_| Error::ChannelsExhausted { max: MAX_LANES })?;
        }
        let mut lanes: Vec<(usize, &mut dyn PixelSource), MAX_LANES> = sources
            .iter_mut()
            .map(|(lane, source)| (*lane, source as &mut dyn PixelSource))
            .collect();
        let lane_count = lanes
            .iter()
            .map(|(lane, _)| lane + 1)
            .max()
            .unwrap_or(0);

        let mut engine = self.engine.lock().await;
        while engine.is_busy() {
            trace!("parallel DMA: waiting for the transfer in flight");
            yield_now().await;
        }
        let words = transpose_lanes(&mut lanes, self.bits, &mut *self.buffer)?;
        engine.start(&C::TIMING, &self.lane_pins[..lane_count], &self.buffer[..words])?;
        drop(engine);

        Ok(TransmitReport {
            line_busy_for: job.longest_wire_time(&C::TIMING, 0),
            ..TransmitReport::default()
        })
    }
}
