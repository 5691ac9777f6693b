//! Drivers for hardware transmitters that send one strip each.
//!
//! [`DedicatedDriver`] gives every strip its own transmitter, so the channel limit is the
//! transmitter count. [`WorkerPoolDriver`] accepts more strips than it has transmitters and
//! borrows them round-robin for each strip of a frame.

use core::marker::PhantomData;

use embassy_futures::yield_now;

use crate::channel::{Channel, LaneWorker, WorkerPool};
use crate::driver::{FrameJob, PeripheralKind, StripDriver, TransmitReport};
use crate::timing::{TimingConfig, TimingProvider};
use crate::{Error, Result};

/// One exclusive transmitter per strip; channel `i` is worker `i`.
pub struct DedicatedDriver<W: LaneWorker, C: TimingProvider, const N: usize> {
    workers: [W; N],
    _chipset: PhantomData<C>,
}

impl<W: LaneWorker, C: TimingProvider, const N: usize> DedicatedDriver<W, C, N> {
    /// Create a driver over `workers`.
    #[must_use]
    pub const fn new(workers: [W; N]) -> Self {
        Self {
            workers,
            _chipset: PhantomData,
        }
    }

    /// The transmitters.
    #[must_use]
    pub const fn workers(&self) -> &[W; N] {
        &self.workers
    }
}

impl<W: LaneWorker, C: TimingProvider, const N: usize> StripDriver for DedicatedDriver<W, C, N> {
    const KIND: PeripheralKind = PeripheralKind::Dedicated;

    fn max_channels(&self) -> usize {
        N
    }

    fn is_valid_pin(&self, pin: u8) -> bool {
        self.workers.iter().any(|worker| worker.is_valid_pin(pin))
    }

    fn timing(&self) -> TimingConfig {
        C::TIMING
    }

    fn begin(&mut self) -> Result<()> {
        info!("dedicated driver ready: {} transmitters", N);
        Ok(())
    }

    fn attach(&mut self, channel: Channel, pin: u8) -> Result<()> {
        let worker = self
            .workers
            .get_mut(channel.index())
            .ok_or(Error::ChannelsExhausted { max: N })?;
        if !worker.is_valid_pin(pin) {
            return Err(Error::InvalidPin(pin));
        }
        worker.attach(pin)
    }

    fn detach(&mut self, channel: Channel, pin: u8) {
        if let Some(worker) = self.workers.get_mut(channel.index()) {
            worker.detach(pin);
        }
    }

    async fn transmit(&mut self, job: &FrameJob<'_, '_>) -> Result<TransmitReport> {
        for strip in job.strips() {
            let worker = self
                .workers
                .get_mut(strip.channel().index())
                .ok_or(Error::ChannelsExhausted { max: N })?;
            while worker.is_busy() {
                yield_now().await;
            }
            let mut source = job.source(strip);
            worker.start(strip.pin(), &mut source)?;
        }
        Ok(TransmitReport {
            line_busy_for: job.longest_wire_time(&C::TIMING, 0),
            ..TransmitReport::default()
        })
    }
}

/// `WORKERS` transmitters shared by up to `max_channels` strips.
///
/// Every worker is attached to every strip's pin; a frame borrows workers round-robin, waits
/// for each borrowed worker to finish its previous strip, and returns once all are idle.
pub struct WorkerPoolDriver<W: LaneWorker, C: TimingProvider, const WORKERS: usize> {
    pool: WorkerPool<W, WORKERS>,
    max_channels: usize,
    _chipset: PhantomData<C>,
}

impl<W: LaneWorker, C: TimingProvider, const WORKERS: usize> WorkerPoolDriver<W, C, WORKERS> {
    /// Create a driver that accepts up to `max_channels` strips.
    #[must_use]
    pub const fn new(workers: [W; WORKERS], max_channels: usize) -> Self {
        Self {
            pool: WorkerPool::new(workers),
            max_channels,
            _chipset: PhantomData,
        }
    }

    /// The pool.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool<W, WORKERS> {
        &self.pool
    }
}

impl<W: LaneWorker, C: TimingProvider, const WORKERS: usize> StripDriver
    for WorkerPoolDriver<W, C, WORKERS>
{
    const KIND: PeripheralKind = PeripheralKind::WorkerPool;

    fn max_channels(&self) -> usize {
        self.max_channels
    }

    fn is_valid_pin(&self, pin: u8) -> bool {
        self.pool.workers().iter().all(|worker| worker.is_valid_pin(pin))
    }

    fn timing(&self) -> TimingConfig {
        C::TIMING
    }

    fn begin(&mut self) -> Result<()> {
        info!(
            "worker pool ready: {} transmitters for up to {} strips",
            WORKERS,
            self.max_channels
        );
        Ok(())
    }

    fn attach(&mut self, _channel: Channel, pin: u8) -> Result<()> {
        for attached in 0..WORKERS {
            if let Err(error) = self.pool.workers_mut()[attached].attach(pin) {
                for worker in &mut self.pool.workers_mut()[..attached] {
                    worker.detach(pin);
                }
                return Err(error);
            }
        }
        Ok(())
    }

    fn detach(&mut self, _channel: Channel, pin: u8) {
        for worker in self.pool.workers_mut() {
            worker.detach(pin);
        }
    }

    async fn transmit(&mut self, job: &FrameJob<'_, '_>) -> Result<TransmitReport> {
        for strip in job.strips() {
            let worker = self.pool.acquire().await;
            let mut source = job.source(strip);
            worker.start(strip.pin(), &mut source)?;
        }
        self.pool.wait_idle().await;
        Ok(TransmitReport::default())
    }
}
