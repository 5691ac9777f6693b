//! Hardware channel bookkeeping and the worker-pool pattern.
//!
//! A [`ChannelTable`] maps strips (by pin) onto a bounded number of hardware channels,
//! always handing out the lowest free index. A [`WorkerPool`] lets a few hardware
//! transmitters ([`LaneWorker`]s) serve more strips than there are transmitters by
//! borrowing them round-robin for each strip of a frame.

use embassy_futures::yield_now;

use crate::Result;
use crate::pixel::PixelSource;

/// Index of a hardware channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Wrap a raw channel index.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Raw channel index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pin ↔ channel mapping with at most `N` slots.
///
/// Every slot is free or holds exactly one pin, and at most [`limit`](Self::limit) slots are
/// ever occupied.
///
/// ```
/// use clockless_envoy::channel::{Channel, ChannelTable};
///
/// let mut table = ChannelTable::<4>::new(2);
/// assert_eq!(table.allocate(7), Some(Channel::new(0)));
/// assert_eq!(table.allocate(9), Some(Channel::new(1)));
/// assert_eq!(table.allocate(11), None); // limit reached
///
/// assert_eq!(table.free(Channel::new(0)), Some(7));
/// assert_eq!(table.allocate(11), Some(Channel::new(0))); // lowest free slot
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelTable<const N: usize> {
    slots: [Option<u8>; N],
    limit: usize,
}

impl<const N: usize> ChannelTable<N> {
    /// Create an empty table that hands out at most `min(limit, N)` channels.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        const { assert!(N <= 256, "channel indices must fit in u8") };
        Self {
            slots: [None; N],
            limit: if limit < N { limit } else { N },
        }
    }

    /// Maximum number of channels this table hands out.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Take the lowest free channel for `pin`. `None` once every channel is in use.
    pub fn allocate(&mut self, pin: u8) -> Option<Channel> {
        let index = self.slots[..self.limit].iter().position(Option::is_none)?;
        self.slots[index] = Some(pin);
        u8::try_from(index).ok().map(Channel)
    }

    /// Release `channel`, returning the pin it carried.
    pub fn free(&mut self, channel: Channel) -> Option<u8> {
        self.slots.get_mut(channel.index())?.take()
    }

    /// Channel carrying `pin`, if any.
    #[must_use]
    pub fn channel_of(&self, pin: u8) -> Option<Channel> {
        let index = self.slots.iter().position(|slot| *slot == Some(pin))?;
        u8::try_from(index).ok().map(Channel)
    }

    /// Pin carried by `channel`, if any.
    #[must_use]
    pub fn pin_of(&self, channel: Channel) -> Option<u8> {
        self.slots.get(channel.index()).copied().flatten()
    }

    /// Number of occupied channels.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// True if no channel is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// Occupied `(channel, pin)` pairs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, u8)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((Channel(u8::try_from(index).ok()?), (*slot)?)))
    }
}

/// One hardware transmitter that sends a strip's bytes without the CPU timing each bit
/// (an RMT channel, a PIO state machine, a UART, ...).
pub trait LaneWorker {
    /// True if this transmitter can drive `pin`.
    fn is_valid_pin(&self, pin: u8) -> bool;

    /// Route `pin` to this transmitter.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be configured.
    fn attach(&mut self, pin: u8) -> Result<()>;

    /// Undo [`attach`](Self::attach).
    fn detach(&mut self, _pin: u8) {}

    /// Queue one strip's frame on `pin` and return without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the transmitter rejects the frame.
    fn start(&mut self, pin: u8, source: &mut dyn PixelSource) -> Result<()>;

    /// True while a started frame is still being sent.
    fn is_busy(&self) -> bool;
}

/// A fixed set of `WORKERS` transmitters lent out round-robin.
pub struct WorkerPool<W: LaneWorker, const WORKERS: usize> {
    workers: [W; WORKERS],
    next: usize,
}

impl<W: LaneWorker, const WORKERS: usize> WorkerPool<W, WORKERS> {
    /// Create a pool from its workers.
    #[must_use]
    pub const fn new(workers: [W; WORKERS]) -> Self {
        const { assert!(WORKERS > 0, "a worker pool needs at least one worker") };
        Self { workers, next: 0 }
    }

    /// Number of workers.
    #[must_use]
    pub const fn len(&self) -> usize {
        WORKERS
    }

    /// Always false; see [`new`](Self::new).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        WORKERS == 0
    }

    /// The workers, for configuration.
    pub fn workers_mut(&mut self) -> &mut [W; WORKERS] {
        &mut self.workers
    }

    /// The workers.
    #[must_use]
    pub const fn workers(&self) -> &[W; WORKERS] {
        &self.workers
    }

    /// Borrow the next worker in round-robin order once it has finished its previous frame.
    pub async fn acquire(&mut self) -> &mut W {
        let index = self.next;
        self.next = (self.next + 1) % WORKERS;
        while self.workers[index].is_busy() {
            yield_now().await;
        }
        &mut self.workers[index]
    }

    /// Wait until every worker is idle.
    pub async fn wait_idle(&self) {
        while self.workers.iter().any(LaneWorker::is_busy) {
            yield_now().await;
        }
    }
}
