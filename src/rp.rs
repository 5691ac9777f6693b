//! RP2040 / RP2350 bindings: GPIO outputs through [`HalPort`] and SysTick as the counter.
//!
//! embassy-rp's time driver runs on the TIMER peripheral, which leaves the core's SysTick
//! free to count CPU cycles for the emit loop.
//!
//! ```rust,no_run
//! # #![no_std]
//! # #![no_main]
//! # #[panic_handler]
//! # fn panic(_: &core::panic::PanicInfo) -> ! { loop {} }
//! use clockless_envoy::rp::{RpPort, SysTickCounter};
//! use embassy_rp::gpio::{Level, Output};
//!
//! async fn example(p: embassy_rp::Peripherals, core: cortex_m::Peripherals) -> clockless_envoy::Result<()> {
//!     let port: RpPort<2> = RpPort::new(SysTickCounter::new(core.SYST))
//!         .with_pin(2, Output::new(p.PIN_2, Level::Low))?
//!         .with_pin(5, Output::new(p.PIN_5, Level::Low))?;
//!     # let _ = port;
//!     Ok(())
//! }
//! ```

use cortex_m::peripheral::SYST;
use cortex_m::peripheral::syst::SystClkSource;
use embassy_rp::gpio::Output;

use crate::hal::{FreeRunningCounter, HalPort};

/// Core clock the SysTick counter runs at.
#[cfg(feature = "pico1")]
pub const CORE_CLOCK_HZ: u32 = 125_000_000;

/// Core clock the SysTick counter runs at.
#[cfg(feature = "pico2")]
pub const CORE_CLOCK_HZ: u32 = 150_000_000;

/// Ticks the emit loop spends between wait points when pins are written through `Output`.
pub const OUTPUT_OVERHEAD_TICKS: u32 = 24;

const SYST_RELOAD: u32 = 0x00FF_FFFF;

/// SysTick as an up-counting 24-bit free-running counter at the core clock.
pub struct SysTickCounter {
    _syst: SYST,
}

impl SysTickCounter {
    /// Take SysTick and start it free-running from the core clock.
    #[must_use]
    pub fn new(mut syst: SYST) -> Self {
        syst.disable_interrupt();
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(SYST_RELOAD);
        syst.clear_current();
        syst.enable_counter();
        info!("SysTick counter running at {} Hz", CORE_CLOCK_HZ);
        Self { _syst: syst }
    }
}

impl FreeRunningCounter for SysTickCounter {
    const HZ: u32 = CORE_CLOCK_HZ;
    const MASK: u32 = SYST_RELOAD;

    #[inline(always)]
    fn now(&self) -> u32 {
        // SysTick counts down
        SYST_RELOAD - (SYST::get_current() & SYST_RELOAD)
    }
}

/// `N` GPIO outputs of an RP chip driven as one port, timed by SysTick.
pub type RpPort<const N: usize> = HalPort<Output<'static>, SysTickCounter, N, OUTPUT_OVERHEAD_TICKS>;
