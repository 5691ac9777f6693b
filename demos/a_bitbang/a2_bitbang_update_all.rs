#![allow(missing_docs)]
#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::{convert::Infallible, panic};

use clockless_envoy::{
    Error, RGB8, Result,
    controller::BulkController,
    colors,
    driver::bitbang::BitBangDriver,
    layout::{LedLayout, StripLayout},
    pixel::{ColorOrder, DitherMode, as_cells},
    rp::{RpPort, SysTickCounter},
    timing::Ws2812,
    transmitter::InterruptMode,
};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

// 12x4 panel wired in a serpentine, plus a plain 30-LED strip.
const PANEL_LEN: usize = 48;
static PANEL: LedLayout<PANEL_LEN, 12, 4> = LedLayout::serpentine_column_major();
const STRIP_LEN: usize = 30;

const WARM: RGB8 = RGB8::new(255, 176, 96);
const COOL: RGB8 = RGB8::new(200, 220, 255);

#[embassy_executor::main]
async fn main(_spawner: Spawner) -> ! {
    let err = inner_main().await.unwrap_err();
    panic!("{err}");
}

async fn inner_main() -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());
    let core = cortex_m::Peripherals::take().ok_or(Error::PeripheralInit)?;

    let port: RpPort<2> = RpPort::new(SysTickCounter::new(core.SYST))
        .with_pin(4, Output::new(p.PIN_4, Level::Low))?
        .with_pin(6, Output::new(p.PIN_6, Level::Low))?;
    // Bounded mode keeps the executor's timer interrupt serviced between LEDs.
    let driver = BitBangDriver::<_, Ws2812>::new(port, InterruptMode::Bounded { max_gap_us: 30 });

    let mut panel = [RGB8::default(); PANEL_LEN];
    let mut strip = [RGB8::default(); STRIP_LEN];
    let panel = as_cells(&mut panel);
    let strip = as_cells(&mut strip);

    let mut controller = BulkController::<_, 2>::new(driver, ColorOrder::Grb);
    controller.set_dither(DitherMode::Binary);
    controller.add(4, panel, PANEL_LEN, StripLayout::from(&PANEL))?;
    controller.add(6, strip, STRIP_LEN, StripLayout::Linear)?;

    // A per-strip tweak that update_all_settings will overwrite.
    if let Some(descriptor) = controller.get_mut(6) {
        descriptor.set_correction(colors::RED);
    }

    let layout = StripLayout::from(&PANEL);
    for (index, pixel) in panel.iter().enumerate() {
        let Some((x, _)) = layout.position(index) else {
            continue;
        };
        pixel.set(if x % 2 == 0 { colors::ORANGE } else { colors::TEAL });
    }
    for pixel in strip {
        pixel.set(colors::WHITE);
    }

    let mut warm = true;
    loop {
        // Slow ramp so the dithering shows on the dim end.
        for brightness in (4..=96).chain((4..96).rev()) {
            controller.show(brightness).await?;
            Timer::after(Duration::from_millis(20)).await;
        }
        controller
            .update_all_settings()
            .set_temperature(if warm { WARM } else { COOL });
        warm = !warm;
        defmt::info!(
            "temperature swapped after {} frames, {} aborted",
            controller.frames_shown(),
            controller.driver().aborted_transmissions()
        );
    }
}
