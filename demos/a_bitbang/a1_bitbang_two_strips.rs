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
    layout::StripLayout,
    pixel::{ColorOrder, as_cells},
    rp::{RpPort, SysTickCounter},
    timing::Ws2812,
    transmitter::InterruptMode,
};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

const SHORT_LEN: usize = 8;
const LONG_LEN: usize = 96;

#[embassy_executor::main]
async fn main(_spawner: Spawner) -> ! {
    let err = inner_main().await.unwrap_err();
    panic!("{err}");
}

async fn inner_main() -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());
    let core = cortex_m::Peripherals::take().ok_or(Error::PeripheralInit)?;

    let port: RpPort<2> = RpPort::new(SysTickCounter::new(core.SYST))
        .with_pin(0, Output::new(p.PIN_0, Level::Low))?
        .with_pin(3, Output::new(p.PIN_3, Level::Low))?;
    let driver = BitBangDriver::<_, Ws2812>::new(port, InterruptMode::Masked);

    let mut short = [RGB8::default(); SHORT_LEN];
    let mut long = [RGB8::default(); LONG_LEN];
    let short = as_cells(&mut short);
    let long = as_cells(&mut long);

    let mut controller = BulkController::<_, 2>::new(driver, ColorOrder::Grb);
    controller.add(0, short, SHORT_LEN, StripLayout::Linear)?;
    controller.add(3, long, LONG_LEN, StripLayout::Linear)?;

    let palette = [colors::BLUE, colors::LIGHT_GRAY];
    let mut dot = 0;
    loop {
        for (index, pixel) in short.iter().enumerate() {
            pixel.set(palette[(index + dot) % 2]);
        }
        for (index, pixel) in long.iter().enumerate() {
            pixel.set(if index == dot { colors::WHITE } else { colors::BLACK });
        }
        controller.show(64).await?;
        defmt::info!(
            "frame {}: {} us with interrupts masked",
            controller.frames_shown(),
            controller.take_interrupts_masked().as_micros()
        );
        dot = (dot + 1) % LONG_LEN;
        Timer::after(Duration::from_millis(50)).await;
    }
}
