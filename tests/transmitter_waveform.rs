#![allow(missing_docs)]
use clockless_envoy::math8::scale8;
use clockless_envoy::pixel::{ColorOrder, DitherMode, PixelController, PixelSource, as_cells};
use clockless_envoy::sim::SimPort;
use clockless_envoy::strip::Settings;
use clockless_envoy::timing::{TimingConfig, TimingProvider, Ws2812};
use clockless_envoy::transmitter::{
    InterruptMode, LanePhase, LanePort, SingleLaneTransmitter, TransmitOutcome, deadline_reached,
};
use clockless_envoy::{RGB8, Result};

/// One tick per segment: zero bits are 1 tick high, one bits 2, every period 3.
struct Unit;

impl TimingProvider for Unit {
    const TIMING: TimingConfig = TimingConfig::new(1, 2, 3, 1);
}

/// Fixed three-byte LEDs with one scale for every slot.
struct Leds {
    leds: Vec<[u8; 3]>,
    index: usize,
    scale: u8,
}

impl Leds {
    fn new(leds: &[[u8; 3]]) -> Self {
        Self {
            leds: leds.to_vec(),
            index: 0,
            scale: 255,
        }
    }
}

impl PixelSource for Leds {
    fn channels(&self) -> usize {
        3
    }

    fn pixel_count(&self) -> usize {
        self.leds.len()
    }

    fn load_channel(&self, slot: usize) -> u8 {
        self.leds.get(self.index).map_or(0, |led| led[slot])
    }

    fn dither(&self, _slot: usize) -> u8 {
        0
    }

    fn scale(&self, _slot: usize) -> u8 {
        self.scale
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn has_more(&self) -> bool {
        self.index < self.leds.len()
    }

    fn step_dithering(&mut self) {}
}

type UnitTransmitter<const EXTRA: u8> = SingleLaneTransmitter<SimPort, Unit, EXTRA>;

fn unit_transmitter<const EXTRA: u8>(
    port: SimPort,
    mode: InterruptMode,
) -> Result<UnitTransmitter<EXTRA>> {
    let mut transmitter = UnitTransmitter::<EXTRA>::new(port, mode);
    transmitter.port_mut().set_output(3)?;
    Ok(transmitter)
}

#[test]
fn ones_hold_until_t2_and_zeros_drop_at_t1() -> Result<()> {
    let mut transmitter = unit_transmitter::<0>(SimPort::new(), InterruptMode::Masked)?;
    let mut source = Leds::new(&[[0b1011_0000, 0x00, 0xFF]]);

    let outcome = transmitter.transmit(3, &mut source);

    let port = transmitter.port();
    let highs = port.high_times(3);
    assert_eq!(highs.len(), 24);
    assert_eq!(highs[..8], [2, 1, 2, 2, 1, 1, 1, 1]);
    assert!(highs[8..16].iter().all(|&high| high == 1));
    assert!(highs[16..].iter().all(|&high| high == 2));

    // every bit period is exactly t3, chained from the first rise
    let pulses = port.pulses(3);
    for pair in pulses.windows(2) {
        assert_eq!(pair[1].rise.wrapping_sub(pair[0].rise), 3);
    }
    assert_eq!(
        outcome,
        TransmitOutcome::Complete {
            elapsed_ticks: 72,
            masked_ticks: 72
        }
    );
    assert_eq!(transmitter.phase(), LanePhase::Done);
    assert!(!port.is_high(3));
    Ok(())
}

#[test]
fn bytes_decode_in_order_across_leds() -> Result<()> {
    let mut transmitter = unit_transmitter::<0>(SimPort::new(), InterruptMode::Masked)?;
    let leds = [[1, 2, 3], [0x80, 0x40, 0x20], [0xFE, 0x7F, 0xAA]];
    let mut source = Leds::new(&leds);

    transmitter.transmit(3, &mut source);

    let budget = UnitTransmitter::<0>::BUDGET;
    let bytes = transmitter.port().decode_bytes(3, &budget, 0);
    assert_eq!(bytes, leds.concat());
    assert!(transmitter.port().transitions().iter().all(|t| t.pin == 3));
    Ok(())
}

#[test]
fn scale_is_applied_bit_serially() -> Result<()> {
    let mut transmitter = unit_transmitter::<0>(SimPort::new(), InterruptMode::Masked)?;
    let leds = [[200, 100, 7], [255, 1, 128]];
    let mut source = Leds::new(&leds);
    source.scale = 96;

    transmitter.transmit(3, &mut source);

    let budget = UnitTransmitter::<0>::BUDGET;
    let expected: Vec<u8> = leds.concat().iter().map(|&byte| scale8(byte, 96)).collect();
    assert_eq!(transmitter.port().decode_bytes(3, &budget, 0), expected);
    Ok(())
}

#[test]
fn extra_bits_follow_every_byte() -> Result<()> {
    let mut transmitter = unit_transmitter::<1>(SimPort::new(), InterruptMode::Masked)?;
    let mut source = Leds::new(&[[0xFF, 0xFF, 0xFF]]);

    let outcome = transmitter.transmit(3, &mut source);

    let highs = transmitter.port().high_times(3);
    assert_eq!(highs.len(), 27);
    for byte in highs.chunks(9) {
        assert!(byte[..8].iter().all(|&high| high == 2));
        assert_eq!(byte[8], 1);
    }
    let budget = UnitTransmitter::<1>::BUDGET;
    assert_eq!(transmitter.port().decode_bytes(3, &budget, 1), [0xFF; 3]);
    assert_eq!(outcome.elapsed_ticks(), 81);
    Ok(())
}

#[test]
fn counter_wrap_keeps_bit_periods_exact() -> Result<()> {
    let mut transmitter =
        unit_transmitter::<0>(SimPort::starting_at(u32::MAX - 10), InterruptMode::Masked)?;
    let leds = [[0xA5, 0x5A, 0x3C], [0x00, 0xFF, 0x81]];
    let mut source = Leds::new(&leds);

    let outcome = transmitter.transmit(3, &mut source);

    let port = transmitter.port();
    assert_eq!(port.now(), 133); // wrapped
    let budget = UnitTransmitter::<0>::BUDGET;
    assert_eq!(port.decode_bytes(3, &budget, 0), leds.concat());
    for pair in port.pulses(3).windows(2) {
        assert_eq!(pair[1].rise.wrapping_sub(pair[0].rise), 3);
    }
    assert_eq!(outcome.elapsed_ticks(), 144);
    Ok(())
}

#[test]
fn deadline_comparison_is_wrap_aware() {
    assert!(deadline_reached(5, 5, u32::MAX));
    assert!(deadline_reached(6, 5, u32::MAX));
    assert!(!deadline_reached(4, 5, u32::MAX));
    assert!(deadline_reached(2, u32::MAX - 2, u32::MAX));
    assert!(!deadline_reached(u32::MAX - 2, 2, u32::MAX));
    // 24-bit counter
    assert!(deadline_reached(0x00_0001, 0xFF_FFFF, 0xFF_FFFF));
    assert!(!deadline_reached(0xFF_FFFF, 0x00_0001, 0xFF_FFFF));
}

#[test]
fn empty_source_sends_nothing() -> Result<()> {
    let mut transmitter = unit_transmitter::<0>(SimPort::new(), InterruptMode::Masked)?;
    let mut source = Leds::new(&[]);

    let outcome = transmitter.transmit(3, &mut source);

    assert_eq!(
        outcome,
        TransmitOutcome::Complete {
            elapsed_ticks: 0,
            masked_ticks: 0
        }
    );
    assert!(transmitter.port().transitions().is_empty());
    assert_eq!(transmitter.phase(), LanePhase::Idle);
    Ok(())
}

#[test]
fn ws2812_pulse_widths_at_one_ghz() -> Result<()> {
    let mut transmitter =
        SingleLaneTransmitter::<SimPort, Ws2812>::new(SimPort::new(), InterruptMode::Masked);
    transmitter.port_mut().set_output(0)?;
    let mut source = Leds::new(&[[0xF0, 0x0F, 0x00]]);

    let outcome = transmitter.transmit(0, &mut source);

    let highs = transmitter.port().high_times(0);
    assert_eq!(highs[..8], [875, 875, 875, 875, 250, 250, 250, 250]);
    assert_eq!(highs[8..16], [250, 250, 250, 250, 875, 875, 875, 875]);
    assert_eq!(outcome.elapsed_ticks(), 24 * 1250);
    Ok(())
}

#[test]
fn pipeline_matches_per_byte_pixel_math() -> Result<()> {
    let mut pixels = [
        RGB8::new(1, 2, 3),
        RGB8::new(40, 0, 9),
        RGB8::new(250, 128, 17),
        RGB8::new(5, 5, 5),
    ];
    let pixels = as_cells(&mut pixels);
    let settings = Settings {
        correction: RGB8::new(255, 200, 180),
        ..Settings::DEFAULT
    };
    let source = PixelController::new(pixels, ColorOrder::Grb, &settings, 100, 3);

    let mut reference = source.clone();
    let mut expected = Vec::new();
    while reference.has_more() {
        for slot in 0..reference.channels() {
            expected.push(reference.load_and_scale_channel(slot));
        }
        reference.advance();
        reference.step_dithering();
    }

    let mut transmitter = unit_transmitter::<0>(SimPort::new(), InterruptMode::Masked)?;
    let mut source = source;
    transmitter.transmit(3, &mut source);

    let budget = UnitTransmitter::<0>::BUDGET;
    assert_eq!(transmitter.port().decode_bytes(3, &budget, 0), expected);
    Ok(())
}

#[test]
fn color_order_reaches_the_wire() -> Result<()> {
    let mut pixels = [RGB8::new(0x01, 0x80, 0xFF)];
    let pixels = as_cells(&mut pixels);
    let settings = Settings {
        dither: DitherMode::Disabled,
        ..Settings::DEFAULT
    };
    let mut source = PixelController::new(pixels, ColorOrder::Grb, &settings, 255, 0);
    let mut transmitter = unit_transmitter::<0>(SimPort::new(), InterruptMode::Masked)?;

    transmitter.transmit(3, &mut source);

    let budget = UnitTransmitter::<0>::BUDGET;
    assert_eq!(transmitter.port().decode_bytes(3, &budget, 0), [0x80, 0x01, 0xFF]);
    Ok(())
}

// ====== Bounded interrupt mode ======

/// A chipset with a 700 ns trailing low segment.
struct LongLow;

impl TimingProvider for LongLow {
    const TIMING: TimingConfig = TimingConfig::new(100, 200, 900, 50);
}

fn long_low_gap_outcome(stall_ticks: u32) -> Result<TransmitOutcome> {
    let mut port = SimPort::new();
    port.stall_after_rises(24, stall_ticks);
    let mut transmitter =
        SingleLaneTransmitter::<_, LongLow>::new(port, InterruptMode::Bounded { max_gap_us: 1 });
    transmitter.port_mut().set_output(3)?;
    let mut source = Leds::new(&[[0xFF, 0xFF, 0xFF], [0x0F, 0xF0, 0x5A]]);
    Ok(transmitter.transmit(3, &mut source))
}

#[test]
fn bounded_mode_without_interrupts_matches_masked_output() -> Result<()> {
    let mut transmitter =
        unit_transmitter::<0>(SimPort::new(), InterruptMode::Bounded { max_gap_us: 1 })?;
    let leds = [[9, 8, 7], [6, 5, 4], [3, 2, 1]];
    let mut source = Leds::new(&leds);

    let outcome = transmitter.transmit(3, &mut source);

    let budget = UnitTransmitter::<0>::BUDGET;
    assert_eq!(transmitter.port().decode_bytes(3, &budget, 0), leds.concat());
    assert_eq!(
        outcome,
        TransmitOutcome::Complete {
            elapsed_ticks: 216,
            masked_ticks: 216
        }
    );
    Ok(())
}

#[test]
fn short_interrupt_between_leds_is_tolerated() -> Result<()> {
    let mut port = SimPort::new();
    // after the first LED (24 rises) an interrupt steals 50 ns
    port.stall_after_rises(24, 50);
    let mut transmitter = unit_transmitter::<0>(port, InterruptMode::Bounded { max_gap_us: 1 })?;
    let leds = [[0xC3, 0x3C, 0x99], [0x11, 0x22, 0x33]];
    let mut source = Leds::new(&leds);

    let outcome = transmitter.transmit(3, &mut source);

    assert!(outcome.is_complete());
    let budget = UnitTransmitter::<0>::BUDGET;
    assert_eq!(transmitter.port().decode_bytes(3, &budget, 0), leds.concat());
    // the interrupt time is not counted as masked
    assert_eq!(outcome.masked_ticks(), 144);
    assert_eq!(outcome.elapsed_ticks(), 144 + 49);
    Ok(())
}

#[test]
fn long_interrupt_between_leds_aborts() -> Result<()> {
    let mut port = SimPort::new();
    port.stall_after_rises(24, 5_000);
    let mut transmitter = unit_transmitter::<0>(port, InterruptMode::Bounded { max_gap_us: 1 })?;
    let mut source = Leds::new(&[[1, 1, 1], [2, 2, 2], [3, 3, 3]]);

    let outcome = transmitter.transmit(3, &mut source);

    match outcome {
        TransmitOutcome::Aborted {
            leds_sent,
            masked_ticks,
            ..
        } => {
            assert_eq!(leds_sent, 1);
            assert_eq!(masked_ticks, 72);
        }
        TransmitOutcome::Complete { .. } => panic!("expected an abort"),
    }
    assert_eq!(transmitter.port().high_times(3).len(), 24);
    assert!(!transmitter.port().is_high(3));
    assert_eq!(transmitter.phase(), LanePhase::Idle);
    Ok(())
}

#[test]
fn bounded_gap_counts_the_scheduled_low_segment() -> Result<()> {
    // 900 ns stall: 200 ns past the period end, 900 ns low in total
    assert!(long_low_gap_outcome(900)?.is_complete());

    // 1200 ns stall: only 500 ns past the period end, but 1200 ns low
    match long_low_gap_outcome(1_200)? {
        TransmitOutcome::Aborted { leds_sent, .. } => assert_eq!(leds_sent, 1),
        TransmitOutcome::Complete { .. } => panic!("expected an abort"),
    }
    Ok(())
}
