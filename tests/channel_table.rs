#![allow(missing_docs)]
use clockless_envoy::RGB8;
use clockless_envoy::channel::{Channel, ChannelTable, LaneWorker, WorkerPool};
use clockless_envoy::pixel::{ColorOrder, PixelController, as_cells};
use clockless_envoy::sim::SimWorker;
use clockless_envoy::strip::Settings;
use clockless_envoy::timing::Ws2812;
use embassy_futures::block_on;

#[test]
fn allocation_takes_the_lowest_free_slot() {
    let mut table = ChannelTable::<8>::new(8);
    for (expected, pin) in [2_u8, 5, 9, 12].into_iter().enumerate() {
        assert_eq!(table.allocate(pin), Some(Channel::new(expected as u8)));
    }
    assert_eq!(table.free(Channel::new(1)), Some(5));
    assert_eq!(table.free(Channel::new(2)), Some(9));
    assert_eq!(table.allocate(20), Some(Channel::new(1)));
    assert_eq!(table.allocate(21), Some(Channel::new(2)));
    assert_eq!(table.allocate(22), Some(Channel::new(4)));
}

#[test]
fn limit_caps_occupancy() {
    let mut table = ChannelTable::<8>::new(3);
    assert_eq!(table.limit(), 3);
    assert!(table.allocate(1).is_some());
    assert!(table.allocate(2).is_some());
    assert!(table.allocate(3).is_some());
    assert_eq!(table.allocate(4), None);
    assert_eq!(table.occupied(), 3);

    // a limit above the capacity is clamped
    assert_eq!(ChannelTable::<2>::new(10).limit(), 2);
}

#[test]
fn lookups_go_both_ways() {
    let mut table = ChannelTable::<4>::new(4);
    let channel = table.allocate(17);
    assert_eq!(channel, Some(Channel::new(0)));
    assert_eq!(table.channel_of(17), Some(Channel::new(0)));
    assert_eq!(table.pin_of(Channel::new(0)), Some(17));
    assert_eq!(table.channel_of(18), None);
    assert_eq!(table.pin_of(Channel::new(3)), None);
    assert_eq!(table.pin_of(Channel::new(200)), None);
}

#[test]
fn freeing_everything_empties_the_table() {
    let mut table = ChannelTable::<4>::new(4);
    for pin in [3, 4, 5] {
        table.allocate(pin);
    }
    assert_eq!(
        table.iter().collect::<Vec<_>>(),
        [(Channel::new(0), 3), (Channel::new(1), 4), (Channel::new(2), 5)]
    );
    for index in 0..3 {
        table.free(Channel::new(index));
    }
    assert!(table.is_empty());
    assert_eq!(table.free(Channel::new(0)), None);
    assert_eq!(table.free(Channel::new(99)), None);
}

#[test]
fn pool_lends_workers_round_robin() {
    let mut pool = WorkerPool::new([
        SimWorker::<Ws2812>::new(0),
        SimWorker::<Ws2812>::new(0),
    ]);
    assert_eq!(pool.len(), 2);

    block_on(async {
        for pin in [1, 2, 3] {
            let worker = pool.acquire().await;
            worker.attach(pin).ok();
        }
    });

    let [first, second] = pool.workers();
    assert!(first.is_attached(1) && first.is_attached(3));
    assert!(second.is_attached(2));
    assert!(!second.is_attached(1));
}

#[test]
fn acquire_waits_for_a_busy_worker() {
    let mut pool = WorkerPool::new([SimWorker::<Ws2812>::new(3)]);
    let mut pixels = [RGB8::default(); 2];
    let pixels = as_cells(&mut pixels);

    block_on(async {
        for _ in 0..2 {
            let worker = pool.acquire().await;
            assert!(!worker.is_busy());
            worker.attach(4).ok();
            let mut source =
                PixelController::new(pixels, ColorOrder::Grb, &Settings::DEFAULT, 255, 0);
            worker.start(4, &mut source).ok();
        }
        pool.wait_idle().await;
    });

    assert_eq!(pool.workers()[0].frames().len(), 2);
    assert!(!pool.workers()[0].is_busy());
}
