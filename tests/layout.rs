#![allow(missing_docs)]
//! Host-level tests for strip layouts.

use clockless_envoy::layout::{LedLayout, StripLayout};

#[test]
fn linear_h_returns_expected() {
    const LINEAR: LedLayout<5, 5, 1> = LedLayout::linear_h();
    assert_eq!(
        LINEAR.index_to_xy(),
        &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]
    );
}

#[test]
fn linear_v_returns_expected() {
    const LINEAR: LedLayout<5, 1, 5> = LedLayout::linear_v();
    assert_eq!(
        LINEAR.index_to_xy(),
        &[(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)]
    );
}

#[test]
fn serpentine_row_major_3x2_matches_expected() {
    const MAP: LedLayout<6, 3, 2> = LedLayout::serpentine_row_major();
    assert_eq!(
        *MAP.index_to_xy(),
        [(0, 0), (1, 0), (2, 0), (2, 1), (1, 1), (0, 1)]
    );
    assert_eq!(MAP.width(), 3);
    assert_eq!(MAP.height(), 2);
    assert_eq!(MAP.len(), 6);
    assert!(!MAP.is_empty());
}

#[test]
fn serpentine_column_major_3x2_matches_expected() {
    const MAP: LedLayout<6, 3, 2> = LedLayout::serpentine_column_major();
    assert_eq!(
        *MAP.index_to_xy(),
        [(0, 0), (0, 1), (1, 1), (1, 0), (2, 0), (2, 1)]
    );
}

#[test]
fn const_equality() {
    const A: LedLayout<4, 2, 2> = LedLayout::new([(0, 0), (1, 0), (0, 1), (1, 1)]);
    const B: LedLayout<4, 2, 2> = LedLayout::new([(0, 0), (1, 0), (1, 1), (0, 1)]);
    const _: () = assert!(A.equals(&A));
    assert!(!A.equals(&B));
    assert!(B.equals(&LedLayout::serpentine_row_major()));
}

#[test]
#[should_panic(expected = "duplicate (col,row) in mapping")]
fn duplicate_cells_are_rejected() {
    let _ = LedLayout::<2, 2, 1>::new([(0, 0), (0, 0)]);
}

#[test]
#[should_panic(expected = "column out of bounds")]
fn out_of_bounds_cells_are_rejected() {
    let _ = LedLayout::<2, 2, 1>::new([(0, 0), (2, 0)]);
}

#[test]
fn strip_layout_positions() {
    const PANEL: LedLayout<6, 3, 2> = LedLayout::serpentine_row_major();
    let mapped = StripLayout::from(&PANEL);
    assert_eq!(mapped.len(), Some(6));
    assert!(mapped.fits(6));
    assert!(!mapped.fits(5));
    assert_eq!(mapped.position(4), Some((1, 1)));
    assert_eq!(mapped.position(6), None);

    let linear = StripLayout::default();
    assert_eq!(linear, StripLayout::Linear);
    assert_eq!(linear.len(), None);
    assert!(linear.fits(1000));
    assert_eq!(linear.position(7), Some((7, 0)));
    assert_eq!(linear.position(70_000), None);
}
