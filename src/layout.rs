//! Spatial layout carried alongside a strip.
//!
//! The transmission core never reads a layout; it only checks that a mapped layout
//! describes exactly as many LEDs as the strip has, so effects code can look up
//! `(x, y)` positions through [`StripDescriptor::layout`](crate::strip::StripDescriptor::layout).
//!
//! See [`LedLayout`] for building a validated mapping at compile time.

/// A strip's spatial layout as stored in its descriptor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StripLayout<'a> {
    /// LEDs in wiring order along one line. Matches any LED count.
    #[default]
    Linear,
    /// One `(x, y)` position per LED, in wiring order.
    Mapped(&'a [(u16, u16)]),
}

impl<'a> StripLayout<'a> {
    /// Number of LEDs a mapped layout describes; `None` for [`StripLayout::Linear`].
    #[must_use]
    pub const fn len(&self) -> Option<usize> {
        match self {
            Self::Linear => None,
            Self::Mapped(map) => Some(map.len()),
        }
    }

    /// True if this layout can describe a strip of `count` LEDs.
    #[must_use]
    pub const fn fits(&self, count: usize) -> bool {
        match self.len() {
            None => true,
            Some(len) => len == count,
        }
    }

    /// `(x, y)` of the LED at wiring index `index`. Linear layouts place LED `i` at `(i, 0)`.
    #[must_use]
    pub fn position(&self, index: usize) -> Option<(u16, u16)> {
        match self {
            Self::Linear => u16::try_from(index).ok().map(|x| (x, 0)),
            Self::Mapped(map) => map.get(index).copied(),
        }
    }
}

impl<'a, const N: usize, const W: usize, const H: usize> From<&'a LedLayout<N, W, H>>
    for StripLayout<'a>
{
    fn from(layout: &'a LedLayout<N, W, H>) -> Self {
        Self::Mapped(layout.index_to_xy())
    }
}

/// Compile-time description of panel geometry and wiring.
///
/// `LedLayout` maps wiring order (LED index along the data line) to `(x, y)` cells of a
/// `W × H` panel. `(0, 0)` is the top-left corner, `x` grows right, `y` grows down.
///
/// Layouts are validated at **compile time** when built in a `const`:
/// - coordinates must be in-bounds
/// - every `(x, y)` cell must appear exactly once
///
/// ```
/// use clockless_envoy::layout::{LedLayout, StripLayout};
///
/// const PANEL: LedLayout<6, 3, 2> = LedLayout::serpentine_row_major();
/// const EXPECTED: LedLayout<6, 3, 2> =
///     LedLayout::new([(0, 0), (1, 0), (2, 0), (2, 1), (1, 1), (0, 1)]);
/// const _: () = assert!(PANEL.equals(&EXPECTED));
///
/// let layout = StripLayout::from(&PANEL);
/// assert_eq!(layout.position(3), Some((2, 1)));
/// ```
///
/// ```text
/// Serpentine 3×2, row-major:
///   LED0  LED1  LED2
///   LED5  LED4  LED3
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedLayout<const N: usize, const W: usize, const H: usize> {
    map: [(u16, u16); N],
}

impl<const N: usize, const W: usize, const H: usize> LedLayout<N, W, H> {
    /// Constructor: verifies the mapping covers every cell of the W×H panel exactly once.
    #[must_use]
    pub const fn new(map: [(u16, u16); N]) -> Self {
        assert!(W > 0 && H > 0, "W and H must be positive");
        assert!(W * H == N, "W*H must equal N");

        let mut seen = [false; N];

        let mut i = 0;
        while i < N {
            let (c, r) = map[i];
            let c = c as usize;
            let r = r as usize;

            assert!(c < W, "column out of bounds");
            assert!(r < H, "row out of bounds");

            let cell = r * W + c;
            assert!(!seen[cell], "duplicate (col,row) in mapping");
            seen[cell] = true;

            i += 1;
        }

        Self { map }
    }

    /// Return the array mapping LED wiring order to `(x, y)` coordinates.
    #[must_use]
    pub const fn index_to_xy(&self) -> &[(u16, u16); N] {
        &self.map
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        W
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        H
    }

    /// Total number of LEDs.
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    /// Always false; a layout has at least one LED.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Const equality, usable in `const _: () = assert!(..)`.
    #[must_use]
    pub const fn equals(&self, other: &Self) -> bool {
        let mut i = 0;
        while i < N {
            if self.map[i].0 != other.map[i].0 || self.map[i].1 != other.map[i].1 {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Single-row strip, left to right.
    #[must_use]
    pub const fn linear_h() -> Self {
        assert!(H == 1, "linear_h requires H == 1");
        assert!(W == N, "linear_h requires W == N");

        let mut mapping = [(0_u16, 0_u16); N];
        let mut x_index = 0;
        while x_index < W {
            mapping[x_index] = (x_index as u16, 0);
            x_index += 1;
        }
        Self::new(mapping)
    }

    /// Single-column strip, top to bottom.
    #[must_use]
    pub const fn linear_v() -> Self {
        assert!(W == 1, "linear_v requires W == 1");
        assert!(H == N, "linear_v requires H == N");

        let mut mapping = [(0_u16, 0_u16); N];
        let mut y_index = 0;
        while y_index < H {
            mapping[y_index] = (0, y_index as u16);
            y_index += 1;
        }
        Self::new(mapping)
    }

    /// Rows alternate direction: row 0 left to right, row 1 right to left, and so on.
    #[must_use]
    pub const fn serpentine_row_major() -> Self {
        let mut mapping = [(0_u16, 0_u16); N];
        let mut row = 0;
        while row < H {
            let mut col = 0;
            while col < W {
                let x = if row % 2 == 0 { col } else { W - 1 - col };
                mapping[row * W + col] = (x as u16, row as u16);
                col += 1;
            }
            row += 1;
        }
        Self::new(mapping)
    }

    /// Columns alternate direction: column 0 top to bottom, column 1 bottom to top, and so on.
    ///
    /// ```text
    /// 3×2:
    ///   LED0  LED3  LED4
    ///   LED1  LED2  LED5
    /// ```
    #[must_use]
    pub const fn serpentine_column_major() -> Self {
        let mut mapping = [(0_u16, 0_u16); N];
        let mut col = 0;
        while col < W {
            let mut row = 0;
            while row < H {
                let y = if col % 2 == 0 { row } else { H - 1 - row };
                mapping[col * H + row] = (col as u16, y as u16);
                row += 1;
            }
            col += 1;
        }
        Self::new(mapping)
    }
}
