//! Search orders for the next cell to cover.

use itertools::Itertools;
use strum_macros::{Display, EnumString, VariantNames};

use crate::geometry::{Coord, Rect};

/// The order in which a [`Field`](super::Field) hands out uncovered cells.
///
/// Both orders are fixed per field, so the cursor of a state only ever moves
/// forward: every cell before it is covered and stays covered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum CursorPolicy {
    /// Row by row, left to right.
    #[default]
    Line,
    /// By distance from the origin, closest first.
    NearestPoint,
}

impl CursorPolicy {
    /// Lists the cells of a `wx × wy` grid in visiting order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use intmul_tiling::field::CursorPolicy;
    /// # use intmul_tiling::geometry::Coord;
    /// #
    /// let order = CursorPolicy::NearestPoint.order(3, 2);
    ///
    /// assert_eq!(order[..3], [Coord::new(0, 0), Coord::new(1, 0), Coord::new(0, 1)]);
    /// assert_eq!(CursorPolicy::Line.order(3, 2)[3], Coord::new(0, 1));
    /// ```
    pub fn order(self, wx: u32, wy: u32) -> Vec<Coord> {
        let cells = Rect::grid(wx, wy).cells();

        match self {
            CursorPolicy::Line => cells.collect(),
            CursorPolicy::NearestPoint => cells
                .sorted_by_key(|c| {
                    let (x, y) = (i64::from(c.x), i64::from(c.y));

                    (x * x + y * y, c.y, c.x)
                })
                .collect(),
        }
    }
}
