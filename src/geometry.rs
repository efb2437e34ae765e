//! Grid coordinates and rectangles.

use std::fmt;

/// A position on the multiplier grid. The `x` axis indexes bits of the first
/// operand, the `y` axis bits of the second; a cell at `(x, y)` carries the
/// partial product bit of weight `x + y`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Coord {
        Coord { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Coord {
        Coord {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Significance of the product bit at this position.
    pub const fn weight(self) -> i32 {
        self.x + self.y
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned box of cells `[x, x + w) × [y, y + h)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Rect {
        Rect { x, y, w, h }
    }

    /// The grid of a `wx × wy` multiplier.
    pub const fn grid(wx: u32, wy: u32) -> Rect {
        Rect::new(0, 0, wx, wy)
    }

    pub const fn end_x(&self) -> i32 {
        self.x + self.w as i32
    }

    pub const fn end_y(&self) -> i32 {
        self.y + self.h as i32
    }

    pub const fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub const fn origin(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    pub const fn contains(&self, c: Coord) -> bool {
        c.x >= self.x && c.x < self.end_x() && c.y >= self.y && c.y < self.end_y()
    }

    /// Computes the intersection of two boxes. The result is empty (zero
    /// width or height) if they are disjoint.
    ///
    /// # Examples
    ///
    /// ```
    /// # use intmul_tiling::geometry::Rect;
    /// #
    /// let tile = Rect::new(-2, 6, 3, 3);
    ///
    /// assert_eq!(tile.intersect(&Rect::grid(8, 8)), Rect::new(0, 6, 1, 2));
    /// assert!(tile.intersect(&Rect::grid(4, 4)).is_empty());
    /// ```
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let end_x = self.end_x().min(other.end_x());
        let end_y = self.end_y().min(other.end_y());

        if end_x <= x || end_y <= y {
            Rect::new(x, y, 0, 0)
        } else {
            Rect::new(x, y, (end_x - x) as u32, (end_y - y) as u32)
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn translate(&self, by: Coord) -> Rect {
        Rect::new(self.x + by.x, self.y + by.y, self.w, self.h)
    }

    /// Iterates over the cells of the box in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Coord> {
        let Rect { x, y, .. } = *self;
        let (end_x, end_y) = (self.end_x(), self.end_y());

        (y..end_y).flat_map(move |j| (x..end_x).map(move |i| Coord::new(i, j)))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}@({}, {})", self.w, self.h, self.x, self.y)
    }
}
