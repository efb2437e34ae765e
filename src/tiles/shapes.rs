//! Hand-enumerated tile shapes.

use std::fmt;

use crate::geometry::{Coord, Rect};

/// Row bitmasks of the irregular LUT shapes. Bit `dx` of row `dy` is set when
/// the cell `(dx, dy)` contributes; every shape contains its anchor cell.
const IRREGULAR_ROWS: [&[u8]; IrregularShape::COUNT] = [
    &[0b111, 0b111, 0b011],
    &[0b111, 0b111, 0b110],
    &[0b011, 0b111, 0b111],
    &[0b111, 0b011, 0b001],
    &[0b001, 0b011, 0b111],
    &[0b0111, 0b1110],
    &[0b01, 0b11, 0b11, 0b10],
    &[0b1111, 0b0110],
];

/// One of the irregular LUT multiplier shapes, `A` through `H`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IrregularShape(u8);

impl IrregularShape {
    pub const COUNT: usize = 8;

    pub fn new(id: u8) -> Option<IrregularShape> {
        (usize::from(id) < Self::COUNT).then_some(IrregularShape(id))
    }

    pub fn all() -> impl Iterator<Item = IrregularShape> {
        (0..Self::COUNT as u8).map(IrregularShape)
    }

    pub fn id(self) -> u8 {
        self.0
    }

    fn rows(self) -> &'static [u8] {
        IRREGULAR_ROWS[usize::from(self.0)]
    }

    pub fn width(self) -> u32 {
        self.rows()
            .iter()
            .map(|row| u8::BITS - row.leading_zeros())
            .max()
            .unwrap_or(0)
    }

    pub fn height(self) -> u32 {
        self.rows().len() as u32
    }

    pub fn contains(self, dx: i32, dy: i32) -> bool {
        if !(0..8).contains(&dx) || dy < 0 {
            return false;
        }

        self.rows()
            .get(dy as usize)
            .is_some_and(|row| row & (1 << dx) != 0)
    }

    pub fn cells(self) -> impl Iterator<Item = Coord> {
        Rect::new(0, 0, self.width(), self.height())
            .cells()
            .filter(move |c| self.contains(c.x, c.y))
    }
}

impl fmt::Display for IrregularShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", char::from(b'A' + self.0))
    }
}

/// Placement of the second DSP block relative to the first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stacking {
    Above,
    Right,
}

/// A fused pair of DSP blocks whose products meet in the DSP cascade.
///
/// The two blocks are stored relative to the bounding box of the pair; the
/// second block's bit weight exceeds the first's by exactly the cascade
/// shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SuperTileShape {
    pub id: u8,
    pub first: Rect,
    pub second: Rect,
}

impl SuperTileShape {
    /// Enumerates the supertile shapes for a DSP of the given native widths.
    /// Each block may be used in either orientation and the second block sits
    /// directly above or to the right of the first.
    pub fn enumerate(dsp: (u32, u32), shift: u32) -> Vec<SuperTileShape> {
        let orientations = [dsp, (dsp.1, dsp.0)];
        let mut shapes = Vec::new();

        for first in orientations {
            for second in orientations {
                for stacking in [Stacking::Above, Stacking::Right] {
                    let (dx, dy) = match stacking {
                        Stacking::Above => {
                            (shift as i32 - first.1 as i32, first.1 as i32)
                        }
                        Stacking::Right => {
                            (first.0 as i32, shift as i32 - first.0 as i32)
                        }
                    };

                    let a = Rect::new(0, 0, first.0, first.1);
                    let b = Rect::new(dx, dy, second.0, second.1);

                    if a.overlaps(&b) {
                        continue;
                    }

                    let origin = Coord::new(dx.min(0), dy.min(0));
                    let normalize = Coord::new(-origin.x, -origin.y);

                    shapes.push(SuperTileShape {
                        id: shapes.len() as u8,
                        first: a.translate(normalize),
                        second: b.translate(normalize),
                    });
                }
            }
        }

        shapes
    }

    pub fn width(&self) -> u32 {
        (self.first.end_x().max(self.second.end_x())) as u32
    }

    pub fn height(&self) -> u32 {
        (self.first.end_y().max(self.second.end_y())) as u32
    }

    pub fn contains(&self, dx: i32, dy: i32) -> bool {
        let c = Coord::new(dx, dy);

        self.first.contains(c) || self.second.contains(c)
    }

    /// Recognizes two placed DSP blocks as this supertile, returning the
    /// anchor of the fused tile. The blocks are given as absolute boxes.
    pub fn matches(&self, a: &Rect, b: &Rect) -> Option<Coord> {
        let fits = |lo: &Rect, hi: &Rect| {
            let same_size = lo.w == self.first.w
                && lo.h == self.first.h
                && hi.w == self.second.w
                && hi.h == self.second.h;

            let offset = hi.x - lo.x == self.second.x - self.first.x
                && hi.y - lo.y == self.second.y - self.first.y;

            (same_size && offset)
                .then(|| Coord::new(lo.x - self.first.x, lo.y - self.first.y))
        };

        fits(a, b).or_else(|| fits(b, a))
    }
}

/// The block structure of a Karatsuba DSP group of a given order.
///
/// Operand chunks of `chunk_x` and `chunk_y` bits are placed `stride` bits
/// apart, so that blocks `(i, j)` and `(j, i)` have equal weight and their
/// sum takes a single DSP block fed through the pre-adder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KaratsubaShape {
    pub order: u32,
    pub chunk_x: u32,
    pub chunk_y: u32,
    pub stride: u32,
}

impl KaratsubaShape {
    pub fn new(order: u32, dsp: (u32, u32)) -> KaratsubaShape {
        // The x-differences are formed in fabric and take one extra bit on
        // the narrow port; the pre-adder handles the y-differences.
        let chunk_x = dsp.1 - 1;
        let chunk_y = dsp.0;

        KaratsubaShape {
            order,
            chunk_x,
            chunk_y,
            stride: lcm(chunk_x, chunk_y),
        }
    }

    pub fn width(&self) -> u32 {
        self.order * self.stride + self.chunk_x
    }

    pub fn height(&self) -> u32 {
        self.order * self.stride + self.chunk_y
    }

    pub fn contains(&self, dx: i32, dy: i32) -> bool {
        if dx < 0 || dy < 0 {
            return false;
        }

        let (dx, dy) = (dx as u32, dy as u32);

        dx < self.width()
            && dy < self.height()
            && dx % self.stride < self.chunk_x
            && dy % self.stride < self.chunk_y
    }

    pub fn block(&self, i: u32, j: u32) -> Rect {
        Rect::new(
            (i * self.stride) as i32,
            (j * self.stride) as i32,
            self.chunk_x,
            self.chunk_y,
        )
    }

    /// Number of DSP blocks: one per diagonal block and one per symmetric
    /// pair.
    pub fn dsp_count(&self) -> u32 {
        (self.order + 1) * (self.order + 2) / 2
    }

    /// Width of each DSP partial sum.
    pub fn term_width(&self) -> u32 {
        self.chunk_x + self.chunk_y + 1
    }

    /// Relative weights of the partial sums, diagonal terms first.
    pub fn term_weights(&self) -> impl Iterator<Item = u32> + '_ {
        let n = self.order;
        let diagonal = (0..=n).map(move |i| 2 * i * self.stride);
        let pairs = (0..=n).flat_map(move |i| {
            (i + 1..=n).map(move |j| (i + j) * self.stride)
        });

        diagonal.chain(pairs)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: u32, b: u32) -> u32 {
    a / gcd(a, b) * b
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn irregular_shapes_fit_six_inputs() {
        for shape in IrregularShape::all() {
            assert!(shape.contains(0, 0), "shape {shape} misses its anchor");
            assert!(shape.width() + shape.height() <= 6);
            assert!(shape.cells().count() > 1);
        }

        assert_eq!(IrregularShape::new(0).unwrap().cells().count(), 8);
        assert_eq!(IrregularShape::new(3).unwrap().cells().count(), 6);
        assert!(IrregularShape::new(8).is_none());
    }

    #[test]
    fn supertiles_respect_cascade_shift() {
        let shapes = SuperTileShape::enumerate((24, 17), 17);

        assert_eq!(shapes.len(), 8);

        for shape in &shapes {
            let lo = shape.first.origin().weight();
            let hi = shape.second.origin().weight();

            assert_eq!(hi - lo, 17);
            assert!(!shape.first.overlaps(&shape.second));
            assert!(shape.first.x >= 0 && shape.second.x >= 0);
            assert!(shape.first.y >= 0 && shape.second.y >= 0);
        }
    }

    #[test]
    fn supertiles_are_the_touching_pairs() {
        let shapes = SuperTileShape::enumerate((24, 17), 17);

        for (i, shape) in shapes.iter().enumerate() {
            assert_eq!(usize::from(shape.id), i);

            let (a, b) = (shape.first, shape.second);
            let beside = a.end_x() == b.x && a.y < b.end_y() && b.y < a.end_y();
            let above = a.end_y() == b.y && a.x < b.end_x() && b.x < a.end_x();
            assert!(beside || above, "shape {i} blocks do not touch");

            for other in &shapes[i + 1..] {
                assert!((other.first, other.second) != (a, b));
            }
        }

        // Two orientations for each block, stacked above or to the right.
        let sizes = shapes
            .iter()
            .map(|s| ((s.first.w, s.first.h), (s.second.w, s.second.h)))
            .counts();
        assert_eq!(sizes.len(), 4);
        assert!(sizes.values().all(|&n| n == 2));
    }

    #[test]
    fn supertile_recognition() {
        let shapes = SuperTileShape::enumerate((24, 17), 17);

        // Two horizontal blocks stacked on top of each other.
        let a = Rect::new(10, 0, 24, 17);
        let b = Rect::new(10, 17, 24, 17);

        let hits = shapes
            .iter()
            .filter_map(|s| s.matches(&a, &b).map(|anchor| (s.id, anchor)))
            .collect::<Vec<_>>();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, Coord::new(10, 0));

        // Argument order does not matter.
        let flipped = shapes[usize::from(hits[0].0)].matches(&b, &a);
        assert_eq!(flipped, Some(Coord::new(10, 0)));

        let apart = Rect::new(10, 18, 24, 17);
        assert!(shapes.iter().all(|s| s.matches(&a, &apart).is_none()));
    }

    #[test]
    fn karatsuba_blocks() {
        let shape = KaratsubaShape::new(1, (24, 17));

        assert_eq!((shape.chunk_x, shape.chunk_y, shape.stride), (16, 24, 48));
        assert_eq!((shape.width(), shape.height()), (64, 72));
        assert_eq!(shape.dsp_count(), 3);
        assert_eq!(shape.term_width(), 41);
        assert_eq!(shape.term_weights().collect::<Vec<_>>(), [0, 96, 48]);

        assert!(shape.contains(0, 0));
        assert!(shape.contains(15, 23));
        assert!(!shape.contains(16, 0));
        assert!(!shape.contains(0, 24));
        assert!(shape.contains(48, 48));
        assert!(shape.contains(63, 71));
        assert!(!shape.contains(64, 71));
    }
}
