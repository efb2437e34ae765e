//! Concrete tile instances.

use smallvec::SmallVec;

use super::kind::{TileKind, TileShape};
use crate::geometry::{Coord, Rect};

/// A tile kind instantiated at a concrete size and signedness.
///
/// Widths are given in grid orientation; see
/// [`Parametrization::multiplier_widths`] for the operand order of the
/// underlying multiplier.
#[derive(Clone, Debug, PartialEq)]
pub struct Parametrization {
    kind: TileKind,
    wx: u32,
    wy: u32,
    signed_x: bool,
    signed_y: bool,
    shape_param: u32,
    output_weights: SmallVec<[u32; 4]>,
}

impl Parametrization {
    pub(super) fn new(
        kind: TileKind,
        wx: u32,
        wy: u32,
        signed_x: bool,
        signed_y: bool,
        shape_param: u32,
    ) -> Parametrization {
        Parametrization {
            kind,
            wx,
            wy,
            signed_x,
            signed_y,
            shape_param,
            output_weights: SmallVec::new(),
        }
    }

    pub(super) fn with_weights(
        mut self,
        weights: SmallVec<[u32; 4]>,
    ) -> Parametrization {
        self.output_weights = weights;
        self
    }

    pub fn kind(&self) -> &TileKind {
        &self.kind
    }

    pub fn wx(&self) -> u32 {
        self.wx
    }

    pub fn wy(&self) -> u32 {
        self.wy
    }

    pub fn is_signed_x(&self) -> bool {
        self.signed_x
    }

    pub fn is_signed_y(&self) -> bool {
        self.signed_y
    }

    /// Size parameter of the shape: `k` for 2×k tiles, the shape id for
    /// irregular and super tiles, the order for Karatsuba tiles.
    pub fn shape_param(&self) -> u32 {
        self.shape_param
    }

    /// Weights, relative to the anchor, of the partial results of a
    /// multi-term tile. Empty for tiles with a single output word.
    pub fn output_weights(&self) -> &[u32] {
        &self.output_weights
    }

    pub fn is_flipped(&self) -> bool {
        matches!(self.kind.shape(), TileShape::Dsp { flipped: true, .. })
    }

    /// Operand widths of the multiplier, undoing any transposition.
    pub fn multiplier_widths(&self) -> (u32, u32) {
        if self.is_flipped() {
            (self.wy, self.wx)
        } else {
            (self.wx, self.wy)
        }
    }

    pub fn bounding_box(&self, anchor: Coord) -> Rect {
        Rect::new(anchor.x, anchor.y, self.wx, self.wy)
    }

    /// Whether the cell at offset `(dx, dy)` from the anchor contributes a
    /// partial product bit.
    pub fn shape_valid(&self, dx: i32, dy: i32) -> bool {
        self.kind.shape_valid(self, dx, dy)
    }

    /// Cells covered by the tile anchored at `anchor`.
    pub fn cells(&self, anchor: Coord) -> impl Iterator<Item = Coord> + '_ {
        self.bounding_box(anchor)
            .cells()
            .filter(move |c| self.shape_valid(c.x - anchor.x, c.y - anchor.y))
    }

    pub fn relative_lsb(&self) -> u32 {
        self.kind.relative_lsb(self)
    }

    pub fn relative_msb(&self) -> u32 {
        self.kind.relative_msb(self)
    }

    pub fn out_word_size(&self) -> u32 {
        self.relative_msb() - self.relative_lsb() + 1
    }

    pub fn lut_cost(&self, anchor: Coord, bounds_x: u32, bounds_y: u32) -> f64 {
        self.kind.lut_cost(self, anchor, bounds_x, bounds_y)
    }

    pub fn own_lut_cost(
        &self,
        anchor: Coord,
        bounds_x: u32,
        bounds_y: u32,
    ) -> f64 {
        self.kind.own_lut_cost(self, anchor, bounds_x, bounds_y)
    }

    /// Marks the tile anchored at `anchor` signed in each dimension in which
    /// it reaches the most-significant bit of a signed `wx × wy` multiplier.
    /// Flags already set are kept; unsigned multipliers are returned
    /// unchanged.
    pub fn with_edge_signs(
        &self,
        anchor: Coord,
        wx: u32,
        wy: u32,
        signed_io: bool,
    ) -> Parametrization {
        if !signed_io {
            return self.clone();
        }

        let bounds = self.bounding_box(anchor);

        Parametrization {
            signed_x: self.signed_x || bounds.end_x() >= wx as i32,
            signed_y: self.signed_y || bounds.end_y() >= wy as i32,
            ..self.clone()
        }
    }

    /// Adjusts a DSP parametrization anchored at `anchor` in a signed
    /// `wx × wy` multiplier so that it can absorb the operand sign bits.
    ///
    /// A tile ending exactly at an operand's most-significant bit is marked
    /// signed in that dimension. A tile ending one short of it, when the
    /// target's DSP has a wider signed input, is widened by that delta.
    /// Non-DSP tiles and unsigned multipliers are returned unchanged. The
    /// adjustment is idempotent.
    pub fn try_dsp_expand(
        &self,
        anchor: Coord,
        wx: u32,
        wy: u32,
        signed_io: bool,
    ) -> Parametrization {
        if !signed_io || !self.kind.is_dsp() {
            return self.clone();
        }

        let delta = self.kind.signed_delta();

        let adjust = |start: i32, width: u32, bound: u32, signed: bool| {
            let end = start + width as i32;

            if !signed && delta > 0 && end + delta as i32 == bound as i32 {
                (width + delta, true)
            } else {
                (width, signed || end == bound as i32)
            }
        };

        let (tw, sx) = adjust(anchor.x, self.wx, wx, self.signed_x);
        let (th, sy) = adjust(anchor.y, self.wy, wy, self.signed_y);

        self.kind
            .parametrize(tw, th, sx, sy)
            .unwrap_or_else(|| self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Device;

    #[test]
    fn dsp_expansion_is_idempotent() {
        let dsp = TileKind::dsp(&Device::default(), false);
        let p = dsp.full();

        let once = p.try_dsp_expand(Coord::new(0, 0), 25, 18, true);
        assert_eq!((once.wx(), once.wy()), (25, 18));
        assert!(once.is_signed_x() && once.is_signed_y());

        let twice = once.try_dsp_expand(Coord::new(0, 0), 25, 18, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn dsp_expansion_at_edge_only() {
        let dsp = TileKind::dsp(&Device::default(), false);
        let p = dsp.full();

        let at_edge = p.try_dsp_expand(Coord::new(6, 0), 30, 40, true);
        assert_eq!((at_edge.wx(), at_edge.wy()), (24, 17));
        assert!(at_edge.is_signed_x());
        assert!(!at_edge.is_signed_y());

        let inner = p.try_dsp_expand(Coord::new(0, 0), 30, 40, true);
        assert_eq!(inner, p);

        let unsigned = p.try_dsp_expand(Coord::new(0, 0), 25, 18, false);
        assert_eq!(unsigned, p);
    }

    #[test]
    fn edge_signs_follow_the_msb() {
        let lut = TileKind::lut(&Device::default(), 3, 3).full();

        let corner = lut.with_edge_signs(Coord::new(5, 5), 8, 8, true);
        assert!(corner.is_signed_x() && corner.is_signed_y());

        let top = lut.with_edge_signs(Coord::new(0, 6), 8, 8, true);
        assert!(!top.is_signed_x() && top.is_signed_y());

        let inner = lut.with_edge_signs(Coord::new(2, 2), 8, 8, true);
        assert_eq!(inner, lut);

        let unsigned = lut.with_edge_signs(Coord::new(5, 5), 8, 8, false);
        assert_eq!(unsigned, lut);

        assert_eq!(corner.with_edge_signs(Coord::new(5, 5), 8, 8, true), corner);
        assert_eq!(corner.generate_operator().signed, (true, true));
    }

    #[test]
    fn lut_cells_and_widths() {
        let lut = TileKind::lut(&Device::default(), 3, 2);
        let p = lut.full();

        assert_eq!(p.cells(Coord::new(1, 1)).count(), 6);
        assert_eq!(p.out_word_size(), 5);
        assert_eq!(p.multiplier_widths(), (3, 2));
        assert!(lut.parametrize(4, 2, false, false).is_none());
    }
}
