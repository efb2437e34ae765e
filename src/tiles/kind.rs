//! Tile kinds.
//!
//! A [`TileKind`] describes one family of physical multiplier primitives: its
//! bounding box, which cells of the box contribute a partial product bit, and
//! what it costs. Kinds are produced once per catalog and stamp out concrete
//! [`Parametrization`]s.

use smallvec::{SmallVec, smallvec};

use super::cost::{CostFigures, CostModel, output_bits};
use super::parametrization::Parametrization;
use super::shapes::{IrregularShape, KaratsubaShape, SuperTileShape};
use crate::geometry::{Coord, Rect};
use crate::target::Target;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TileShape {
    /// A DSP block with unsigned widths `wx × wy` in grid orientation.
    /// `flipped` marks a block used with its operands swapped.
    Dsp {
        wx: u32,
        wy: u32,
        flipped: bool,
        signed_delta: u32,
    },
    /// A `wx × wy` multiplier mapped to plain LUTs.
    Lut { wx: u32, wy: u32 },
    /// A `k × 2` (or `2 × k` when `vertical`) carry-chain multiplier, sized
    /// at placement time.
    Variable2xK { max_k: u32, vertical: bool },
    IrregularLut(IrregularShape),
    DspSuperTile(SuperTileShape),
    DspKaratsuba(KaratsubaShape),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileKind {
    shape: TileShape,
    cost: CostModel,
}

impl TileKind {
    pub fn new(shape: TileShape, cost: CostModel) -> TileKind {
        TileKind { shape, cost }
    }

    /// The native DSP block of the target, optionally transposed.
    pub fn dsp<T: Target + ?Sized>(target: &T, flipped: bool) -> TileKind {
        let (wx, wy) = target.dsp_widths();
        let (wx, wy) = if flipped { (wy, wx) } else { (wx, wy) };

        TileKind::new(
            TileShape::Dsp {
                wx,
                wy,
                flipped,
                signed_delta: target.dsp_signed_delta(),
            },
            CostModel::from_target(target),
        )
    }

    pub fn lut<T: Target + ?Sized>(target: &T, wx: u32, wy: u32) -> TileKind {
        TileKind::new(TileShape::Lut { wx, wy }, CostModel::from_target(target))
    }

    pub fn shape(&self) -> &TileShape {
        &self.shape
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    pub fn name(&self) -> String {
        match &self.shape {
            TileShape::Dsp { wx, wy, .. } => format!("DSP{wx}x{wy}"),
            TileShape::Lut { wx, wy } => format!("LUT{wx}x{wy}"),
            TileShape::Variable2xK { vertical: false, .. } => "Xilinxkx2".into(),
            TileShape::Variable2xK { vertical: true, .. } => "Xilinx2xk".into(),
            TileShape::IrregularLut(shape) => format!("IrregularLUT{shape}"),
            TileShape::DspSuperTile(shape) => format!("DSPSuperTile{}", shape.id),
            TileShape::DspKaratsuba(shape) => {
                format!("DSPKaratsuba{}", shape.order)
            }
        }
    }

    /// Width of the bounding box with unsigned operands.
    pub fn max_width(&self) -> u32 {
        match &self.shape {
            TileShape::Dsp { wx, .. } | TileShape::Lut { wx, .. } => *wx,
            TileShape::Variable2xK { max_k, vertical } => {
                if *vertical { 2 } else { *max_k }
            }
            TileShape::IrregularLut(shape) => shape.width(),
            TileShape::DspSuperTile(shape) => shape.width(),
            TileShape::DspKaratsuba(shape) => shape.width(),
        }
    }

    /// Height of the bounding box with unsigned operands.
    pub fn max_height(&self) -> u32 {
        match &self.shape {
            TileShape::Dsp { wy, .. } | TileShape::Lut { wy, .. } => *wy,
            TileShape::Variable2xK { max_k, vertical } => {
                if *vertical { *max_k } else { 2 }
            }
            TileShape::IrregularLut(shape) => shape.height(),
            TileShape::DspSuperTile(shape) => shape.height(),
            TileShape::DspKaratsuba(shape) => shape.height(),
        }
    }

    /// Number of contributing cells of the full-size tile.
    pub fn area(&self) -> u32 {
        match &self.shape {
            TileShape::IrregularLut(shape) => shape.cells().count() as u32,
            TileShape::DspSuperTile(shape) => {
                (shape.first.area() + shape.second.area()) as u32
            }
            TileShape::DspKaratsuba(shape) => {
                (shape.order + 1).pow(2) * shape.chunk_x * shape.chunk_y
            }
            _ => self.max_width() * self.max_height(),
        }
    }

    pub fn dsp_cost(&self) -> u32 {
        match &self.shape {
            TileShape::Dsp { .. } => 1,
            TileShape::DspSuperTile(_) => 2,
            TileShape::DspKaratsuba(shape) => shape.dsp_count(),
            _ => 0,
        }
    }

    /// Whether this is a single plain DSP block.
    pub fn is_dsp(&self) -> bool {
        matches!(self.shape, TileShape::Dsp { .. })
    }

    pub fn is_rectangular(&self) -> bool {
        matches!(
            self.shape,
            TileShape::Dsp { .. }
                | TileShape::Lut { .. }
                | TileShape::Variable2xK { .. }
        )
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.shape, TileShape::Variable2xK { .. })
    }

    pub fn is_irregular(&self) -> bool {
        matches!(self.shape, TileShape::IrregularLut(_))
    }

    pub fn is_super_tile(&self) -> bool {
        matches!(self.shape, TileShape::DspSuperTile(_))
    }

    pub fn is_karatsuba(&self) -> bool {
        matches!(self.shape, TileShape::DspKaratsuba(_))
    }

    pub fn signed_delta(&self) -> u32 {
        match self.shape {
            TileShape::Dsp { signed_delta, .. } => signed_delta,
            _ => 0,
        }
    }

    /// Whether `other` is this kind with its dimensions transposed.
    pub fn is_transpose_of(&self, other: &TileKind) -> bool {
        self.is_dsp()
            && other.is_dsp()
            && self.max_width() == other.max_height()
            && self.max_height() == other.max_width()
            && self.max_width() != self.max_height()
    }

    /// The full-size parametrization with unsigned operands.
    pub fn full(&self) -> Parametrization {
        let (wx, wy) = (self.max_width(), self.max_height());

        Parametrization::new(*self, wx, wy, false, false, self.shape_param(wx, wy))
            .with_weights(self.output_weights())
    }

    /// Instantiates the kind at a concrete size. Returns `None` if the size
    /// exceeds the bounding box, is empty, or is not one the kind supports.
    pub fn parametrize(
        &self,
        wx: u32,
        wy: u32,
        signed_x: bool,
        signed_y: bool,
    ) -> Option<Parametrization> {
        if wx == 0 || wy == 0 {
            return None;
        }

        let fits = match &self.shape {
            TileShape::Dsp { signed_delta, .. } => {
                let max_x = self.max_width() + if signed_x { *signed_delta } else { 0 };
                let max_y = self.max_height() + if signed_y { *signed_delta } else { 0 };

                wx <= max_x && wy <= max_y
            }
            TileShape::Lut { .. } => {
                wx <= self.max_width() && wy <= self.max_height()
            }
            TileShape::Variable2xK { max_k, vertical: false } => {
                wy == 2 && wx <= *max_k
            }
            TileShape::Variable2xK { max_k, vertical: true } => {
                wx == 2 && wy <= *max_k
            }
            TileShape::IrregularLut(_)
            | TileShape::DspSuperTile(_)
            | TileShape::DspKaratsuba(_) => {
                wx == self.max_width() && wy == self.max_height()
            }
        };

        fits.then(|| {
            Parametrization::new(
                *self,
                wx,
                wy,
                signed_x,
                signed_y,
                self.shape_param(wx, wy),
            )
            .with_weights(self.output_weights())
        })
    }

    fn shape_param(&self, wx: u32, wy: u32) -> u32 {
        match &self.shape {
            TileShape::Variable2xK { vertical: false, .. } => wx,
            TileShape::Variable2xK { vertical: true, .. } => wy,
            TileShape::IrregularLut(shape) => u32::from(shape.id()),
            TileShape::DspSuperTile(shape) => u32::from(shape.id),
            TileShape::DspKaratsuba(shape) => shape.order,
            _ => 0,
        }
    }

    fn output_weights(&self) -> SmallVec<[u32; 4]> {
        match &self.shape {
            TileShape::DspSuperTile(shape) => smallvec![
                shape.first.origin().weight() as u32,
                shape.second.origin().weight() as u32,
            ],
            TileShape::DspKaratsuba(shape) => shape.term_weights().collect(),
            _ => SmallVec::new(),
        }
    }

    /// Area per LUT of the full-size tile.
    pub fn efficiency(&self) -> f64 {
        let full = self.full();
        let cost = self.lut_cost(
            &full,
            Coord::ORIGIN,
            self.max_width(),
            self.max_height(),
        );

        if cost > 0.0 {
            f64::from(self.area()) / cost
        } else {
            f64::INFINITY
        }
    }

    pub(crate) fn shape_valid(&self, p: &Parametrization, dx: i32, dy: i32) -> bool {
        match &self.shape {
            TileShape::IrregularLut(shape) => shape.contains(dx, dy),
            TileShape::DspSuperTile(shape) => shape.contains(dx, dy),
            TileShape::DspKaratsuba(shape) => shape.contains(dx, dy),
            _ => {
                dx >= 0 && dy >= 0 && (dx as u32) < p.wx() && (dy as u32) < p.wy()
            }
        }
    }

    /// LUT cost of a placed tile, including the compression of its output
    /// bits. The tile is clipped against the `bounds_x × bounds_y` grid first;
    /// overhanging cells are not charged.
    pub fn lut_cost(
        &self,
        p: &Parametrization,
        anchor: Coord,
        bounds_x: u32,
        bounds_y: u32,
    ) -> f64 {
        self.figures(p, anchor, bounds_x, bounds_y).total()
    }

    /// LUT cost of the tile's own logic, excluding the compression of its
    /// output bits. Clipped as for [`TileKind::lut_cost`].
    pub fn own_lut_cost(
        &self,
        p: &Parametrization,
        anchor: Coord,
        bounds_x: u32,
        bounds_y: u32,
    ) -> f64 {
        self.figures(p, anchor, bounds_x, bounds_y).own
    }

    pub(crate) fn figures(
        &self,
        p: &Parametrization,
        anchor: Coord,
        bounds_x: u32,
        bounds_y: u32,
    ) -> CostFigures {
        let grid = Rect::grid(bounds_x, bounds_y);
        let clip = p.bounding_box(anchor).intersect(&grid);

        if clip.is_empty() {
            return CostFigures::default();
        }

        match &self.shape {
            TileShape::Dsp { .. } => CostFigures {
                own: 0.0,
                out_bits: rect_out_width(clip.w, clip.h),
            },
            TileShape::Lut { .. } | TileShape::IrregularLut(_) => {
                self.cost.lut_mapped(clip.cells().filter(|c| {
                    self.shape_valid(p, c.x - anchor.x, c.y - anchor.y)
                }))
            }
            TileShape::Variable2xK { vertical, .. } => {
                let (short, long) = if *vertical {
                    (clip.w, clip.h)
                } else {
                    (clip.h, clip.w)
                };

                if short >= 2 {
                    CostFigures {
                        own: f64::from(long + 1),
                        out_bits: long + 2,
                    }
                } else {
                    CostFigures {
                        own: f64::from(long) * self.cost.lut_consumption(2),
                        out_bits: long,
                    }
                }
            }
            TileShape::DspSuperTile(shape) => {
                let parts = [shape.first, shape.second]
                    .map(|r| r.translate(anchor).intersect(&grid));
                let used = parts.iter().filter(|r| !r.is_empty());

                let lsb = used.clone().map(|r| r.origin().weight()).min();
                let msb = used
                    .clone()
                    .map(|r| {
                        r.origin().weight() + rect_out_width(r.w, r.h) as i32 - 1
                    })
                    .max();
                let carry = u32::from(used.count() == 2);

                match (lsb, msb) {
                    (Some(lsb), Some(msb)) => CostFigures {
                        own: 0.0,
                        out_bits: (msb - lsb + 1) as u32 + carry,
                    },
                    _ => CostFigures::default(),
                }
            }
            TileShape::DspKaratsuba(shape) => {
                let hit = |i: u32, j: u32| {
                    !shape.block(i, j).translate(anchor).intersect(&grid).is_empty()
                };

                let mut figures = CostFigures::default();

                for i in 0..=shape.order {
                    if hit(i, i) {
                        figures.out_bits += shape.term_width();
                    }

                    for j in i + 1..=shape.order {
                        if hit(i, j) || hit(j, i) {
                            figures.own += f64::from(shape.chunk_x + 1);
                            figures.out_bits += 3 * shape.term_width();
                        }
                    }
                }

                figures
            }
        }
    }

    /// Position of the most-significant output bit relative to the anchor.
    pub(crate) fn relative_msb(&self, p: &Parametrization) -> u32 {
        match &self.shape {
            TileShape::IrregularLut(shape) => {
                output_bits(shape.cells().map(Coord::weight)) - 1
            }
            TileShape::DspSuperTile(shape) => {
                let msb = |r: &Rect| {
                    r.origin().weight() as u32 + rect_out_width(r.w, r.h) - 1
                };

                msb(&shape.first).max(msb(&shape.second)) + 1
            }
            TileShape::DspKaratsuba(shape) => {
                2 * shape.order * shape.stride + shape.term_width() + 1
            }
            _ => rect_out_width(p.wx(), p.wy()) - 1,
        }
    }

    /// Position of the least-significant output bit relative to the anchor.
    pub(crate) fn relative_lsb(&self, _p: &Parametrization) -> u32 {
        match &self.shape {
            TileShape::DspSuperTile(shape) => shape.first.origin().weight() as u32,
            _ => 0,
        }
    }
}

/// Width of the product of a `w`-bit and an `h`-bit unsigned number.
///
/// # Examples
///
/// ```
/// # use intmul_tiling::tiles::rect_out_width;
/// #
/// assert_eq!(rect_out_width(24, 17), 41);
/// assert_eq!(rect_out_width(1, 5), 5);
/// assert_eq!(rect_out_width(0, 5), 0);
/// ```
pub fn rect_out_width(w: u32, h: u32) -> u32 {
    match (w, h) {
        (0, _) | (_, 0) => 0,
        (1, _) | (_, 1) => w + h - 1,
        _ => w + h,
    }
}
