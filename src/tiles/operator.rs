//! Hardware instances for placed tiles.
//!
//! An [`Operator`] is the structural description handed to the bit-heap
//! builder. It depends on nothing but the [`Parametrization`], so tiles with
//! equal parametrizations share one instance through [`OperatorManager`].

use std::collections::HashSet;

use super::kind::{TileShape, rect_out_width};
use super::parametrization::Parametrization;
use crate::geometry::Coord;

/// Encodes the parameters of an operator into its identifier. The result is
/// a valid name in the IA-64 C++ ABI's name mangling scheme.
macro_rules! mangle {
    ($name:expr, $($arg:expr),+ $(,)?) => {{
        use $crate::tiles::operator::Mangle as _;

        let name = $name;
        let mut res = format!("_Z{}{}I", name.len(), name);

        $(
            res.push('X');
            $arg.mangle(&mut res);
            res.push('E');
        )+

        res.push('E');
        res
    }};
}

/// A trait for formatting data as a mangled expression.
pub trait Mangle {
    /// Formats `self` as an [`<expression>`].
    ///
    /// [`<expression>`]:
    ///     https://itanium-cxx-abi.github.io/cxx-abi/abi.html#mangle.expression
    fn mangle(&self, out: &mut String);
}

impl Mangle for bool {
    fn mangle(&self, out: &mut String) {
        out.push_str(if *self { "Lb1E" } else { "Lb0E" });
    }
}

impl Mangle for u32 {
    fn mangle(&self, out: &mut String) {
        out.push_str("Lj");
        out.push_str(&self.to_string());
        out.push('E');
    }
}

/// One partial result of an operator entering the bit heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Term {
    /// Weight relative to the tile anchor.
    pub weight: u32,
    pub width: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Operator {
    pub name: String,
    pub kind: String,
    /// Operand widths in multiplier order.
    pub input_widths: (u32, u32),
    pub signed: (bool, bool),
    pub output_width: u32,
    pub dsp_blocks: u32,
    pub luts: f64,
    pub terms: Vec<Term>,
}

impl Parametrization {
    /// Describes the hardware instance implementing this tile.
    pub fn generate_operator(&self) -> Operator {
        let kind = self.kind();
        let (wa, wb) = self.multiplier_widths();
        let (sa, sb) = if self.is_flipped() {
            (self.is_signed_y(), self.is_signed_x())
        } else {
            (self.is_signed_x(), self.is_signed_y())
        };

        let terms = match kind.shape() {
            TileShape::DspSuperTile(shape) => self
                .output_weights()
                .iter()
                .zip([shape.first, shape.second])
                .map(|(&weight, r)| Term {
                    weight,
                    width: rect_out_width(r.w, r.h),
                })
                .collect(),
            TileShape::DspKaratsuba(shape) => self
                .output_weights()
                .iter()
                .map(|&weight| Term {
                    weight,
                    width: shape.term_width(),
                })
                .collect(),
            _ => vec![Term {
                weight: self.relative_lsb(),
                width: self.out_word_size(),
            }],
        };

        Operator {
            name: mangle!(kind.name(), wa, wb, sa, sb, self.shape_param()),
            kind: kind.name(),
            input_widths: (wa, wb),
            signed: (sa, sb),
            output_width: self.out_word_size(),
            dsp_blocks: kind.dsp_cost(),
            luts: self.own_lut_cost(Coord::ORIGIN, self.wx(), self.wy()),
            terms,
        }
    }
}

/// Collects the distinct operators of a design.
pub struct OperatorManager {
    operators: Vec<Operator>,
    generated: HashSet<String>,
}

impl OperatorManager {
    pub fn new() -> OperatorManager {
        OperatorManager {
            operators: Vec::new(),
            generated: HashSet::new(),
        }
    }

    /// Returns the name of the operator for `p`, generating it on first use.
    pub fn get(&mut self, p: &Parametrization) -> String {
        let operator = p.generate_operator();
        let name = operator.name.clone();

        if self.generated.insert(name.clone()) {
            self.operators.push(operator);
        }

        name
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn into_operators(self) -> Vec<Operator> {
        self.operators
    }
}

impl Default for OperatorManager {
    fn default() -> Self {
        OperatorManager::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileKind;
    use crate::target::Device;

    #[test]
    fn operators_depend_only_on_parametrization() {
        let device = Device::default();
        let lut = TileKind::lut(&device, 3, 3).full();
        let dsp = TileKind::dsp(&device, true).full();

        assert_eq!(lut.generate_operator(), lut.clone().generate_operator());
        assert_eq!(lut.generate_operator().name, "_Z6LUT3x3IXLj3EEXLj3EEXLb0EEXLb0EEXLj0EEE");

        let op = dsp.generate_operator();
        assert_eq!(op.input_widths, (24, 17));
        assert_eq!(op.dsp_blocks, 1);
        assert_eq!(op.terms, [Term { weight: 0, width: 41 }]);

        let mut manager = OperatorManager::new();
        manager.get(&lut);
        manager.get(&dsp);
        manager.get(&lut.clone());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn multi_term_operators() {
        use crate::tiles::CostModel;
        use crate::tiles::shapes::{KaratsubaShape, SuperTileShape};

        let device = Device::default();
        let cost = CostModel::from_target(&device);

        let shape = SuperTileShape::enumerate(device.dsp_widths, 17)[0];
        let pair = TileKind::new(TileShape::DspSuperTile(shape), cost).full();
        let op = pair.generate_operator();

        assert_eq!(pair.output_weights(), [0, 17]);
        assert_eq!(op.dsp_blocks, 2);
        assert_eq!(op.terms, [Term { weight: 0, width: 41 }, Term { weight: 17, width: 41 }]);

        let karatsuba = TileKind::new(
            TileShape::DspKaratsuba(KaratsubaShape::new(1, device.dsp_widths)),
            cost,
        )
        .full();
        let op = karatsuba.generate_operator();

        assert_eq!(op.dsp_blocks, 3);
        assert_eq!(
            op.terms.iter().map(|t| t.weight).collect::<Vec<_>>(),
            karatsuba.output_weights()
        );
        assert!(op.terms.iter().all(|t| t.width == 41));

        assert!(TileKind::lut(&device, 3, 3).full().output_weights().is_empty());
    }
}
