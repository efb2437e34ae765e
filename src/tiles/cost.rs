//! LUT cost estimation.

use itertools::Itertools;

use crate::geometry::Coord;
use crate::target::Target;

/// LUTs charged per output bit a tile feeds into the bit heap.
pub const COMPRESSION_COST: f64 = 0.65;

const TABLE_SIZE: usize = 17;

/// The LUT consumption curve of a target, captured so that tile kinds can
/// estimate costs without holding on to the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostModel {
    per_bit: [f64; TABLE_SIZE],
}

impl CostModel {
    pub fn from_target<T: Target + ?Sized>(target: &T) -> CostModel {
        let mut per_bit = [0.0; TABLE_SIZE];

        for (inputs, cost) in per_bit.iter_mut().enumerate() {
            *cost = target.lut_consumption(inputs as u32);
        }

        CostModel { per_bit }
    }

    pub fn lut_consumption(&self, inputs: u32) -> f64 {
        let last = TABLE_SIZE - 1;

        match self.per_bit.get(inputs as usize) {
            Some(&cost) => cost,
            None => {
                let excess = (inputs as usize - last).min(32) as i32;

                self.per_bit[last] * 2f64.powi(excess)
            }
        }
    }

    /// Estimates the figures of a multiplier implemented in plain LUTs whose
    /// partial product bits are the given cells.
    pub fn lut_mapped<I>(&self, cells: I) -> CostFigures
    where
        I: IntoIterator<Item = Coord>,
    {
        let cells = cells.into_iter().collect_vec();

        if cells.is_empty() {
            return CostFigures::default();
        }

        let columns = cells.iter().map(|c| c.x).unique().count() as u32;
        let rows = cells.iter().map(|c| c.y).unique().count() as u32;
        let out_bits = output_bits(cells.iter().map(|c| c.weight()));

        CostFigures {
            own: f64::from(out_bits) * self.lut_consumption(columns + rows),
            out_bits,
        }
    }
}

/// What a tile costs on its own and how many bits it hands to the bit heap.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CostFigures {
    pub own: f64,
    pub out_bits: u32,
}

impl CostFigures {
    pub fn total(&self) -> f64 {
        self.own + f64::from(self.out_bits) * COMPRESSION_COST
    }
}

/// Computes the width of the largest sum of one bit per given weight.
///
/// # Examples
///
/// ```
/// # use intmul_tiling::tiles::cost::output_bits;
/// #
/// // 3x3 unsigned multiplier: 7 * 7 = 49 needs 6 bits.
/// let weights = (0..3).flat_map(|x| (0..3).map(move |y| x + y));
///
/// assert_eq!(output_bits(weights), 6);
/// assert_eq!(output_bits([4]), 1);
/// ```
pub fn output_bits<I>(weights: I) -> u32
where
    I: IntoIterator<Item = i32>,
{
    let weights = weights.into_iter().collect_vec();

    let Some(&lsb) = weights.iter().min() else {
        return 0;
    };

    let span = weights.iter().max().map_or(0, |&msb| msb - lsb) as u32;

    if span >= 120 {
        // Too wide to sum exactly; every column holds at least one bit.
        return span + 1 + (weights.len() as f64).log2().ceil() as u32;
    }

    let sum: u128 = weights.iter().map(|&w| 1u128 << (w - lsb)).sum();

    u128::BITS - sum.leading_zeros()
}
