//! The bit heap fed by a tiling.
//!
//! Each placed tile hands its partial result to the bit heap at the weight of
//! its anchor. [`BitHeapShape`] records the significance range of every tile
//! and how many bits end up in each column, which is what compression has to
//! reduce.

use smallvec::{SmallVec, smallvec};

use crate::tiles::TileShape;
use crate::tiling::{PlacedTile, Solution, TilingParams};

/// `count` consecutive columns starting at `lsb`, one bit each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnRange {
    pub lsb: u32,
    pub count: u32,
}

impl ColumnRange {
    pub fn msb(&self) -> u32 {
        self.lsb + self.count - 1
    }

    pub fn columns(&self) -> std::ops::Range<u32> {
        self.lsb..self.lsb + self.count
    }
}

/// Columns a placed tile adds one bit to, one range per partial result.
/// Bits that would fall below weight zero are dropped.
pub(crate) fn tile_columns(
    tile: &PlacedTile,
    params: &TilingParams,
) -> SmallVec<[ColumnRange; 4]> {
    let p = &tile.param;

    match p.kind().shape() {
        TileShape::DspSuperTile(_) | TileShape::DspKaratsuba(_) => p
            .generate_operator()
            .terms
            .iter()
            .filter_map(|term| {
                let lsb = tile.anchor.weight() + term.weight as i32;
                let end = lsb + term.width as i32;

                (end > 0).then(|| ColumnRange {
                    lsb: lsb.max(0) as u32,
                    count: (end - lsb.max(0)) as u32,
                })
            })
            .collect(),
        _ => {
            let Some(lsb) = tile.cells(params).map(|c| c.weight()).min() else {
                return SmallVec::new();
            };

            let count = p
                .kind()
                .figures(p, tile.anchor, params.wx, params.wy)
                .out_bits;

            if count == 0 {
                SmallVec::new()
            } else {
                smallvec![ColumnRange {
                    lsb: lsb as u32,
                    count,
                }]
            }
        }
    }
}

/// Output range of one placed tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileBits {
    pub lsb: u32,
    pub msb: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitHeapShape {
    tiles: Vec<Option<TileBits>>,
    heights: Vec<u32>,
}

impl BitHeapShape {
    pub fn from_solution(solution: &Solution, params: &TilingParams) -> BitHeapShape {
        let mut shape = BitHeapShape::default();

        for tile in solution {
            let ranges = tile_columns(tile, params);

            let bits = ranges
                .iter()
                .map(|r| r.lsb)
                .min()
                .zip(ranges.iter().map(ColumnRange::msb).max())
                .map(|(lsb, msb)| TileBits { lsb, msb });

            for range in &ranges {
                shape.add(range);
            }

            shape.tiles.push(bits);
        }

        shape
    }

    fn add(&mut self, range: &ColumnRange) {
        let end = (range.lsb + range.count) as usize;

        if self.heights.len() < end {
            self.heights.resize(end, 0);
        }

        for c in range.columns() {
            self.heights[c as usize] += 1;
        }
    }

    /// Output range of the `i`-th tile of the solution, `None` if the tile
    /// feeds no bit into the heap.
    pub fn tile(&self, i: usize) -> Option<TileBits> {
        self.tiles.get(i).copied().flatten()
    }

    pub fn heights(&self) -> &[u32] {
        &self.heights
    }

    pub fn height(&self, column: u32) -> u32 {
        self.heights.get(column as usize).copied().unwrap_or(0)
    }

    pub fn width(&self) -> u32 {
        self.heights.len() as u32
    }

    pub fn max_height(&self) -> u32 {
        self.heights.iter().copied().max().unwrap_or(0)
    }

    pub fn total_bits(&self) -> u32 {
        self.heights.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coord;
    use crate::target::Device;
    use crate::tiles::TileKind;

    #[test]
    fn lut_tiles_stack_by_weight() {
        let params = TilingParams::new(6, 3);
        let lut = TileKind::lut(&Device::default(), 3, 3);

        let solution: Solution = [Coord::new(0, 0), Coord::new(3, 0)]
            .into_iter()
            .map(|anchor| PlacedTile::new(lut.full(), anchor))
            .collect();

        let heap = BitHeapShape::from_solution(&solution, &params);

        // A 3x3 product has 6 bits: columns 0..6 and 3..9.
        assert_eq!(heap.tile(0), Some(TileBits { lsb: 0, msb: 5 }));
        assert_eq!(heap.tile(1), Some(TileBits { lsb: 3, msb: 8 }));
        assert_eq!(heap.heights(), &[1, 1, 1, 2, 2, 2, 1, 1, 1]);
        assert_eq!(heap.max_height(), 2);
    }

    #[test]
    fn clipped_dsp_starts_at_first_cell() {
        let params = TilingParams::new(10, 10);
        let dsp = TileKind::dsp(&Device::default(), false);
        let tile = PlacedTile::new(dsp.full(), Coord::new(-20, -10));

        let ranges = tile_columns(&tile, &params);

        // Only the 4x7 corner lies on the grid.
        assert_eq!(ranges.as_slice(), &[ColumnRange { lsb: 0, count: 11 }]);
    }

    #[test]
    fn empty_solution_has_flat_heap() {
        let heap = BitHeapShape::from_solution(&Solution::new(), &TilingParams::new(4, 4));

        assert_eq!(heap.width(), 0);
        assert_eq!(heap.total_bits(), 0);
        assert_eq!(heap.tile(0), None);
    }
}
