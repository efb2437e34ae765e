//! Tiling strategies.
//!
//! A strategy covers the `wx × wy` partial product grid of a multiplier with
//! tiles from a [`TileCollection`] and returns the placements as a
//! [`Solution`].

mod basic;
mod beam;
mod compression;
mod error;
mod greedy;
mod optimal;
mod supertile;
#[cfg(test)]
pub(crate) mod testing;
mod xgreedy;

use std::fmt;
use std::slice;

use itertools::Itertools;
use log::info;

pub use basic::BasicTiling;
pub use beam::BeamSearch;
pub use compression::{CompressionPlan, Compressor, TilingAndCompression};
pub use error::TilingError;
pub use greedy::GreedyTiling;
pub use optimal::OptimalTiling;
pub use xgreedy::XGreedyTiling;

use crate::config::{TilingMethod, TilingOptions};
use crate::field::{CursorPolicy, TruncationRange};
use crate::geometry::{Coord, Rect};
use crate::target::Target;
use crate::tiles::{Parametrization, TileCollection};

/// The multiplier being tiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TilingParams {
    pub wx: u32,
    pub wy: u32,
    /// Output width; `wx + wy` for a full product.
    pub w_out: u32,
    pub signed_io: bool,
}

impl TilingParams {
    pub fn new(wx: u32, wy: u32) -> TilingParams {
        TilingParams {
            wx,
            wy,
            w_out: wx + wy,
            signed_io: false,
        }
    }

    pub fn with_w_out(self, w_out: u32) -> TilingParams {
        TilingParams { w_out, ..self }
    }

    pub fn signed(self, signed_io: bool) -> TilingParams {
        TilingParams { signed_io, ..self }
    }

    pub fn grid(&self) -> Rect {
        Rect::grid(self.wx, self.wy)
    }

    pub fn is_truncated(&self) -> bool {
        self.w_out < self.wx + self.wy
    }

    pub fn truncation(&self) -> TruncationRange {
        TruncationRange::new(self.wx, self.wy, self.w_out)
    }

    /// Total weight of the partial product bits a solution may leave out.
    pub fn error_budget(&self) -> f64 {
        TruncationRange::error_budget(self.wx, self.wy, self.w_out)
    }
}

/// A tile at its anchor. The anchor may lie off the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedTile {
    pub param: Parametrization,
    pub anchor: Coord,
}

impl PlacedTile {
    pub fn new(param: Parametrization, anchor: Coord) -> PlacedTile {
        PlacedTile { param, anchor }
    }

    pub fn bounding_box(&self) -> Rect {
        self.param.bounding_box(self.anchor)
    }

    /// Grid cells the tile contributes to.
    pub fn cells<'a>(
        &'a self,
        params: &'a TilingParams,
    ) -> impl Iterator<Item = Coord> + 'a {
        let grid = params.grid();

        self.param
            .cells(self.anchor)
            .filter(move |&c| grid.contains(c))
    }

    pub fn dsp_cost(&self) -> u32 {
        self.param.kind().dsp_cost()
    }

    pub fn lut_cost(&self, params: &TilingParams) -> f64 {
        self.param.lut_cost(self.anchor, params.wx, params.wy)
    }

    pub fn own_lut_cost(&self, params: &TilingParams) -> f64 {
        self.param.own_lut_cost(self.anchor, params.wx, params.wy)
    }
}

impl fmt::Display for PlacedTile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}x{} at {}",
            self.param.kind().name(),
            self.param.wx(),
            self.param.wy(),
            self.anchor
        )
    }
}

/// An ordered list of placed tiles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Solution {
    tiles: Vec<PlacedTile>,
}

impl Solution {
    pub fn new() -> Solution {
        Solution::default()
    }

    pub fn push(&mut self, tile: PlacedTile) {
        self.tiles.push(tile);
    }

    pub fn tiles(&self) -> &[PlacedTile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, PlacedTile> {
        self.tiles.iter()
    }

    pub fn dsp_count(&self) -> u32 {
        self.tiles.iter().map(PlacedTile::dsp_cost).sum()
    }

    pub fn lut_cost(&self, params: &TilingParams) -> f64 {
        self.tiles.iter().map(|t| t.lut_cost(params)).sum()
    }

    /// Number of grid cells covered, counting overlaps once per tile.
    pub fn covered_area(&self, params: &TilingParams) -> u64 {
        self.tiles.iter().map(|t| t.cells(params).count() as u64).sum()
    }

    /// Checks that no grid cell is covered twice, that the cells left out
    /// stay within the error budget, and that the DSP budget holds.
    pub fn verify(
        &self,
        params: &TilingParams,
        max_dsp: u32,
    ) -> Result<(), TilingError> {
        let mut count = vec![0u32; (params.wx * params.wy) as usize];

        for tile in &self.tiles {
            for c in tile.cells(params) {
                let idx = c.y as usize * params.wx as usize + c.x as usize;

                count[idx] += 1;

                if count[idx] > 1 {
                    return Err(TilingError::InvalidSolution(format!(
                        "cell {c} covered twice, last by {tile}"
                    )));
                }
            }
        }

        let dropped: f64 = params
            .grid()
            .cells()
            .filter(|c| count[c.y as usize * params.wx as usize + c.x as usize] == 0)
            .map(|c| 2f64.powi(c.weight()))
            .sum();

        if dropped > params.error_budget() {
            return Err(TilingError::InvalidSolution(format!(
                "uncovered weight {dropped} exceeds the error budget {}",
                params.error_budget()
            )));
        }

        if self.dsp_count() > max_dsp {
            return Err(TilingError::InvalidSolution(format!(
                "{} DSP blocks used, {max_dsp} allowed",
                self.dsp_count()
            )));
        }

        Ok(())
    }
}

impl FromIterator<PlacedTile> for Solution {
    fn from_iter<I: IntoIterator<Item = PlacedTile>>(iter: I) -> Self {
        Solution {
            tiles: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Solution {
    type Item = PlacedTile;
    type IntoIter = std::vec::IntoIter<PlacedTile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.into_iter()
    }
}

impl<'a> IntoIterator for &'a Solution {
    type Item = &'a PlacedTile;
    type IntoIter = slice::Iter<'a, PlacedTile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

pub trait TilingStrategy {
    fn solve(&mut self) -> Result<Solution, TilingError>;
}

/// Checks that the catalog can tile anything at all under `opts`.
pub(crate) fn check_catalog(
    collection: &TileCollection,
    opts: &TilingOptions,
) -> Result<(), TilingError> {
    if collection.is_empty() {
        return Err(TilingError::EmptyCatalog);
    }

    if opts.max_dsp == 0 && collection.base().iter().all(|k| k.dsp_cost() > 0) {
        return Err(TilingError::DspBudget);
    }

    Ok(())
}

/// The cursor order suited to a catalog: irregular shapes pack better when
/// filled outwards from the origin.
pub(crate) fn cursor_policy(opts: &TilingOptions) -> CursorPolicy {
    if opts.use_irregular || opts.use_karatsuba {
        CursorPolicy::NearestPoint
    } else {
        CursorPolicy::Line
    }
}

/// Runs the strategy selected by `opts.method` on `collection`.
pub fn solve_with(
    params: &TilingParams,
    collection: &TileCollection,
    opts: &TilingOptions,
) -> Result<Solution, TilingError> {
    let solution = match opts.method {
        TilingMethod::Basic => BasicTiling::new(params, collection, opts).solve(),
        TilingMethod::Greedy => GreedyTiling::new(params, collection, opts).solve(),
        TilingMethod::XGreedy => {
            XGreedyTiling::new(params, collection, opts).solve()
        }
        TilingMethod::BeamSearch => {
            BeamSearch::new(params, collection, opts).solve()
        }
        TilingMethod::Optimal => {
            OptimalTiling::new(params, collection, opts).solve()
        }
        TilingMethod::OptimalTilingAndCompression => {
            TilingAndCompression::new(params, collection, opts).solve()
        }
    }?;

    info!(
        "{} tiling of {}x{}: {} tiles, {} DSPs, {:.2} LUTs",
        opts.method,
        params.wx,
        params.wy,
        solution.len(),
        solution.dsp_count(),
        solution.lut_cost(params)
    );

    Ok(solution)
}

/// Builds the tile catalog of `target` and runs the selected strategy.
pub fn solve<T: Target + ?Sized>(
    target: &T,
    params: &TilingParams,
    opts: &TilingOptions,
) -> Result<Solution, TilingError> {
    let collection = TileCollection::new(target, params.wx, params.wy, opts);

    solve_with(params, &collection, opts)
}

/// Renders a solution as a table, one placed tile per row.
pub fn format_solution(solution: &Solution, params: &TilingParams) -> String {
    solution
        .iter()
        .map(|t| {
            format!(
                "{:<16} {:>10} {:>3}x{:<3} {}{} lsb {:>3} cost {:.2}",
                t.param.kind().name(),
                t.anchor.to_string(),
                t.param.wx(),
                t.param.wy(),
                if t.param.is_signed_x() { 's' } else { 'u' },
                if t.param.is_signed_y() { 's' } else { 'u' },
                t.anchor.weight() + t.param.relative_lsb() as i32,
                t.lut_cost(params)
            )
        })
        .join("\n")
}
