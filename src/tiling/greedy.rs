//! Greedy tiling.
//!
//! At the cursor of the field, every tile of the catalog is evaluated in
//! priority order and the best placement is committed. The loop ends when no
//! required cell is left. The same placement step drives beam search and
//! X-greedy, which explore branches off a shared field.

use std::slice;

use log::{debug, trace};

use super::{PlacedTile, Solution, TilingError, TilingParams, TilingStrategy};
use super::{check_catalog, cursor_policy, supertile};
use crate::config::TilingOptions;
use crate::field::{CursorPolicy, Field, FieldState};
use crate::geometry::Coord;
use crate::tiles::{Parametrization, TileCollection, TileKind, TileShape};

/// Minimum free run along the long side before a 2×k tile is considered.
const VARIABLE_MIN_RUN: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tier {
    /// Tiles using DSP blocks, scored by covered cells per block.
    Dsp,
    /// LUT tiles, scored by efficiency weighted by utilization.
    Lut,
}

struct Candidate {
    idx: usize,
    param: Parametrization,
    anchor: Coord,
    tier: Tier,
    score: f64,
}

/// A partial greedy run.
#[derive(Clone, Debug)]
pub(crate) struct GreedyProgress {
    pub state: FieldState,
    pub placed: Vec<PlacedTile>,
    /// DSP placements held back for the supertile pass.
    pub deferred: Vec<PlacedTile>,
    /// Cost of the placed tiles; deferred DSPs are not included yet.
    pub cost: f64,
    pub used_dsp: u32,
    /// Catalog index of every tile placed, in order.
    pub path: Vec<usize>,
}

impl GreedyProgress {
    pub fn new(state: FieldState) -> GreedyProgress {
        GreedyProgress {
            state,
            placed: Vec::new(),
            deferred: Vec::new(),
            cost: 0.0,
            used_dsp: 0,
            path: Vec::new(),
        }
    }

    /// A copy whose further placements are invisible to `self`.
    pub fn branch(&self, field: &mut Field) -> GreedyProgress {
        GreedyProgress {
            state: field.derive(&self.state),
            ..self.clone()
        }
    }
}

pub(crate) struct GreedyResult {
    pub solution: Solution,
    pub cost: f64,
    pub path: Vec<usize>,
}

pub struct GreedyTiling<'a> {
    params: &'a TilingParams,
    collection: &'a TileCollection,
    opts: &'a TilingOptions,
    order: Vec<usize>,
    policy: CursorPolicy,
}

impl<'a> GreedyTiling<'a> {
    pub fn new(
        params: &'a TilingParams,
        collection: &'a TileCollection,
        opts: &'a TilingOptions,
    ) -> GreedyTiling<'a> {
        GreedyTiling {
            params,
            collection,
            opts,
            order: (0..collection.len()).collect(),
            policy: cursor_policy(opts),
        }
    }

    pub fn with_policy(self, policy: CursorPolicy) -> GreedyTiling<'a> {
        GreedyTiling { policy, ..self }
    }

    /// Overrides the order in which catalog entries are tried.
    pub(crate) fn set_order(&mut self, order: Vec<usize>) {
        self.order = order;
    }

    pub(crate) fn collection(&self) -> &'a TileCollection {
        self.collection
    }

    pub(crate) fn opts(&self) -> &'a TilingOptions {
        self.opts
    }

    /// A fresh field with the truncated cells already excluded.
    pub(crate) fn field(&self) -> (Field, FieldState) {
        let mut field = Field::new(self.params.wx, self.params.wy, self.policy);
        let mut state = field.reset();

        if self.params.is_truncated() {
            field.set_truncated(&self.params.truncation(), &mut state);
        }

        (field, state)
    }

    fn kind(&self, idx: usize) -> Option<&'a TileKind> {
        self.collection.get(idx)
    }

    /// Sizes a 2×k tile to the free run at the cursor.
    fn size_variable(
        &self,
        field: &Field,
        state: &FieldState,
        kind: &TileKind,
    ) -> Option<Parametrization> {
        let TileShape::Variable2xK { max_k, vertical } = *kind.shape() else {
            return None;
        };

        let (nx, ny) = (field.needed_x(state), field.needed_y(state));

        if !vertical && nx >= VARIABLE_MIN_RUN && ny >= 2 {
            kind.parametrize(nx.min(max_k), 2, false, false)
        } else if vertical && ny >= VARIABLE_MIN_RUN && nx >= 2 {
            kind.parametrize(2, ny.min(max_k), false, false)
        } else {
            None
        }
    }

    /// Nests an irregular tile against its neighbours by moving it down,
    /// then left, as long as it covers no fewer cells and still covers the
    /// cursor.
    fn settle(
        &self,
        field: &Field,
        state: &FieldState,
        p: &Parametrization,
        mut covered: u32,
    ) -> (Coord, u32) {
        let cursor = state.cursor();
        let mut anchor = cursor;

        for (dx, dy) in [(0, -1), (-1, 0)] {
            let shifted = anchor.offset(dx, dy);

            if !p.shape_valid(cursor.x - shifted.x, cursor.y - shifted.y) {
                continue;
            }

            let count = field.check_tile_placement(shifted, p, state);

            if count > 0 && count >= covered {
                anchor = shifted;
                covered = count;
            }
        }

        (anchor, covered)
    }

    fn evaluate(
        &self,
        field: &Field,
        progress: &GreedyProgress,
        forced: Option<usize>,
    ) -> Option<Candidate> {
        let state = &progress.state;
        let cursor = state.cursor();
        let dsp_left = self.opts.max_dsp.saturating_sub(progress.used_dsp);
        let threshold = self.opts.occupation_threshold;

        let order = match &forced {
            Some(idx) => slice::from_ref(idx),
            None => &self.order[..],
        };

        let mut best: Option<Candidate> = None;
        let mut dsp_done = false;

        for &idx in order {
            let Some(kind) = self.kind(idx) else {
                continue;
            };

            if kind.dsp_cost() > dsp_left || kind.is_super_tile() {
                continue;
            }

            let occupied = |covered: u32| {
                covered > 0 && f64::from(covered) >= threshold * f64::from(kind.area())
            };

            if kind.is_dsp() {
                if dsp_done {
                    continue;
                }

                let Some(param) = field.check_dsp_placement(
                    cursor,
                    &kind.full(),
                    state,
                    self.params.signed_io,
                ) else {
                    continue;
                };

                let covered = field.check_tile_placement(cursor, &param, state);

                if !occupied(covered) {
                    continue;
                }

                let score = f64::from(covered);

                match &best {
                    Some(b) if b.tier == Tier::Dsp && score <= b.score => {
                        dsp_done = true;
                    }
                    _ => {
                        best = Some(Candidate {
                            idx,
                            param,
                            anchor: cursor,
                            tier: Tier::Dsp,
                            score,
                        });
                    }
                }
            } else if kind.is_karatsuba() {
                let param = kind.full();
                let covered = field.check_tile_placement(cursor, &param, state);

                if !occupied(covered) {
                    continue;
                }

                let score = f64::from(covered) / f64::from(kind.dsp_cost());

                if best
                    .as_ref()
                    .is_some_and(|b| b.tier == Tier::Dsp && b.score >= score)
                {
                    continue;
                }

                best = Some(Candidate {
                    idx,
                    param,
                    anchor: cursor,
                    tier: Tier::Dsp,
                    score,
                });
            } else {
                if best.as_ref().is_some_and(|b| b.tier == Tier::Dsp) {
                    continue;
                }

                let best_score = best.as_ref().map_or(0.0, |b| b.score);

                let (param, efficiency, area) = if kind.is_variable() {
                    let Some(param) = self.size_variable(field, state, kind) else {
                        continue;
                    };

                    let area = param.wx() * param.wy();
                    let cost = param.lut_cost(cursor, self.params.wx, self.params.wy);

                    (param, f64::from(area) / cost, area)
                } else {
                    (kind.full(), kind.efficiency(), kind.area())
                };

                if efficiency <= best_score {
                    continue;
                }

                let covered = field.check_tile_placement(cursor, &param, state);

                if covered == 0 {
                    continue;
                }

                let (anchor, covered) = if kind.is_irregular() {
                    self.settle(field, state, &param, covered)
                } else {
                    (cursor, covered)
                };

                let score = efficiency * f64::from(covered) / f64::from(area);

                if score > best_score {
                    best = Some(Candidate {
                        idx,
                        param,
                        anchor,
                        tier: Tier::Lut,
                        score,
                    });
                }
            }
        }

        best
    }

    /// Places the best tile at the cursor, or the tile at catalog index
    /// `forced`. Returns `false` if the forced tile does not fit.
    pub(crate) fn step(
        &self,
        field: &mut Field,
        progress: &mut GreedyProgress,
        forced: Option<usize>,
    ) -> Result<bool, TilingError> {
        let Some(candidate) = self.evaluate(field, progress, forced) else {
            return match forced {
                Some(_) => Ok(false),
                None => Err(TilingError::no_tile_fits(progress.state.cursor())),
            };
        };

        let param = candidate.param.with_edge_signs(
            candidate.anchor,
            self.params.wx,
            self.params.wy,
            self.params.signed_io,
        );
        let kind = *param.kind();

        trace!(
            "placing {} ({}x{}) at {}",
            kind.name(),
            param.wx(),
            param.wy(),
            candidate.anchor
        );

        field.place_tile_in_field(candidate.anchor, &param, &mut progress.state);

        progress.used_dsp += kind.dsp_cost();
        progress.path.push(candidate.idx);

        let tile = PlacedTile::new(param, candidate.anchor);

        if self.opts.use_supertiles && kind.is_dsp() {
            progress.deferred.push(tile);
        } else {
            progress.cost += tile.lut_cost(self.params);
            progress.placed.push(tile);
        }

        Ok(true)
    }

    /// Places tiles until the field is covered. Returns `false` as soon as
    /// the running cost exceeds `bound`.
    pub(crate) fn complete(
        &self,
        field: &mut Field,
        progress: &mut GreedyProgress,
        bound: Option<f64>,
    ) -> Result<bool, TilingError> {
        while !progress.state.is_complete() {
            self.step(field, progress, None)?;

            if bound.is_some_and(|bound| progress.cost > bound) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Runs the supertile pass over the deferred DSPs and totals the cost.
    pub(crate) fn finish(&self, mut progress: GreedyProgress) -> GreedyResult {
        let merged =
            supertile::merge(self.collection, &progress.deferred, self.params);

        for tile in merged {
            progress.cost += tile.lut_cost(self.params);
            progress.placed.push(tile);
        }

        GreedyResult {
            solution: progress.placed.into_iter().collect(),
            cost: progress.cost,
            path: progress.path,
        }
    }

    /// A complete greedy run on a fresh field, abandoned once its cost
    /// exceeds `bound`.
    pub(crate) fn run(
        &self,
        bound: Option<f64>,
    ) -> Result<Option<GreedyResult>, TilingError> {
        let (mut field, state) = self.field();
        let mut progress = GreedyProgress::new(state);

        if !self.complete(&mut field, &mut progress, bound)? {
            return Ok(None);
        }

        Ok(Some(self.finish(progress)))
    }

    /// Re-executes a recorded path on a fresh field.
    pub(crate) fn replay(&self, path: &[usize]) -> Result<GreedyResult, TilingError> {
        let (mut field, state) = self.field();
        let mut progress = GreedyProgress::new(state);

        for (step, &idx) in path.iter().enumerate() {
            if !self.step(&mut field, &mut progress, Some(idx))? {
                return Err(TilingError::InvalidSolution(format!(
                    "tile {idx} does not fit at step {step} of the replay"
                )));
            }
        }

        if !progress.state.is_complete() {
            return Err(TilingError::InvalidSolution(format!(
                "replayed path leaves {} cells uncovered",
                progress.state.missing()
            )));
        }

        Ok(self.finish(progress))
    }
}

impl TilingStrategy for GreedyTiling<'_> {
    fn solve(&mut self) -> Result<Solution, TilingError> {
        check_catalog(self.collection, self.opts)?;

        let result = self.run(None)?.ok_or(TilingError::Infeasible)?;

        debug!(
            "greedy: {} tiles, cost {:.2}",
            result.solution.len(),
            result.cost
        );

        Ok(result.solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::testing;

    #[test]
    fn fills_small_grid_with_luts() {
        let params = TilingParams::new(8, 8);
        let collection = testing::lut_catalog();
        let opts = TilingOptions {
            occupation_threshold: 1.0,
            ..Default::default()
        };

        let solution = GreedyTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, opts.max_dsp).unwrap();
        assert_eq!(solution.covered_area(&params), 64);
        assert_eq!(solution.dsp_count(), 0);

        let big = solution
            .iter()
            .filter(|t| t.param.kind().area() == 9)
            .count();
        assert!(big >= 4, "only {big} 3x3 tiles");
    }

    #[test]
    fn exact_dsp_fit() {
        let params = TilingParams::new(17, 24);
        let collection = testing::exact_dsp_catalog();
        let opts = TilingOptions {
            occupation_threshold: 1.0,
            max_dsp: 1,
            ..Default::default()
        };

        let solution = GreedyTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        assert_eq!(solution.len(), 1);
        assert_eq!(solution.tiles()[0].anchor, Coord::new(0, 0));
        assert_eq!(solution.dsp_count(), 1);
        assert_eq!(solution.covered_area(&params), 17 * 24);
    }

    #[test]
    fn respects_dsp_budget() {
        let params = TilingParams::new(60, 40);
        let collection = testing::device_catalog(&params, &TilingOptions::default());

        for max_dsp in [0, 1, 3] {
            let opts = TilingOptions {
                max_dsp,
                ..Default::default()
            };

            let solution = GreedyTiling::new(&params, &collection, &opts)
                .solve()
                .unwrap();

            solution.verify(&params, max_dsp).unwrap();
            assert_eq!(solution.dsp_count(), max_dsp);
        }
    }

    #[test]
    fn deterministic() {
        let params = TilingParams::new(30, 20).signed(true);
        let opts = TilingOptions {
            use_irregular: true,
            use_2xk: true,
            ..Default::default()
        };
        let collection = testing::device_catalog(&params, &opts);

        let run = || {
            GreedyTiling::new(&params, &collection, &opts)
                .run(None)
                .unwrap()
                .unwrap()
        };

        let (a, b) = (run(), run());

        assert_eq!(a.solution, b.solution);
        assert_eq!(a.cost, b.cost);
        a.solution.verify(&params, opts.max_dsp).unwrap();
    }

    #[test]
    fn truncation_shrinks_covered_area() {
        let full = TilingParams::new(8, 8);
        let truncated = full.with_w_out(8);
        let collection = testing::lut_catalog();
        let opts = TilingOptions::default();

        let solve = |params: &TilingParams| {
            GreedyTiling::new(params, &collection, &opts).solve().unwrap()
        };

        let a = solve(&full);
        let b = solve(&truncated);

        b.verify(&truncated, opts.max_dsp).unwrap();
        assert!(b.covered_area(&truncated) < a.covered_area(&full));
        assert!(b.covered_area(&truncated) >= 64 - 18);
    }

    #[test]
    fn supertiles_merge_stacked_dsps() {
        let params = TilingParams::new(24, 34);
        let opts = TilingOptions {
            use_supertiles: true,
            occupation_threshold: 1.0,
            ..Default::default()
        };
        let collection = testing::device_catalog(&params, &opts);

        let solution = GreedyTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, opts.max_dsp).unwrap();
        assert_eq!(solution.len(), 1);
        assert!(solution.tiles()[0].param.kind().is_super_tile());
        assert_eq!(solution.dsp_count(), 2);
    }

    #[test]
    fn variable_tiles_fill_long_runs() {
        let params = TilingParams::new(12, 2);
        let opts = TilingOptions {
            use_2xk: true,
            ..TilingOptions::lut_only()
        };
        let collection = testing::device_catalog(&params, &opts);

        let solution = GreedyTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, 0).unwrap();
        assert!(solution.iter().any(|t| t.param.kind().is_variable()));
    }

    #[test]
    fn sign_edge_tiles_are_signed() {
        let params = TilingParams::new(8, 8).signed(true);
        let collection = testing::lut_catalog();
        let opts = TilingOptions::lut_only();

        let solution = GreedyTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, 0).unwrap();

        for tile in &solution {
            let bounds = tile.param.bounding_box(tile.anchor);
            let op = tile.param.generate_operator();

            assert_eq!(tile.param.is_signed_x(), bounds.end_x() >= 8, "{tile:?}");
            assert_eq!(tile.param.is_signed_y(), bounds.end_y() >= 8, "{tile:?}");
            assert_eq!(op.signed, (bounds.end_x() >= 8, bounds.end_y() >= 8));
        }

        assert!(solution.iter().any(|t| t.param.is_signed_y()));
    }

    #[test]
    fn karatsuba_tile_is_placed() {
        let device = crate::target::Device::default();
        let shape = crate::tiles::shapes::KaratsubaShape::new(1, device.dsp_widths);
        let collection = TileCollection::from_kinds(vec![
            TileKind::new(
                TileShape::DspKaratsuba(shape),
                crate::tiles::CostModel::from_target(&device),
            ),
            TileKind::lut(&device, 1, 1),
        ]);
        let params = TilingParams::new(64, 72);
        let opts = TilingOptions {
            use_karatsuba: true,
            max_dsp: 3,
            ..Default::default()
        };

        let solution = GreedyTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, opts.max_dsp).unwrap();

        let karatsuba = solution
            .iter()
            .filter(|t| t.param.kind().is_karatsuba())
            .collect::<Vec<_>>();

        assert_eq!(karatsuba.len(), 1);
        assert_eq!(karatsuba[0].anchor, Coord::ORIGIN);
        assert_eq!(solution.dsp_count(), 3);
        assert_eq!(solution.covered_area(&params), 64 * 72);
    }
}
