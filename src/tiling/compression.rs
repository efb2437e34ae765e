//! Tiling and compression optimized together.
//!
//! The tiling model of [`super::optimal`] is extended with a staged
//! compressor tree over the bit heap the chosen tiles produce. Stage 0 holds
//! the tile output bits per column; every stage places compressors that
//! consume at least the column's bits and emit bits into the next stage.
//! After the last stage at most two bits per column may remain for the final
//! adder. The stage count starts at zero and grows until the model becomes
//! feasible or the cap is reached.

use itertools::Itertools;
use log::{debug, info};
use smallvec::SmallVec;

use super::optimal::{TileObjective, TilingModel, greedy_start, run_solver};
use super::{Solution, TilingError, TilingParams, TilingStrategy, check_catalog};
use crate::bitheap::{BitHeapShape, ColumnRange, tile_columns};
use crate::config::TilingOptions;
use crate::ilp::{LinExpr, Sense, SolverSolution, Var};
use crate::tiles::TileCollection;

/// Bits a final two-input adder takes per column.
const FINAL_HEIGHT: f64 = 2.0;

/// Generalized parallel counters available to the compressor tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compressor {
    /// (6;3) counter.
    Gpc63,
    /// (3;2) full adder.
    FullAdder,
    /// (2;2) half adder.
    HalfAdder,
    /// (1;1) wire, passing a bit on to the next stage.
    Wire,
}

impl Compressor {
    pub const ALL: [Compressor; 4] = [
        Compressor::Gpc63,
        Compressor::FullAdder,
        Compressor::HalfAdder,
        Compressor::Wire,
    ];

    /// Bits consumed from a single column.
    pub fn inputs(self) -> u32 {
        match self {
            Compressor::Gpc63 => 6,
            Compressor::FullAdder => 3,
            Compressor::HalfAdder => 2,
            Compressor::Wire => 1,
        }
    }

    /// Bits emitted, one into each of this many consecutive columns.
    pub fn outputs(self) -> u32 {
        match self {
            Compressor::Gpc63 => 3,
            Compressor::FullAdder | Compressor::HalfAdder => 2,
            Compressor::Wire => 1,
        }
    }

    /// LUTs per instance.
    pub fn cost(self) -> f64 {
        match self {
            Compressor::Gpc63 => 3.0,
            Compressor::FullAdder => 1.0,
            Compressor::HalfAdder => 0.5,
            Compressor::Wire => 0.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compressor::Gpc63 => "(6;3)",
            Compressor::FullAdder => "(3;2)",
            Compressor::HalfAdder => "(2;2)",
            Compressor::Wire => "(1;1)",
        }
    }
}

/// `count` compressors of one type placed on one column in one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressorUse {
    pub stage: u32,
    pub column: u32,
    pub compressor: Compressor,
    pub count: u32,
}

/// The compressor tree that reduces a tiling's bit heap to two rows.
/// Wires are not listed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompressionPlan {
    pub stages: u32,
    pub uses: Vec<CompressorUse>,
}

impl CompressionPlan {
    pub fn cost(&self) -> f64 {
        self.uses
            .iter()
            .map(|u| u.compressor.cost() * f64::from(u.count))
            .sum()
    }

    /// Reduces `heights` with full adders only, passing leftover bits on
    /// as wires. Returns the counts of full adders and wires per stage and
    /// column.
    fn wallace(heights: &[u32]) -> Vec<Vec<(u32, u32)>> {
        let mut heights = heights.to_vec();
        let mut stages = Vec::new();

        while heights.iter().any(|&h| f64::from(h) > FINAL_HEIGHT) {
            let stage = heights.iter().map(|&h| (h / 3, h % 3)).collect_vec();

            let mut next = vec![0; heights.len() + 1];
            for (c, &(adders, wires)) in stage.iter().enumerate() {
                next[c] += adders + wires;
                next[c + 1] += adders;
            }

            while next.last() == Some(&0) {
                next.pop();
            }

            heights = next;
            stages.push(stage);
        }

        stages
    }

    /// Number of full adder stages needed for `heights`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use intmul_tiling::tiling::CompressionPlan;
    /// #
    /// assert_eq!(CompressionPlan::wallace_stages(&[2, 2, 1]), 0);
    /// assert_eq!(CompressionPlan::wallace_stages(&[3]), 1);
    /// assert_eq!(CompressionPlan::wallace_stages(&[6, 6]), 3);
    /// ```
    pub fn wallace_stages(heights: &[u32]) -> u32 {
        Self::wallace(heights).len() as u32
    }
}

/// Compressor variables of one model, by stage, column and type.
struct Tree {
    columns: u32,
    stages: Vec<Vec<Vec<(Compressor, Var)>>>,
}

impl Tree {
    fn var(&self, stage: usize, column: usize, compressor: Compressor) -> Option<Var> {
        self.stages
            .get(stage)?
            .get(column)?
            .iter()
            .find(|(c, _)| *c == compressor)
            .map(|&(_, var)| var)
    }
}

pub struct TilingAndCompression<'a> {
    params: &'a TilingParams,
    collection: &'a TileCollection,
    opts: &'a TilingOptions,
    plan: Option<CompressionPlan>,
}

impl<'a> TilingAndCompression<'a> {
    pub fn new(
        params: &'a TilingParams,
        collection: &'a TileCollection,
        opts: &'a TilingOptions,
    ) -> TilingAndCompression<'a> {
        TilingAndCompression {
            params,
            collection,
            opts,
            plan: None,
        }
    }

    /// The compressor tree of the last successful solve.
    pub fn plan(&self) -> Option<&CompressionPlan> {
        self.plan.as_ref()
    }

    /// Adds `stages` compressor stages on top of the tile bits of `tiling`.
    fn add_tree(&self, tiling: &mut TilingModel, stages: u32) -> Tree {
        let params = self.params;
        let mut base: Vec<LinExpr> = Vec::new();

        for (var, ranges) in &placement_columns(tiling, params) {
            for range in ranges {
                let end = (range.lsb + range.count) as usize;

                if base.len() < end {
                    base.resize(end, LinExpr::new());
                }

                for c in range.columns() {
                    base[c as usize].add_term(*var, 1.0);
                }
            }
        }

        let columns = base.len() as u32 + 2 * stages + 1;
        base.resize(columns as usize, LinExpr::new());

        // No column can hold more bits than there are placements covering it.
        let bound = base.iter().map(|e| e.terms().len()).max().unwrap_or(0).max(1) as i64;

        let model = &mut tiling.model;
        let mut heights = base;
        let mut tree = Tree {
            columns,
            stages: Vec::new(),
        };

        for s in 0..stages {
            let mut next = vec![LinExpr::new(); columns as usize];
            let mut vars = Vec::with_capacity(columns as usize);

            for c in 0..columns {
                let mut inputs = LinExpr::new();
                let mut here = Vec::new();

                for compressor in Compressor::ALL {
                    if c + compressor.outputs() > columns {
                        continue;
                    }

                    let var = model.add_integer(
                        format!("k{s}_{c}_{}", compressor.inputs()),
                        0,
                        bound,
                        compressor.cost(),
                    );

                    inputs.add_term(var, f64::from(compressor.inputs()));

                    for j in 0..compressor.outputs() {
                        next[(c + j) as usize].add_term(var, 1.0);
                    }

                    here.push((compressor, var));
                }

                inputs.add_expr(&heights[c as usize], -1.0);
                model.add_constraint(format!("in{s}_{c}"), &inputs, Sense::Ge, 0.0);

                vars.push(here);
            }

            heights = next;
            tree.stages.push(vars);
        }

        for (c, height) in heights.iter().enumerate() {
            if !height.is_empty() {
                model.add_constraint(format!("out{c}"), height, Sense::Le, FINAL_HEIGHT);
            }
        }

        tree
    }

    /// Starts the compressor variables from a full adder reduction of the
    /// bit heap of `tiles`. Returns `false` if that reduction needs more
    /// stages than the model has.
    fn warm_start_tree(
        &self,
        tiling: &mut TilingModel,
        tree: &Tree,
        tiles: &Solution,
    ) -> bool {
        let heap = BitHeapShape::from_solution(tiles, self.params);
        let wallace = CompressionPlan::wallace(heap.heights());

        if wallace.len() > tree.stages.len() {
            return false;
        }

        let mut heights = heap.heights().to_vec();
        heights.resize(tree.columns as usize, 0);

        for (s, stage) in tree.stages.iter().enumerate() {
            let mut next = vec![0; tree.columns as usize];

            for (c, vars) in stage.iter().enumerate() {
                let (adders, wires) = match wallace.get(s) {
                    Some(step) => step.get(c).copied().unwrap_or((0, 0)),
                    None => (0, heights[c]),
                };

                for &(compressor, var) in vars {
                    let value = match compressor {
                        Compressor::FullAdder => adders,
                        Compressor::Wire => wires,
                        _ => 0,
                    };

                    tiling.model.set_start(var, f64::from(value));
                }

                if adders > 0 && tree.var(s, c, Compressor::FullAdder).is_none() {
                    return false;
                }

                next[c] += adders + wires;
                if let Some(carry) = next.get_mut(c + 1) {
                    *carry += adders;
                }
            }

            heights = next;
        }

        true
    }

    fn decode_plan(&self, tree: &Tree, result: &SolverSolution) -> CompressionPlan {
        let mut plan = CompressionPlan {
            stages: tree.stages.len() as u32,
            uses: Vec::new(),
        };

        for (s, stage) in tree.stages.iter().enumerate() {
            for (c, vars) in stage.iter().enumerate() {
                for &(compressor, var) in vars {
                    let count = result.value(var).round() as u32;

                    if count > 0 && compressor != Compressor::Wire {
                        plan.uses.push(CompressorUse {
                            stage: s as u32,
                            column: c as u32,
                            compressor,
                            count,
                        });
                    }
                }
            }
        }

        plan
    }

    /// Upper end of the stage search.
    fn stage_cap(&self, start: Option<&Solution>) -> u32 {
        if let Some(cap) = self.opts.max_stages {
            return cap;
        }

        let heights = match start {
            Some(tiles) => BitHeapShape::from_solution(tiles, self.params)
                .heights()
                .to_vec(),
            None => {
                let tiling = TilingModel::build(
                    self.params,
                    self.collection,
                    self.opts,
                    TileObjective::Own,
                );

                worst_case_heights(&placement_columns(&tiling, self.params), self.params)
            }
        };

        CompressionPlan::wallace_stages(&heights) + 2
    }
}

/// The columns every placement of `tiling` feeds.
fn placement_columns(
    tiling: &TilingModel,
    params: &TilingParams,
) -> Vec<(Var, SmallVec<[ColumnRange; 4]>)> {
    tiling
        .placements()
        .map(|(var, tile)| (var, tile_columns(tile, params)))
        .collect()
}

/// The tallest each column can get under any cover by `placements`. A column
/// holds no more bits than placements feed it, and no more tiles reach it
/// than there are grid cells of at most its weight.
fn worst_case_heights(
    placements: &[(Var, SmallVec<[ColumnRange; 4]>)],
    params: &TilingParams,
) -> Vec<u32> {
    let mut fan_in: Vec<u32> = Vec::new();
    let mut terms = 1;

    for (_, ranges) in placements {
        terms = terms.max(ranges.len() as u32);

        for range in ranges {
            let end = (range.lsb + range.count) as usize;

            if fan_in.len() < end {
                fan_in.resize(end, 0);
            }

            for c in range.columns() {
                fan_in[c as usize] += 1;
            }
        }
    }

    let mut cells = vec![0u32; fan_in.len()];
    for c in params.grid().cells() {
        if let Some(count) = cells.get_mut(c.weight() as usize) {
            *count += 1;
        }
    }

    let mut reached = 0;

    fan_in
        .iter()
        .zip(cells)
        .map(|(&fan_in, here)| {
            reached += here;
            fan_in.min(reached * terms)
        })
        .collect()
}

impl TilingStrategy for TilingAndCompression<'_> {
    fn solve(&mut self) -> Result<Solution, TilingError> {
        check_catalog(self.collection, self.opts)?;

        let start = self
            .opts
            .ilp_warm_start
            .then(|| greedy_start(self.params, self.collection, self.opts))
            .flatten();

        let cap = self.stage_cap(start.as_ref());

        for stages in 0..=cap {
            let mut tiling = TilingModel::build(
                self.params,
                self.collection,
                self.opts,
                TileObjective::Own,
            );
            let tree = self.add_tree(&mut tiling, stages);

            if let Some(start) = &start {
                if let Some(mapped) = tiling.warm_start(start, self.params) {
                    if !self.warm_start_tree(&mut tiling, &tree, &mapped) {
                        debug!("greedy bit heap needs more than {stages} stages");
                    }
                }
            }

            let result = run_solver(&tiling.model, self.opts, self.opts.ilp_timeout)?;

            if !result.status.has_solution() {
                info!("no tiling and compression with {stages} stages: {}", result.status);
                continue;
            }

            let plan = self.decode_plan(&tree, &result);

            info!(
                "tiling and compression with {stages} stages: compressors {:.2} LUTs",
                plan.cost()
            );

            self.plan = Some(plan);
            return Ok(tiling.decode(&result));
        }

        Err(TilingError::StageLimit { limit: cap })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::target::Device;
    use crate::tiles::TileKind;
    use crate::tiling::testing;

    fn opts() -> TilingOptions {
        TilingOptions {
            ilp_timeout: Duration::from_secs(5),
            ..TilingOptions::lut_only()
        }
    }

    #[test]
    fn wallace_reduction_steps() {
        assert_eq!(CompressionPlan::wallace(&[3]), vec![vec![(1, 0)]]);
        assert_eq!(
            CompressionPlan::wallace(&[6, 6]),
            vec![
                vec![(2, 0), (2, 0)],
                vec![(0, 2), (1, 1), (0, 2)],
                vec![(0, 2), (0, 2), (1, 0)],
            ]
        );
    }

    #[test]
    fn small_grid_compresses() {
        let params = TilingParams::new(3, 3);
        let opts = opts();
        let collection = testing::lut_catalog();

        let mut strategy = TilingAndCompression::new(&params, &collection, &opts);
        let solution = strategy.solve().unwrap();

        solution.verify(&params, 0).unwrap();

        // A single 3x3 tile feeds one bit per column.
        let heap = BitHeapShape::from_solution(&solution, &params);
        assert!(heap.max_height() <= 2);

        let plan = strategy.plan().unwrap();
        assert_eq!(plan.stages, 0);
        assert!(plan.uses.is_empty());
    }

    #[test]
    fn stage_cap_is_reported() {
        let params = TilingParams::new(3, 3);
        let opts = TilingOptions {
            max_stages: Some(0),
            ..opts()
        };
        // Only 1x1 tiles: nine bits, three of them in column 2.
        let device = Device::default();
        let collection = TileCollection::from_kinds(vec![TileKind::lut(&device, 1, 1)]);

        let result = TilingAndCompression::new(&params, &collection, &opts).solve();

        assert!(matches!(result, Err(TilingError::StageLimit { limit: 0 })));
    }

    #[test]
    fn cap_without_start_bounds_any_heap() {
        let params = TilingParams::new(8, 8);
        let opts = TilingOptions {
            ilp_warm_start: false,
            ..opts()
        };
        let collection = testing::lut_catalog();

        let tiling = TilingModel::build(&params, &collection, &opts, TileObjective::Own);
        let worst = worst_case_heights(&placement_columns(&tiling, &params), &params);

        let greedy = greedy_start(&params, &collection, &opts).unwrap();
        let heap = BitHeapShape::from_solution(&greedy, &params);

        for (c, &height) in heap.heights().iter().enumerate() {
            assert!(worst[c] >= height, "column {c}: {} < {height}", worst[c]);
        }

        // Columns fed by several tile sizes outgrow the grid's short side.
        assert!(worst.iter().any(|&h| h > 8));

        let strategy = TilingAndCompression::new(&params, &collection, &opts);
        assert_eq!(
            strategy.stage_cap(None),
            CompressionPlan::wallace_stages(&worst) + 2
        );
    }
}
