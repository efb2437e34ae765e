//! Optimal tiling by integer linear programming.
//!
//! Every placement of every catalog kind that touches the grid becomes a
//! binary variable. Cells whose weight exceeds the error budget must be
//! covered exactly once; lighter cells may stay uncovered as long as their
//! total weight fits the budget. The model is solved by the backend selected
//! in the options and decoded through a side table of the placements.

use std::time::Duration;

use log::{debug, info};

use super::greedy::GreedyTiling;
use super::{
    PlacedTile, Solution, TilingError, TilingParams, TilingStrategy,
    check_catalog,
};
use crate::config::TilingOptions;
use crate::field::TruncationRange;
use crate::geometry::Coord;
use crate::ilp::{self, LinExpr, Model, Sense, SolverError, SolverSolution, Status, Var};
use crate::tiles::{Parametrization, TileCollection};

/// What a tile variable is charged in the objective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum TileObjective {
    /// LUTs of the tile plus an estimate of compressing its outputs.
    WithCompression,
    /// LUTs of the tile alone; compression is modelled separately.
    Own,
}

struct Candidate {
    var: Var,
    tile: PlacedTile,
}

/// The covering model and the placements behind its variables.
pub(super) struct TilingModel {
    pub model: Model,
    candidates: Vec<Candidate>,
}

impl TilingModel {
    pub(super) fn build(
        params: &TilingParams,
        collection: &TileCollection,
        opts: &TilingOptions,
        objective: TileObjective,
    ) -> TilingModel {
        let (wx, wy) = (params.wx as i32, params.wy as i32);
        let range = params.truncation();
        let budget = params.error_budget();

        let mut model = Model::new(format!("tiling_{wx}x{wy}"));
        let mut candidates = Vec::new();
        let mut cover = vec![LinExpr::new(); (wx * wy) as usize];
        let mut dsp = LinExpr::new();

        for (idx, kind) in collection.base().iter().enumerate() {
            if kind.is_variable() || kind.dsp_cost() > opts.max_dsp {
                continue;
            }

            let (kw, kh) = (kind.max_width() as i32, kind.max_height() as i32);

            for y in (1 - kh)..wy {
                for x in (1 - kw)..wx {
                    let anchor = Coord::new(x, y);
                    let Some(param) = candidate_param(params, opts, kind.full(), anchor, &range)
                    else {
                        continue;
                    };

                    let tile = PlacedTile::new(param, anchor);
                    let cost = match objective {
                        TileObjective::WithCompression => tile.lut_cost(params),
                        TileObjective::Own => tile.own_lut_cost(params),
                    };

                    let var = model.add_binary(format!("t{idx}_{x}_{y}"), cost);

                    for c in tile.cells(params) {
                        cover[(c.y * wx + c.x) as usize].add_term(var, 1.0);
                    }

                    if tile.dsp_cost() > 0 {
                        dsp.add_term(var, f64::from(tile.dsp_cost()));
                    }

                    candidates.push(Candidate { var, tile });
                }
            }
        }

        let mut slack = LinExpr::new();
        let mut slack_weight = 0.0;

        for c in params.grid().cells() {
            let expr = &cover[(c.y * wx + c.x) as usize];
            let weight = 2f64.powi(c.weight());

            if weight <= budget {
                model.add_constraint(format!("c{}_{}", c.x, c.y), expr, Sense::Le, 1.0);

                slack.add_expr(expr, weight / budget);
                slack_weight += weight;
            } else {
                model.add_constraint(format!("c{}_{}", c.x, c.y), expr, Sense::Eq, 1.0);
            }
        }

        // Uncovered weight = slack_weight - covered weight <= budget.
        if slack_weight > budget {
            model.add_constraint(
                "error_budget",
                &slack,
                Sense::Ge,
                (slack_weight - budget) / budget,
            );
        }

        if !dsp.is_empty() {
            model.add_constraint("dsp_budget", &dsp, Sense::Le, f64::from(opts.max_dsp));
        }

        debug!(
            "tiling model: {} placements, {} constraints",
            candidates.len(),
            model.constraints().len()
        );

        TilingModel { model, candidates }
    }

    /// Variables and the placements they stand for.
    pub(super) fn placements(&self) -> impl Iterator<Item = (Var, &PlacedTile)> {
        self.candidates.iter().map(|c| (c.var, &c.tile))
    }

    /// Seeds the solver with `solution` and returns the model placements it
    /// was mapped onto. Returns `None`, leaving the start untouched, if some
    /// tile has no counterpart in the model.
    pub(super) fn warm_start(
        &mut self,
        solution: &Solution,
        params: &TilingParams,
    ) -> Option<Solution> {
        let grid = params.grid();
        let mut chosen = Vec::with_capacity(solution.len());

        for tile in solution {
            let clip = tile.bounding_box().intersect(&grid);

            let found = self.candidates.iter().find(|c| {
                c.tile.param.kind() == tile.param.kind()
                    && c.tile.bounding_box().intersect(&grid) == clip
                    && (!c.tile.param.kind().is_irregular() || c.tile.anchor == tile.anchor)
            });

            match found {
                Some(c) => chosen.push((c.var, c.tile.clone())),
                None => {
                    debug!("no model placement for {tile}; solving without a start");
                    return None;
                }
            }
        }

        for c in &self.candidates {
            self.model.set_start(c.var, 0.0);
        }

        Some(
            chosen
                .into_iter()
                .map(|(var, tile)| {
                    self.model.set_start(var, 1.0);
                    tile
                })
                .collect(),
        )
    }

    pub(super) fn decode(&self, result: &SolverSolution) -> Solution {
        self.candidates
            .iter()
            .filter(|c| result.is_set(c.var))
            .map(|c| c.tile.clone())
            .collect()
    }
}

/// The parametrization placed at `anchor`, if the placement is worth a
/// variable: it must touch the grid, and DSP placements must fill enough of
/// their block with required cells.
fn candidate_param(
    params: &TilingParams,
    opts: &TilingOptions,
    full: Parametrization,
    anchor: Coord,
    range: &TruncationRange,
) -> Option<Parametrization> {
    let grid = params.grid();
    let mut in_grid = 0u32;
    let mut required = 0u32;

    for c in full.cells(anchor).filter(|&c| grid.contains(c)) {
        in_grid += 1;

        if !range.contains(c) {
            required += 1;
        }
    }

    if in_grid == 0 {
        return None;
    }

    let kind = *full.kind();

    if kind.dsp_cost() > 0 {
        let area = f64::from(kind.area());

        if f64::from(required) < opts.occupation_threshold * area || required == 0 {
            return None;
        }
    }

    let (wx, wy, signed_io) = (params.wx, params.wy, params.signed_io);

    Some(
        full.try_dsp_expand(anchor, wx, wy, signed_io)
            .with_edge_signs(anchor, wx, wy, signed_io),
    )
}

/// A greedy solution to start the solver from.
pub(super) fn greedy_start(
    params: &TilingParams,
    collection: &TileCollection,
    opts: &TilingOptions,
) -> Option<Solution> {
    match GreedyTiling::new(params, collection, opts).run(None) {
        Ok(Some(result)) => Some(result.solution),
        Ok(None) => None,
        Err(err) => {
            debug!("no greedy start: {err}");
            None
        }
    }
}

/// Runs `model` on the configured backend.
pub(super) fn run_solver(
    model: &Model,
    opts: &TilingOptions,
    timeout: Duration,
) -> Result<SolverSolution, TilingError> {
    let mut solver = ilp::solver(opts.solver)?;
    let result = solver.solve(model, timeout)?;

    info!(
        "{}: {} after solving, objective {:.2}",
        model.name(),
        result.status,
        result.objective
    );

    Ok(result)
}

pub struct OptimalTiling<'a> {
    params: &'a TilingParams,
    collection: &'a TileCollection,
    opts: &'a TilingOptions,
}

impl<'a> OptimalTiling<'a> {
    pub fn new(
        params: &'a TilingParams,
        collection: &'a TileCollection,
        opts: &'a TilingOptions,
    ) -> OptimalTiling<'a> {
        OptimalTiling {
            params,
            collection,
            opts,
        }
    }
}

impl TilingStrategy for OptimalTiling<'_> {
    fn solve(&mut self) -> Result<Solution, TilingError> {
        check_catalog(self.collection, self.opts)?;

        let mut tiling = TilingModel::build(
            self.params,
            self.collection,
            self.opts,
            TileObjective::WithCompression,
        );

        if self.opts.ilp_warm_start {
            if let Some(start) = greedy_start(self.params, self.collection, self.opts) {
                tiling.warm_start(&start, self.params);
            }
        }

        let result = run_solver(&tiling.model, self.opts, self.opts.ilp_timeout)?;

        match result.status {
            Status::Optimal | Status::Feasible => Ok(tiling.decode(&result)),
            Status::Infeasible => Err(TilingError::Infeasible),
            Status::TimeLimit => Err(TilingError::Solver(SolverError::Backend(format!(
                "no tiling found within {:?}",
                self.opts.ilp_timeout
            )))),
        }
    }
}
