//! Beam search over greedy choices.
//!
//! Starting from a greedy baseline, every step of the best known path is
//! challenged by the catalog entries within `beam_range` of the tile chosen
//! there. Each alternative is completed greedily, bounded by the best cost so
//! far, and replaces the best path when strictly cheaper.

use log::{debug, trace};

use super::greedy::{GreedyProgress, GreedyTiling};
use super::{Solution, TilingError, TilingParams, TilingStrategy, check_catalog};
use crate::config::TilingOptions;
use crate::field::CursorPolicy;
use crate::tiles::TileCollection;

pub struct BeamSearch<'a> {
    greedy: GreedyTiling<'a>,
    range: usize,
}

impl<'a> BeamSearch<'a> {
    pub fn new(
        params: &'a TilingParams,
        collection: &'a TileCollection,
        opts: &'a TilingOptions,
    ) -> BeamSearch<'a> {
        BeamSearch {
            greedy: GreedyTiling::new(params, collection, opts)
                .with_policy(CursorPolicy::NearestPoint),
            range: opts.beam_range,
        }
    }

    /// The greedy run the search starts from.
    pub fn baseline(&self) -> Result<Solution, TilingError> {
        let result = self.greedy.run(None)?.ok_or(TilingError::Infeasible)?;

        Ok(result.solution)
    }
}

impl TilingStrategy for BeamSearch<'_> {
    fn solve(&mut self) -> Result<Solution, TilingError> {
        let greedy = &self.greedy;
        let collection = greedy.collection();

        check_catalog(collection, greedy.opts())?;

        let baseline = greedy.run(None)?.ok_or(TilingError::Infeasible)?;
        let mut best_cost = baseline.cost;
        let mut best_path = baseline.path;

        debug!("beam search baseline: cost {best_cost:.2}");

        let (mut field, state) = greedy.field();
        let mut base = GreedyProgress::new(state);
        let last = collection.len().saturating_sub(1);

        while !base.state.is_complete() {
            let step = base.path.len();
            let Some(&chosen) = best_path.get(step) else {
                break;
            };

            let lo = chosen.saturating_sub(self.range);
            let hi = (chosen + self.range).min(last);

            for idx in (lo..=hi).filter(|&idx| idx != chosen) {
                let mut branch = base.branch(&mut field);

                if !greedy.step(&mut field, &mut branch, Some(idx))?
                    || branch.cost > best_cost
                    || !greedy.complete(&mut field, &mut branch, Some(best_cost))?
                {
                    continue;
                }

                let result = greedy.finish(branch);

                if result.cost < best_cost {
                    trace!(
                        "step {step}: tile {idx} instead of {chosen} lowers cost to {:.2}",
                        result.cost
                    );

                    best_cost = result.cost;
                    best_path = result.path;
                }
            }

            let next = best_path[step];

            if !greedy.step(&mut field, &mut base, Some(next))? {
                return Err(TilingError::InvalidSolution(format!(
                    "best path tile {next} does not fit at step {step}"
                )));
            }
        }

        let result = greedy.replay(&best_path)?;

        debug!("beam search: cost {:.2}", result.cost);

        Ok(result.solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::testing;

    #[test]
    fn never_worse_than_baseline() {
        for (wx, wy) in [(10, 7), (30, 21)] {
            let params = TilingParams::new(wx, wy);
            let opts = TilingOptions {
                use_irregular: true,
                max_dsp: 2,
                ..Default::default()
            };
            let collection = testing::device_catalog(&params, &opts);

            let mut beam = BeamSearch::new(&params, &collection, &opts);
            let baseline = beam.baseline().unwrap();
            let solution = beam.solve().unwrap();

            solution.verify(&params, opts.max_dsp).unwrap();
            assert!(
                solution.lut_cost(&params) <= baseline.lut_cost(&params) + 1e-9
            );
        }
    }
}
