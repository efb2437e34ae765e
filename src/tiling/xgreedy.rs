//! Greedy tiling over all orientations of the DSP kinds.
//!
//! Greedy choices are sensitive to the orientation of non-square DSP blocks
//! near the grid edges. For every pair of DSP kinds that are transposes of
//! each other, both priority orders are tried, one greedy run per
//! combination. Successive combinations differ in a single pair, following a
//! Gray code.

use itertools::Itertools;
use log::{debug, warn};

use super::greedy::{GreedyResult, GreedyTiling};
use super::{Solution, TilingError, TilingParams, TilingStrategy, check_catalog};
use crate::config::TilingOptions;
use crate::tiles::TileCollection;

/// Pairs beyond this many are left in their default order.
const MAX_PAIRS: usize = 12;

pub struct XGreedyTiling<'a> {
    greedy: GreedyTiling<'a>,
    pairs: Vec<(usize, usize)>,
}

impl<'a> XGreedyTiling<'a> {
    pub fn new(
        params: &'a TilingParams,
        collection: &'a TileCollection,
        opts: &'a TilingOptions,
    ) -> XGreedyTiling<'a> {
        let mut pairs = Vec::new();
        let mut paired = vec![false; collection.len()];
        let base = collection.base();

        let dsp = collection.dsp().collect_vec();

        for (i, j) in dsp.into_iter().tuple_combinations() {
            if !paired[i] && !paired[j] && base[i].is_transpose_of(&base[j]) {
                paired[i] = true;
                paired[j] = true;
                pairs.push((i, j));
            }
        }

        if pairs.len() > MAX_PAIRS {
            warn!("only swapping the first {MAX_PAIRS} of {} DSP pairs", pairs.len());
            pairs.truncate(MAX_PAIRS);
        }

        XGreedyTiling {
            greedy: GreedyTiling::new(params, collection, opts),
            pairs,
        }
    }

    /// The swappable pairs of catalog indices.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }
}

impl TilingStrategy for XGreedyTiling<'_> {
    fn solve(&mut self) -> Result<Solution, TilingError> {
        check_catalog(self.greedy.collection(), self.greedy.opts())?;

        let mut order = (0..self.greedy.collection().len()).collect_vec();
        let mut best: Option<GreedyResult> = None;

        for run in 0..1u32 << self.pairs.len() {
            if run > 0 {
                let (i, j) = self.pairs[run.trailing_zeros() as usize];

                if let (Some(pi), Some(pj)) = (
                    order.iter().position(|&k| k == i),
                    order.iter().position(|&k| k == j),
                ) {
                    order.swap(pi, pj);
                }
            }

            self.greedy.set_order(order.clone());

            let bound = best.as_ref().map(|b| b.cost);

            if let Some(result) = self.greedy.run(bound)? {
                debug!("x-greedy run {run}: cost {:.2}", result.cost);

                if best.as_ref().map_or(true, |b| result.cost < b.cost) {
                    best = Some(result);
                }
            }
        }

        best.map(|b| b.solution).ok_or(TilingError::Infeasible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::GreedyTiling;
    use crate::tiling::testing;

    #[test]
    fn never_worse_than_greedy() {
        let params = TilingParams::new(41, 29);
        let opts = TilingOptions::default();
        let collection = testing::device_catalog(&params, &opts);

        let mut xgreedy = XGreedyTiling::new(&params, &collection, &opts);
        assert_eq!(xgreedy.pairs().len(), 1);

        let x = xgreedy.solve().unwrap();
        let g = GreedyTiling::new(&params, &collection, &opts).solve().unwrap();

        x.verify(&params, opts.max_dsp).unwrap();
        assert!(x.lut_cost(&params) <= g.lut_cost(&params) + 1e-9);

        let again = XGreedyTiling::new(&params, &collection, &opts).solve().unwrap();
        assert_eq!(x, again);
    }
}
