//! Basic tiling.
//!
//! The grid is cut into boxes the size of the preferred tile, the largest DSP
//! block. Boxes with enough required cells take a DSP each; the others, and
//! everything once the DSP budget is spent, are filled with LUT tiles by a
//! recursive box tiler. Truncated multipliers lay the boxes out from the most
//! significant corner, so that clipped boxes end up next to the dropped band.

use log::debug;

use super::{
    PlacedTile, Solution, TilingError, TilingParams, TilingStrategy,
    check_catalog,
};
use crate::config::TilingOptions;
use crate::field::TruncationRange;
use crate::geometry::{Coord, Rect};
use crate::tiles::{TileCollection, TileKind, TileShape};

pub struct BasicTiling<'a> {
    params: &'a TilingParams,
    collection: &'a TileCollection,
    opts: &'a TilingOptions,
    range: TruncationRange,
}

impl<'a> BasicTiling<'a> {
    pub fn new(
        params: &'a TilingParams,
        collection: &'a TileCollection,
        opts: &'a TilingOptions,
    ) -> BasicTiling<'a> {
        BasicTiling {
            params,
            collection,
            opts,
            range: params.truncation(),
        }
    }

    /// Box origins along one axis of length `len`.
    fn starts(&self, len: u32, step: u32) -> Vec<i32> {
        let (len, step) = (len as i32, step as i32);

        if self.params.is_truncated() {
            let first = len - step;

            (0..)
                .map(|i| first - i * step)
                .take_while(|&start| start + step > 0)
                .collect()
        } else {
            (0..).map(|i| i * step).take_while(|&start| start < len).collect()
        }
    }

    /// The most efficient LUT tile fitting into `b`.
    fn fitting_lut(&self, b: &Rect) -> Option<&'a TileKind> {
        self.collection.base().iter().find(|kind| match kind.shape() {
            TileShape::Lut { wx, wy } => *wx <= b.w && *wy <= b.h,
            _ => false,
        })
    }

    /// Covers the required cells of `b` with LUT tiles.
    fn tile_box(&self, b: Rect, out: &mut Solution) -> Result<(), TilingError> {
        let Some(b) = self.range.shrink_box(&b) else {
            return Ok(());
        };

        if self.range.kept_in(&b) < b.area() {
            let (first, second) = if b.w >= b.h {
                let half = b.w / 2;

                (
                    Rect::new(b.x, b.y, half, b.h),
                    Rect::new(b.x + half as i32, b.y, b.w - half, b.h),
                )
            } else {
                let half = b.h / 2;

                (
                    Rect::new(b.x, b.y, b.w, half),
                    Rect::new(b.x, b.y + half as i32, b.w, b.h - half),
                )
            };

            self.tile_box(first, out)?;
            return self.tile_box(second, out);
        }

        let kind = self
            .fitting_lut(&b)
            .ok_or_else(|| TilingError::no_tile_fits(b.origin()))?;

        let (lw, lh) = (kind.max_width(), kind.max_height());
        let (nx, ny) = (b.w / lw, b.h / lh);

        for j in 0..ny {
            for i in 0..nx {
                let anchor = Coord::new(b.x + (i * lw) as i32, b.y + (j * lh) as i32);

                let p = kind.full().with_edge_signs(
                    anchor,
                    self.params.wx,
                    self.params.wy,
                    self.params.signed_io,
                );

                out.push(PlacedTile::new(p, anchor));
            }
        }

        let right = Rect::new(b.x + (nx * lw) as i32, b.y, b.w - nx * lw, b.h);
        let top = Rect::new(b.x, b.y + (ny * lh) as i32, nx * lw, b.h - ny * lh);

        for rest in [right, top] {
            if !rest.is_empty() {
                self.tile_box(rest, out)?;
            }
        }

        Ok(())
    }
}

impl TilingStrategy for BasicTiling<'_> {
    fn solve(&mut self) -> Result<Solution, TilingError> {
        check_catalog(self.collection, self.opts)?;

        let params = self.params;
        let grid = params.grid();
        let mut out = Solution::new();

        let preferred = self
            .collection
            .preferred()
            .and_then(|idx| self.collection.get(idx))
            .filter(|kind| kind.is_dsp() && self.opts.max_dsp > 0);

        let Some(dsp) = preferred else {
            self.tile_box(grid, &mut out)?;
            return Ok(out);
        };

        let (pw, ph) = (dsp.max_width(), dsp.max_height());
        let mut used_dsp = 0;

        for y in self.starts(params.wy, ph) {
            for x in self.starts(params.wx, pw) {
                let b = Rect::new(x, y, pw, ph).intersect(&grid);
                let Some(shrunk) = self.range.shrink_box(&b) else {
                    continue;
                };

                let occupancy =
                    self.range.kept_in(&shrunk) as f64 / f64::from(dsp.area());

                let placed = (used_dsp < self.opts.max_dsp
                    && occupancy >= self.opts.occupation_threshold)
                    .then(|| dsp.parametrize(shrunk.w, shrunk.h, false, false))
                    .flatten()
                    .map(|p| {
                        p.with_edge_signs(
                            shrunk.origin(),
                            params.wx,
                            params.wy,
                            params.signed_io,
                        )
                    });

                match placed {
                    Some(p) => {
                        used_dsp += 1;
                        out.push(PlacedTile::new(p, shrunk.origin()));
                    }
                    None => self.tile_box(shrunk, &mut out)?,
                }
            }
        }

        debug!("basic tiling: {} tiles, {used_dsp} DSPs", out.len());

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::testing;

    #[test]
    fn lut_grid_with_unit_fill() {
        let params = TilingParams::new(8, 8);
        let collection = testing::lut_catalog();
        let opts = TilingOptions {
            occupation_threshold: 1.0,
            ..Default::default()
        };

        let solution = BasicTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, opts.max_dsp).unwrap();
        assert_eq!(solution.covered_area(&params), 64);
        assert_eq!(solution.dsp_count(), 0);
        assert_eq!(
            solution.iter().filter(|t| t.param.kind().area() == 9).count(),
            4
        );
    }

    #[test]
    fn dsp_boxes_then_luts() {
        let params = TilingParams::new(50, 34);
        let opts = TilingOptions {
            max_dsp: 3,
            ..Default::default()
        };
        let collection = testing::device_catalog(&params, &opts);

        let solution = BasicTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, opts.max_dsp).unwrap();
        assert_eq!(solution.dsp_count(), 3);
        assert_eq!(solution.covered_area(&params), 50 * 34);
    }

    #[test]
    fn truncated_boxes_skip_dropped_band() {
        let params = TilingParams::new(30, 30).with_w_out(30);
        let opts = TilingOptions::default();
        let collection = testing::device_catalog(&params, &opts);

        let solution = BasicTiling::new(&params, &collection, &opts)
            .solve()
            .unwrap();

        solution.verify(&params, opts.max_dsp).unwrap();
        assert!(solution.covered_area(&params) < 900);

        // The first box sits in the most significant corner.
        let first = &solution.tiles()[0];
        assert!(first.param.kind().is_dsp());
        assert_eq!(first.bounding_box().end_x(), 30);
        assert_eq!(first.bounding_box().end_y(), 30);
    }

    #[test]
    fn deterministic() {
        let params = TilingParams::new(40, 40).with_w_out(41).signed(true);
        let opts = TilingOptions::default();
        let collection = testing::device_catalog(&params, &opts);

        let run = || {
            BasicTiling::new(&params, &collection, &opts)
                .solve()
                .unwrap()
        };

        let solution = run();
        solution.verify(&params, opts.max_dsp).unwrap();
        assert_eq!(solution, run());
    }

    #[test]
    fn sign_edge_tiles_are_signed() {
        for (params, opts) in [
            (TilingParams::new(8, 8), TilingOptions::lut_only()),
            (
                TilingParams::new(50, 34),
                TilingOptions {
                    max_dsp: 4,
                    ..Default::default()
                },
            ),
        ] {
            let params = params.signed(true);
            let collection = testing::device_catalog(&params, &opts);

            let solution = BasicTiling::new(&params, &collection, &opts)
                .solve()
                .unwrap();

            solution.verify(&params, opts.max_dsp).unwrap();

            for tile in &solution {
                let bounds = tile.bounding_box();

                assert_eq!(
                    tile.param.is_signed_x(),
                    bounds.end_x() >= params.wx as i32,
                    "{tile:?}"
                );
                assert_eq!(
                    tile.param.is_signed_y(),
                    bounds.end_y() >= params.wy as i32,
                    "{tile:?}"
                );
            }
        }
    }
}
