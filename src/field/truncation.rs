//! Truncated multipliers.
//!
//! A multiplier with fewer output bits than the full product may drop
//! partial product bits of low weight, as long as their total stays within
//! the error budget of one output ulp. The dropped cells form a diagonal band
//! anchored at the origin: every cell of weight below a threshold `k`, plus a
//! prefix of the weight-`k` diagonal ordered by ascending `x`.

use log::debug;

use crate::geometry::{Coord, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TruncationRange {
    wx: u32,
    wy: u32,
    /// Cells of weight below this are dropped.
    threshold: i32,
    /// Number of weight-`threshold` cells dropped in addition.
    partial: u32,
}

impl TruncationRange {
    /// No cell is dropped.
    pub fn none(wx: u32, wy: u32) -> TruncationRange {
        TruncationRange {
            wx,
            wy,
            threshold: 0,
            partial: 0,
        }
    }

    /// The largest range whose dropped weight fits the error budget of a
    /// `wx × wy` multiplier rounded to `w_out` bits.
    ///
    /// # Examples
    ///
    /// ```
    /// # use intmul_tiling::field::TruncationRange;
    /// #
    /// // Budget 2^8: weights 0..5 sum to 129, then three cells of weight 5.
    /// let range = TruncationRange::new(8, 8, 8);
    ///
    /// assert_eq!(range.threshold(), 5);
    /// assert_eq!(range.cell_count(), 18);
    /// assert!(TruncationRange::new(8, 8, 16).is_empty());
    /// ```
    pub fn new(wx: u32, wy: u32, w_out: u32) -> TruncationRange {
        let mut range = TruncationRange::none(wx, wy);
        let full = wx + wy;

        if wx == 0 || wy == 0 || w_out >= full {
            return range;
        }

        let budget = Self::error_budget(wx, wy, w_out);
        let mut spent = 0.0;

        for weight in 0..=(full - 2) as i32 {
            let unit = 2f64.powi(weight);
            let column = f64::from(range.diagonal_len(weight)) * unit;

            if spent + column <= budget {
                spent += column;
                range.threshold = weight + 1;
            } else {
                range.partial = ((budget - spent) / unit).floor() as u32;
                break;
            }
        }

        debug!(
            "truncating {wx}x{wy} to {w_out} bits: weight < {} plus {} cells",
            range.threshold, range.partial
        );

        range
    }

    /// Total weight of the partial product bits a `wx × wy` multiplier rounded
    /// to `w_out` bits may drop.
    pub fn error_budget(wx: u32, wy: u32, w_out: u32) -> f64 {
        let full = wx + wy;

        if w_out >= full {
            0.0
        } else {
            2f64.powi((full - w_out) as i32)
        }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn is_empty(&self) -> bool {
        self.threshold == 0 && self.partial == 0
    }

    /// Number of cells of weight `w` in the grid.
    fn diagonal_len(&self, w: i32) -> u32 {
        let (lo, hi) = self.diagonal_span(w);

        (hi - lo + 1).max(0) as u32
    }

    /// Range of `x` over the cells of weight `w`.
    fn diagonal_span(&self, w: i32) -> (i32, i32) {
        let lo = (w - (self.wy as i32 - 1)).max(0);
        let hi = w.min(self.wx as i32 - 1);

        (lo, hi)
    }

    pub fn contains(&self, c: Coord) -> bool {
        let w = c.weight();

        if w < self.threshold {
            return true;
        }

        w == self.threshold
            && c.x - self.diagonal_span(w).0 < self.partial as i32
    }

    /// Number of dropped cells in the grid.
    pub fn cell_count(&self) -> u64 {
        self.dropped_in(&Rect::grid(self.wx, self.wy))
    }

    /// Number of dropped cells within `b`, in closed form.
    pub fn dropped_in(&self, b: &Rect) -> u64 {
        let b = b.intersect(&Rect::grid(self.wx, self.wy));

        if b.is_empty() {
            return 0;
        }

        // Cells (i, j) >= 0 with i + j < t.
        let below = |t: i64| if t > 0 { (t * (t + 1) / 2) as u64 } else { 0 };

        let k = i64::from(self.threshold);
        let (x0, y0) = (i64::from(b.x), i64::from(b.y));
        let (x1, y1) = (i64::from(b.end_x()), i64::from(b.end_y()));

        let triangle = below(k - x0 - y0) + below(k - x1 - y1)
            - below(k - x1 - y0)
            - below(k - x0 - y1);

        let (lo, _) = self.diagonal_span(self.threshold);
        let first = lo.max(b.x).max(self.threshold - b.end_y() + 1);
        let last = (lo + self.partial as i32 - 1)
            .min(b.end_x() - 1)
            .min(self.threshold - b.y);
        let diagonal = (last - first + 1).max(0) as u64;

        triangle + diagonal
    }

    /// Number of cells within `b` that have to be covered.
    pub fn kept_in(&self, b: &Rect) -> u64 {
        b.intersect(&Rect::grid(self.wx, self.wy)).area() - self.dropped_in(b)
    }

    /// Shrinks `b` to the bounding box of its cells of weight at least the
    /// threshold. The result may still contain some of the partially dropped
    /// diagonal. Returns `None` if nothing in `b` has to be covered.
    pub fn shrink_box(&self, b: &Rect) -> Option<Rect> {
        let b = b.intersect(&Rect::grid(self.wx, self.wy));

        if b.is_empty() || self.kept_in(&b) == 0 {
            return None;
        }

        let k = self.threshold;
        let x = b.x.max(k - (b.end_y() - 1));
        let y = b.y.max(k - (b.end_x() - 1));

        Some(Rect::new(
            x,
            y,
            (b.end_x() - x) as u32,
            (b.end_y() - y) as u32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_dropped(range: &TruncationRange, b: &Rect) -> u64 {
        b.intersect(&Rect::grid(range.wx, range.wy))
            .cells()
            .filter(|&c| range.contains(c))
            .count() as u64
    }

    #[test]
    fn closed_form_matches_scan() {
        let range = TruncationRange::new(9, 7, 6);
        assert!(range.partial > 0);

        for x in -2..10 {
            for y in -2..8 {
                for (w, h) in [(1, 1), (3, 2), (4, 4), (9, 7), (2, 5)] {
                    let b = Rect::new(x, y, w, h);

                    assert_eq!(range.dropped_in(&b), brute_dropped(&range, &b), "{b}");
                }
            }
        }
    }

    #[test]
    fn shrunk_box_keeps_every_required_cell() {
        let range = TruncationRange::new(16, 16, 16);
        let b = Rect::new(2, 3, 8, 5);
        let shrunk = range.shrink_box(&b).unwrap();

        assert!(shrunk.w < b.w || shrunk.h < b.h);
        for c in b.cells().filter(|&c| !range.contains(c)) {
            assert!(shrunk.contains(c), "{c} dropped from {shrunk}");
        }

        assert_eq!(range.shrink_box(&Rect::new(0, 0, 2, 2)), None);
    }

    #[test]
    fn dropped_weight_within_budget() {
        for (wx, wy, w_out) in [(8, 8, 8), (12, 5, 9), (24, 17, 20)] {
            let range = TruncationRange::new(wx, wy, w_out);
            let dropped: f64 = Rect::grid(wx, wy)
                .cells()
                .filter(|&c| range.contains(c))
                .map(|c| 2f64.powi(c.weight()))
                .sum();

            assert!(dropped <= TruncationRange::error_budget(wx, wy, w_out));
            assert!(!range.is_empty());
        }
    }
}
