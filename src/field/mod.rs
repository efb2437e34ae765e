//! The occupancy field.
//!
//! A [`Field`] records which grid cells placed tiles have claimed. Instead of
//! a boolean per cell it stores the id of the state that stamped the cell; a
//! [`FieldState`] regards a cell as covered when the stamp belongs to its
//! lineage. Branching a search then costs a fresh id rather than a copy of the
//! grid, and stamps of abandoned branches are simply ignored.
//!
//! Branches are explored one at a time. The field tracks the lineage of the
//! branch in use; deriving from or placing on a state retires every branch
//! below it, and a retired state must not be placed on again.

mod cursor;
mod truncation;

pub use cursor::CursorPolicy;
pub use truncation::TruncationRange;

use smallvec::{SmallVec, smallvec};

use crate::geometry::{Coord, Rect};
use crate::tiles::Parametrization;

/// One view of the field: the stamps it owns, the number of required cells
/// still uncovered, and its cursor.
#[derive(Clone, Debug)]
pub struct FieldState {
    lineage: SmallVec<[u32; 4]>,
    missing: u32,
    search_pos: usize,
    cursor: Coord,
}

impl FieldState {
    pub fn id(&self) -> u32 {
        self.lineage.last().copied().unwrap_or(0)
    }

    /// Number of required cells not yet covered.
    pub fn missing(&self) -> u32 {
        self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }

    /// The next uncovered required cell in the field's search order. Only
    /// meaningful while the state is incomplete.
    pub fn cursor(&self) -> Coord {
        self.cursor
    }
}

pub struct Field {
    wx: u32,
    wy: u32,
    stamps: Vec<u32>,
    dont_care: Vec<bool>,
    required: u32,
    next_id: u32,
    /// Lineage of the most recent branch; states off this path are stale.
    active: SmallVec<[u32; 8]>,
    order: Vec<Coord>,
}

impl Field {
    pub fn new(wx: u32, wy: u32, policy: CursorPolicy) -> Field {
        let len = (wx * wy) as usize;

        Field {
            wx,
            wy,
            stamps: vec![0; len],
            dont_care: vec![false; len],
            required: wx * wy,
            next_id: 1,
            active: SmallVec::new(),
            order: policy.order(wx, wy),
        }
    }

    pub fn width(&self) -> u32 {
        self.wx
    }

    pub fn height(&self) -> u32 {
        self.wy
    }

    /// Number of cells that have to be covered.
    pub fn required(&self) -> u32 {
        self.required
    }

    fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Starts over with nothing covered.
    pub fn reset(&mut self) -> FieldState {
        let mut state = FieldState {
            lineage: smallvec![self.fresh_id()],
            missing: self.required,
            search_pos: 0,
            cursor: Coord::ORIGIN,
        };

        self.active = SmallVec::from_slice(&state.lineage);
        self.advance(&mut state);
        state
    }

    /// Branches off `base`: the new state sees everything `base` covered, and
    /// whatever it places is invisible to `base`. Earlier branches of `base`
    /// are retired.
    pub fn derive(&mut self, base: &FieldState) -> FieldState {
        debug_assert!(self.is_live(base), "deriving from stale state {}", base.id());

        let mut state = base.clone();
        state.lineage.push(self.fresh_id());
        self.active = SmallVec::from_slice(&state.lineage);
        state
    }

    /// Whether `state` lies on the branch in use, so that its stamps and
    /// missing count agree.
    pub fn is_live(&self, state: &FieldState) -> bool {
        self.active.starts_with(&state.lineage)
    }

    /// Marks the cells of `range` as not required. `state` is updated to
    /// match; other states of this field become stale.
    pub fn set_truncated(&mut self, range: &TruncationRange, state: &mut FieldState) {
        for c in Rect::grid(self.wx, self.wy).cells() {
            let idx = self.index_unchecked(c);

            if range.contains(c) && !self.dont_care[idx] {
                self.dont_care[idx] = true;
                self.required -= 1;

                if !self.is_covered(c, state) {
                    state.missing -= 1;
                }
            }
        }

        self.advance(state);
    }

    fn index(&self, c: Coord) -> Option<usize> {
        Rect::grid(self.wx, self.wy)
            .contains(c)
            .then(|| self.index_unchecked(c))
    }

    fn index_unchecked(&self, c: Coord) -> usize {
        c.y as usize * self.wx as usize + c.x as usize
    }

    pub fn is_dont_care(&self, c: Coord) -> bool {
        self.index(c).is_some_and(|idx| self.dont_care[idx])
    }

    pub fn is_covered(&self, c: Coord, state: &FieldState) -> bool {
        self.index(c).is_some_and(|idx| {
            let stamp = self.stamps[idx];

            stamp != 0 && state.lineage.contains(&stamp)
        })
    }

    /// Whether `c` lies on the grid and is not covered.
    pub fn is_free(&self, c: Coord, state: &FieldState) -> bool {
        self.index(c).is_some() && !self.is_covered(c, state)
    }

    /// Counts the required cells a tile would newly cover, or returns 0 if
    /// any cell it contributes to is already covered. Cells off the grid are
    /// ignored; so are the bounding-box cells outside the tile's shape.
    pub fn check_tile_placement(
        &self,
        anchor: Coord,
        p: &Parametrization,
        state: &FieldState,
    ) -> u32 {
        let mut count = 0;

        for c in p.cells(anchor) {
            let Some(idx) = self.index(c) else {
                continue;
            };

            if self.is_covered(c, state) {
                return 0;
            }

            if !self.dont_care[idx] {
                count += 1;
            }
        }

        count
    }

    /// Number of free cells starting at `start` along `x`, up to `limit`.
    fn free_run_x(&self, start: Coord, limit: u32, state: &FieldState) -> u32 {
        (0..limit)
            .take_while(|&i| self.is_free(start.offset(i as i32, 0), state))
            .count() as u32
    }

    fn free_run_y(&self, start: Coord, limit: u32, state: &FieldState) -> u32 {
        (0..limit)
            .take_while(|&i| self.is_free(start.offset(0, i as i32), state))
            .count() as u32
    }

    /// Fits a DSP tile at `anchor` by shrinking it to the free rectangle
    /// there, then expands it over the operand sign bits where possible.
    /// Returns `None` if no free rectangle of positive area remains.
    pub fn check_dsp_placement(
        &self,
        anchor: Coord,
        p: &Parametrization,
        state: &FieldState,
        signed_io: bool,
    ) -> Option<Parametrization> {
        let w = self.free_run_x(anchor, p.wx(), state);

        if w == 0 {
            return None;
        }

        let h = (0..p.wy())
            .take_while(|&j| {
                self.free_run_x(anchor.offset(0, j as i32), w, state) == w
            })
            .count() as u32;

        let clipped = p.kind().parametrize(w, h, false, false)?;
        let expanded = clipped.try_dsp_expand(anchor, self.wx, self.wy, signed_io);

        if expanded != clipped && self.check_tile_placement(anchor, &expanded, state) > 0 {
            Some(expanded)
        } else {
            Some(clipped)
        }
    }

    /// Stamps the uncovered cells of a tile with the id of `state` and moves
    /// its cursor on. Returns the new cursor.
    pub fn place_tile_in_field(
        &mut self,
        anchor: Coord,
        p: &Parametrization,
        state: &mut FieldState,
    ) -> Coord {
        debug_assert!(self.is_live(state), "placing on stale state {}", state.id());

        let id = state.id();
        self.active.truncate(state.lineage.len());

        for c in p.cells(anchor) {
            let Some(idx) = self.index(c) else {
                continue;
            };

            if self.is_covered(c, state) {
                continue;
            }

            self.stamps[idx] = id;

            if !self.dont_care[idx] {
                state.missing -= 1;
            }
        }

        self.advance(state);
        state.cursor
    }

    /// Length of the free run from the cursor along `x`.
    pub fn needed_x(&self, state: &FieldState) -> u32 {
        self.free_run_x(state.cursor, self.wx, state)
    }

    /// Length of the free run from the cursor along `y`.
    pub fn needed_y(&self, state: &FieldState) -> u32 {
        self.free_run_y(state.cursor, self.wy, state)
    }

    fn advance(&self, state: &mut FieldState) {
        if state.missing == 0 {
            return;
        }

        while let Some(&c) = self.order.get(state.search_pos) {
            let idx = self.index_unchecked(c);

            if !self.dont_care[idx] && !self.is_covered(c, state) {
                state.cursor = c;
                return;
            }

            state.search_pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Device;
    use crate::tiles::TileKind;

    #[test]
    fn line_cursor_scans_rows() {
        let device = Device::default();
        let mut field = Field::new(4, 3, CursorPolicy::Line);
        let mut state = field.reset();

        assert_eq!(state.cursor(), Coord::new(0, 0));
        assert_eq!(state.missing(), 12);

        let tile = TileKind::lut(&device, 3, 2).full();
        assert_eq!(field.check_tile_placement(Coord::new(0, 0), &tile, &state), 6);

        let next = field.place_tile_in_field(Coord::new(0, 0), &tile, &mut state);
        assert_eq!(next, Coord::new(3, 0));
        assert_eq!(state.missing(), 6);
        assert_eq!(field.needed_x(&state), 1);
        assert_eq!(field.needed_y(&state), 3);

        // Overlapping an earlier tile is a collision.
        assert_eq!(field.check_tile_placement(Coord::new(2, 1), &tile, &state), 0);
    }

    #[test]
    fn branches_are_isolated() {
        let device = Device::default();
        let unit = TileKind::lut(&device, 1, 1).full();
        let mut field = Field::new(3, 3, CursorPolicy::NearestPoint);
        let mut base = field.reset();

        field.place_tile_in_field(Coord::new(0, 0), &unit, &mut base);

        let mut left = field.derive(&base);
        field.place_tile_in_field(Coord::new(1, 0), &unit, &mut left);

        assert!(field.is_covered(Coord::new(1, 0), &left));
        assert!(!field.is_covered(Coord::new(1, 0), &base));
        assert_eq!(left.missing(), 7);
        assert_eq!(left.cursor(), Coord::new(0, 1));

        let mut right = field.derive(&base);

        assert!(!field.is_live(&left));
        assert!(field.is_live(&base));
        assert!(!field.is_covered(Coord::new(1, 0), &right));
        assert!(field.is_covered(Coord::new(0, 0), &right));
        assert_eq!(right.missing(), 8);
        assert_eq!(right.cursor(), Coord::new(1, 0));

        // The second sibling takes over the first one's cell.
        field.place_tile_in_field(Coord::new(1, 0), &unit, &mut right);
        field.place_tile_in_field(Coord::new(0, 1), &unit, &mut right);

        assert!(field.is_covered(Coord::new(1, 0), &right));
        assert!(!field.is_covered(Coord::new(1, 0), &left));
        assert_eq!(right.missing(), 6);

        // The base outlives both and placing on it retires them.
        field.place_tile_in_field(Coord::new(1, 0), &unit, &mut base);

        assert!(!field.is_live(&right));
        assert!(!field.is_covered(Coord::new(0, 1), &base));
        assert_eq!(base.missing(), 7);
        assert_eq!(base.cursor(), Coord::new(0, 1));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "stale state")]
    fn retired_sibling_rejects_placements() {
        let unit = TileKind::lut(&Device::default(), 1, 1).full();
        let mut field = Field::new(3, 3, CursorPolicy::NearestPoint);
        let base = field.reset();

        let mut left = field.derive(&base);
        let _right = field.derive(&base);

        field.place_tile_in_field(Coord::new(1, 0), &unit, &mut left);
    }

    #[test]
    fn irregular_shapes_ignore_their_empty_cells() {
        use crate::tiles::TileShape;
        use crate::tiles::shapes::IrregularShape;

        let device = Device::default();
        let unit = TileKind::lut(&device, 1, 1).full();
        let shape = IrregularShape::new(0).unwrap();
        let irregular = TileKind::new(
            TileShape::IrregularLut(shape),
            crate::tiles::CostModel::from_target(&device),
        )
        .full();

        assert!(!irregular.shape_valid(2, 2));

        let mut field = Field::new(4, 4, CursorPolicy::Line);
        let mut state = field.reset();

        // A covered cell under the shape's empty corner is no collision.
        field.place_tile_in_field(Coord::new(2, 2), &unit, &mut state);
        assert_eq!(field.check_tile_placement(Coord::ORIGIN, &irregular, &state), 8);

        field.place_tile_in_field(Coord::ORIGIN, &irregular, &mut state);
        assert_eq!(state.missing(), 16 - 9);
        assert!(field.is_covered(Coord::new(1, 2), &state));

        // One covered cell of the shape itself is.
        let mut other = field.reset();
        field.place_tile_in_field(Coord::new(1, 2), &unit, &mut other);
        assert_eq!(field.check_tile_placement(Coord::ORIGIN, &irregular, &other), 0);
    }

    #[test]
    fn dsp_shrinks_to_free_rectangle() {
        let device = Device::default();
        let dsp = TileKind::dsp(&device, false).full();
        let unit = TileKind::lut(&device, 1, 1).full();

        let mut field = Field::new(30, 10, CursorPolicy::Line);
        let mut state = field.reset();
        field.place_tile_in_field(Coord::new(5, 0), &unit, &mut state);

        let fitted = field
            .check_dsp_placement(Coord::new(0, 0), &dsp, &state, false)
            .unwrap();
        assert_eq!((fitted.wx(), fitted.wy()), (5, 10));

        let signed = field
            .check_dsp_placement(Coord::new(6, 0), &dsp, &state, true)
            .unwrap();
        assert_eq!((signed.wx(), signed.wy()), (24, 10));
        assert!(signed.is_signed_x() && signed.is_signed_y());

        assert!(field.check_dsp_placement(Coord::new(5, 0), &dsp, &state, false).is_none());
    }

    #[test]
    fn truncated_cells_are_not_required() {
        let mut field = Field::new(8, 8, CursorPolicy::Line);
        let mut state = field.reset();
        let range = TruncationRange::new(8, 8, 8);

        field.set_truncated(&range, &mut state);

        assert_eq!(state.missing(), 64 - 18);
        assert_eq!(field.required(), 64 - 18);
        assert!(field.is_dont_care(Coord::new(0, 0)));
        assert_eq!(state.cursor(), Coord::new(5, 0));

        // A tile entirely in the dropped band covers nothing required.
        let unit = TileKind::lut(&Device::default(), 1, 1).full();
        assert_eq!(field.check_tile_placement(Coord::new(1, 1), &unit, &state), 0);
    }
}
