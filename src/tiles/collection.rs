//! The tile catalog of a multiplier.

use std::cmp::Ordering;

use itertools::Itertools;
use log::debug;

use super::cost::CostModel;
use super::kind::{TileKind, TileShape};
use super::shapes::{IrregularShape, KaratsubaShape, SuperTileShape};
use crate::config::TilingOptions;
use crate::target::Target;
use crate::tiling::TilingError;

/// Every tile kind available to a tiling strategy.
///
/// Kinds are addressed by their position in [`TileCollection::base`], which
/// is also the order in which greedy strategies try them. Auxiliary families
/// (supertiles, Karatsuba groups) are kept in their own lists as well so that
/// the passes building them can find them without a scan.
#[derive(Clone, Debug)]
pub struct TileCollection {
    base: Vec<TileKind>,
    variable: Vec<usize>,
    super_tiles: Vec<usize>,
    karatsuba: Vec<usize>,
}

impl TileCollection {
    /// Builds the catalog for a `wx × wy` multiplier on `target`.
    pub fn new<T: Target + ?Sized>(
        target: &T,
        wx: u32,
        wy: u32,
        opts: &TilingOptions,
    ) -> TileCollection {
        let cost = CostModel::from_target(target);
        let mut kinds = Vec::new();

        if opts.max_dsp > 0 {
            let (dx, dy) = target.dsp_widths();

            kinds.push(TileKind::dsp(target, false));
            if dx != dy {
                kinds.push(TileKind::dsp(target, true));
            }
        }

        kinds.extend(lut_family(target).map(|(a, b)| TileKind::lut(target, a, b)));

        if opts.use_2xk {
            for vertical in [false, true] {
                let max_k = if vertical { wy } else { wx };

                if max_k >= 2 {
                    kinds.push(TileKind::new(
                        TileShape::Variable2xK { max_k, vertical },
                        cost,
                    ));
                }
            }
        }

        if opts.use_irregular {
            kinds.extend(IrregularShape::all().map(|shape| {
                TileKind::new(TileShape::IrregularLut(shape), cost)
            }));
        }

        if opts.use_supertiles && opts.max_dsp >= 2 {
            if let Some(shift) = target.dsp_cascade_shift() {
                kinds.extend(
                    SuperTileShape::enumerate(target.dsp_widths(), shift)
                        .into_iter()
                        .map(|shape| {
                            TileKind::new(TileShape::DspSuperTile(shape), cost)
                        }),
                );
            }
        }

        if opts.use_karatsuba && opts.max_dsp >= 3 {
            let dsp = target.dsp_widths();

            for order in 1.. {
                let shape = KaratsubaShape::new(order, dsp);

                if shape.width() > wx
                    || shape.height() > wy
                    || shape.dsp_count() > opts.max_dsp
                {
                    break;
                }

                kinds.push(TileKind::new(TileShape::DspKaratsuba(shape), cost));
            }
        }

        let collection = TileCollection::from_kinds(kinds);

        debug!(
            "tile catalog for {wx}x{wy}: {}",
            collection.base.iter().map(TileKind::name).join(", ")
        );

        collection
    }

    /// Builds a catalog from explicit kinds, ordered by tiling priority.
    pub fn from_kinds(kinds: Vec<TileKind>) -> TileCollection {
        let mut base = kinds;
        base.sort_by(priority);

        let positions = |pred: fn(&TileKind) -> bool| {
            base.iter().positions(pred).collect_vec()
        };

        TileCollection {
            variable: positions(TileKind::is_variable),
            super_tiles: positions(TileKind::is_super_tile),
            karatsuba: positions(TileKind::is_karatsuba),
            base,
        }
    }

    /// Builds a catalog from kind names as printed by [`TileKind::name`].
    /// A DSP name selects the target's block in the orientation given by the
    /// widths.
    pub fn from_names<T, S>(
        target: &T,
        wx: u32,
        wy: u32,
        names: &[S],
    ) -> Result<TileCollection, TilingError>
    where
        T: Target + ?Sized,
        S: AsRef<str>,
    {
        let kinds = names
            .iter()
            .map(|name| parse_kind(target, wx, wy, name.as_ref().trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TileCollection::from_kinds(kinds))
    }

    pub fn base(&self) -> &[TileKind] {
        &self.base
    }

    pub fn get(&self, idx: usize) -> Option<&TileKind> {
        self.base.get(idx)
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn variable(&self) -> &[usize] {
        &self.variable
    }

    pub fn super_tiles(&self) -> &[usize] {
        &self.super_tiles
    }

    pub fn karatsuba(&self) -> &[usize] {
        &self.karatsuba
    }

    /// Positions of the single DSP kinds.
    pub fn dsp(&self) -> impl Iterator<Item = usize> + '_ {
        self.base.iter().positions(TileKind::is_dsp)
    }

    /// Position of the kind placed by [`TileCollection::new`] as a 1×1 LUT.
    pub fn unit(&self) -> Option<usize> {
        self.base.iter().position(|kind| {
            matches!(kind.shape(), TileShape::Lut { wx: 1, wy: 1 })
        })
    }

    /// The largest DSP kind or, without DSPs, the most efficient tile.
    pub fn preferred(&self) -> Option<usize> {
        self.dsp().next().or_else(|| {
            self.base
                .iter()
                .position(|kind| kind.is_rectangular() && !kind.is_variable())
        })
    }
}

fn parse_kind<T: Target + ?Sized>(
    target: &T,
    wx: u32,
    wy: u32,
    name: &str,
) -> Result<TileKind, TilingError> {
    let cost = CostModel::from_target(target);

    let invalid = |kind: &str, param: u32| TilingError::InvalidShape {
        kind: kind.to_string(),
        param,
    };

    let dims = |s: &str| -> Option<(u32, u32)> {
        let (a, b) = s.split_once('x')?;
        Some((a.parse().ok()?, b.parse().ok()?))
    };

    let number = |kind: &str, s: &str| s.parse::<u32>().map_err(|_| invalid(kind, 0));

    if let Some(rest) = name.strip_prefix("DSPSuperTile") {
        let id = number("DSPSuperTile", rest)?;
        let shift = target.dsp_cascade_shift().ok_or_else(|| invalid("DSPSuperTile", id))?;

        return SuperTileShape::enumerate(target.dsp_widths(), shift)
            .into_iter()
            .find(|shape| u32::from(shape.id) == id)
            .map(|shape| TileKind::new(TileShape::DspSuperTile(shape), cost))
            .ok_or_else(|| invalid("DSPSuperTile", id));
    }

    if let Some(rest) = name.strip_prefix("DSPKaratsuba") {
        let order = number("DSPKaratsuba", rest)?;

        if order == 0 {
            return Err(invalid("DSPKaratsuba", order));
        }

        let shape = KaratsubaShape::new(order, target.dsp_widths());
        return Ok(TileKind::new(TileShape::DspKaratsuba(shape), cost));
    }

    if let Some(rest) = name.strip_prefix("DSP") {
        let native = target.dsp_widths();

        return match dims(rest) {
            Some(d) if d == native => Ok(TileKind::dsp(target, false)),
            Some(d) if d == (native.1, native.0) => Ok(TileKind::dsp(target, true)),
            _ => Err(invalid("DSP", 0)),
        };
    }

    if let Some(rest) = name.strip_prefix("IrregularLUT") {
        let mut letters = rest.bytes();

        return match (letters.next(), letters.next()) {
            (Some(letter @ b'A'..=b'Z'), None) => IrregularShape::new(letter - b'A')
                .map(|shape| TileKind::new(TileShape::IrregularLut(shape), cost))
                .ok_or_else(|| invalid("IrregularLUT", u32::from(letter - b'A'))),
            _ => Err(invalid("IrregularLUT", 0)),
        };
    }

    if let Some(rest) = name.strip_prefix("LUT") {
        return match dims(rest) {
            Some((a, b)) if a > 0 && b > 0 => Ok(TileKind::lut(target, a, b)),
            _ => Err(invalid("LUT", 0)),
        };
    }

    match name {
        "Xilinxkx2" => Ok(TileKind::new(
            TileShape::Variable2xK { max_k: wx, vertical: false },
            cost,
        )),
        "Xilinx2xk" => Ok(TileKind::new(
            TileShape::Variable2xK { max_k: wy, vertical: true },
            cost,
        )),
        _ => Err(invalid(name, 0)),
    }
}

/// LUT multiplier sizes worth offering on `target`: every split of the LUT
/// inputs between the operands with at least two bits each, plus the 1×1
/// tile that can fill any leftover cell.
fn lut_family<T: Target + ?Sized>(
    target: &T,
) -> impl Iterator<Item = (u32, u32)> {
    let n = target.lut_inputs();

    let splits = (2..n).flat_map(move |a| (2..=n - a).map(move |b| (a, b)));

    std::iter::once((1, 1)).chain(splits)
}

/// DSP families first in descending area, then 2×k tiles, then LUT tiles in
/// descending efficiency, then Karatsuba groups. The sort is stable within a
/// class.
fn priority(a: &TileKind, b: &TileKind) -> Ordering {
    let class = |kind: &TileKind| {
        if kind.is_karatsuba() {
            3
        } else if kind.dsp_cost() > 0 {
            0
        } else if kind.is_variable() {
            1
        } else {
            2
        }
    };

    class(a).cmp(&class(b)).then_with(|| match class(a) {
        0 => b.area().cmp(&a.area()),
        2 => b.efficiency().total_cmp(&a.efficiency()),
        _ => Ordering::Equal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Device, DeviceKind};

    #[test]
    fn dsp_kinds_first_by_area() {
        let opts = TilingOptions {
            use_supertiles: true,
            use_irregular: true,
            use_2xk: true,
            ..Default::default()
        };
        let catalog = TileCollection::new(&Device::default(), 64, 64, &opts);

        let dsp_areas = catalog
            .base()
            .iter()
            .take_while(|k| k.dsp_cost() > 0)
            .map(TileKind::area)
            .collect_vec();

        assert!(!dsp_areas.is_empty());
        assert!(dsp_areas.windows(2).all(|w| w[0] >= w[1]));
        assert!(catalog.base()[0].is_super_tile());

        let luts = &catalog.base()[dsp_areas.len() + catalog.variable().len()..];
        assert!(luts.iter().all(|k| k.dsp_cost() == 0));
        assert!(luts
            .windows(2)
            .all(|w| w[0].efficiency() >= w[1].efficiency()));
    }

    #[test]
    fn lut_only_catalog() {
        let catalog = TileCollection::new(
            &Device::new(DeviceKind::Stratix5),
            8,
            8,
            &TilingOptions::lut_only(),
        );

        assert!(catalog.dsp().next().is_none());
        assert!(catalog.unit().is_some());
        assert!(catalog.base().iter().all(|k| k.dsp_cost() == 0));
        assert!(catalog
            .base()
            .iter()
            .any(|k| matches!(k.shape(), TileShape::Lut { wx: 3, wy: 3 })));
    }

    #[test]
    fn karatsuba_sized_to_grid() {
        let opts = TilingOptions {
            use_karatsuba: true,
            ..Default::default()
        };
        let catalog = TileCollection::new(&Device::default(), 64, 72, &opts);

        assert_eq!(catalog.karatsuba().len(), 1);
        assert_eq!(*catalog.karatsuba().last().unwrap(), catalog.len() - 1);

        let small = TileCollection::new(&Device::default(), 63, 72, &opts);
        assert!(small.karatsuba().is_empty());
    }

    #[test]
    fn catalog_from_names() {
        let device = Device::default();
        let catalog = TileCollection::from_names(
            &device,
            32,
            32,
            &["LUT3x3", "DSP17x24", "IrregularLUTC", "Xilinx2xk"],
        )
        .unwrap();

        let names = catalog.base().iter().map(TileKind::name).collect_vec();
        assert_eq!(names[..2], ["DSP17x24", "Xilinx2xk"]);
        assert!(names[2..].contains(&"LUT3x3".to_string()));
        assert!(names[2..].contains(&"IrregularLUTC".to_string()));
        assert!(catalog.base()[0].shape() == &TileShape::Dsp {
            wx: 17,
            wy: 24,
            flipped: true,
            signed_delta: 1,
        });
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        let device = Device::default();

        for (name, kind, param) in [
            ("IrregularLUTZ", "IrregularLUT", 25),
            ("DSPKaratsuba0", "DSPKaratsuba", 0),
            ("DSPSuperTile99", "DSPSuperTile", 99),
            ("DSP20x20", "DSP", 0),
        ] {
            match TileCollection::from_names(&device, 16, 16, &[name]) {
                Err(TilingError::InvalidShape { kind: k, param: p }) => {
                    assert_eq!((k.as_str(), p), (kind, param), "{name}");
                }
                other => panic!("{name}: {other:?}"),
            }
        }
    }
}
