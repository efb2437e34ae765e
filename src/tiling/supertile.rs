//! Fusing DSP pairs into supertiles.

use log::debug;

use super::{PlacedTile, TilingParams};
use crate::tiles::{TileCollection, TileShape};

/// Whether a placed DSP can take part in a supertile: full size, unsigned.
fn mergeable(tile: &PlacedTile) -> bool {
    let p = &tile.param;
    let kind = p.kind();

    kind.is_dsp()
        && !p.is_signed_x()
        && !p.is_signed_y()
        && p.wx() == kind.max_width()
        && p.wy() == kind.max_height()
}

/// Replaces pairs of `deferred` DSP placements by supertiles of the catalog
/// wherever the pair matches a supertile shape and the fused tile is
/// cheaper. Fused tiles come first, followed by the remaining singles in
/// their original order.
pub(super) fn merge(
    collection: &TileCollection,
    deferred: &[PlacedTile],
    params: &TilingParams,
) -> Vec<PlacedTile> {
    let kinds: Vec<_> = collection
        .super_tiles()
        .iter()
        .filter_map(|&idx| collection.get(idx))
        .filter_map(|kind| match kind.shape() {
            TileShape::DspSuperTile(shape) => Some((kind, *shape)),
            _ => None,
        })
        .collect();

    let mut used = vec![false; deferred.len()];
    let mut merged = Vec::new();

    for i in 0..deferred.len() {
        if used[i] || !mergeable(&deferred[i]) {
            continue;
        }

        let a = &deferred[i];

        for j in i + 1..deferred.len() {
            let b = &deferred[j];

            if used[j] || !mergeable(b) {
                continue;
            }

            let separate = a.lut_cost(params) + b.lut_cost(params);

            let fused = kinds.iter().find_map(|(kind, shape)| {
                let anchor = shape.matches(&a.bounding_box(), &b.bounding_box())?;
                let tile = PlacedTile::new(kind.full(), anchor);

                (tile.lut_cost(params) < separate).then_some(tile)
            });

            if let Some(tile) = fused {
                debug!("fused {a} and {b} into {tile}");

                used[i] = true;
                used[j] = true;
                merged.push(tile);
                break;
            }
        }
    }

    merged.extend(
        deferred
            .iter()
            .zip(&used)
            .filter(|(_, &used)| !used)
            .map(|(tile, _)| tile.clone()),
    );

    merged
}
