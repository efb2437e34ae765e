//! Catalogs shared by the strategy tests.

use super::TilingParams;
use crate::config::TilingOptions;
use crate::target::Device;
use crate::tiles::{TileCollection, TileKind};

/// 1×1 and 3×3 LUT tiles next to the default DSP block.
pub(crate) fn lut_catalog() -> TileCollection {
    let device = Device::default();

    TileCollection::from_kinds(vec![
        TileKind::lut(&device, 1, 1),
        TileKind::lut(&device, 3, 3),
        TileKind::dsp(&device, false),
    ])
}

/// A 17×24 DSP block with 1×1 LUTs for the leftovers.
pub(crate) fn exact_dsp_catalog() -> TileCollection {
    let device = Device {
        dsp_widths: (17, 24),
        ..Device::default()
    };

    TileCollection::from_kinds(vec![
        TileKind::dsp(&device, false),
        TileKind::lut(&device, 1, 1),
    ])
}

/// The full catalog of the default device.
pub(crate) fn device_catalog(
    params: &TilingParams,
    opts: &TilingOptions,
) -> TileCollection {
    TileCollection::new(&Device::default(), params.wx, params.wy, opts)
}
