//! Device models.
//!
//! The tile catalog sizes itself from these figures: the LUT tile family is
//! derived from the [`Target::lut_consumption`] curve and the DSP family from
//! the native multiplier widths.

use strum_macros::{Display, EnumString, VariantNames};

pub trait Target {
    /// Number of inputs of a single LUT.
    fn lut_inputs(&self) -> u32;

    /// LUTs consumed per output bit of a boolean function of `inputs`
    /// variables.
    fn lut_consumption(&self, inputs: u32) -> f64;

    /// Widths `(x, y)` of the native DSP multiplier with both operands
    /// unsigned.
    fn dsp_widths(&self) -> (u32, u32);

    /// Extra bits the DSP multiplier absorbs in a dimension whose operand is
    /// signed.
    fn dsp_signed_delta(&self) -> u32 {
        1
    }

    /// The shift on the DSP cascade path, if partial products of two DSP
    /// blocks can be summed inside the DSP column.
    fn dsp_cascade_shift(&self) -> Option<u32>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    Virtex6,
    Kintex7,
    Ultrascale,
    Stratix5,
}

/// A concrete FPGA family.
#[derive(Clone, Debug)]
pub struct Device {
    pub kind: DeviceKind,
    pub lut_inputs: u32,
    /// Whether a LUT splits into two LUTs of one input less.
    pub fracturable: bool,
    pub dsp_widths: (u32, u32),
    pub cascade_shift: Option<u32>,
}

impl Device {
    pub fn new(kind: DeviceKind) -> Device {
        match kind {
            DeviceKind::Virtex6 | DeviceKind::Kintex7 => Device {
                kind,
                lut_inputs: 6,
                fracturable: true,
                dsp_widths: (24, 17),
                cascade_shift: Some(17),
            },
            DeviceKind::Ultrascale => Device {
                kind,
                lut_inputs: 6,
                fracturable: true,
                dsp_widths: (26, 17),
                cascade_shift: Some(17),
            },
            DeviceKind::Stratix5 => Device {
                kind,
                lut_inputs: 6,
                fracturable: true,
                dsp_widths: (26, 26),
                cascade_shift: None,
            },
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::new(DeviceKind::Virtex6)
    }
}

impl Target for Device {
    fn lut_inputs(&self) -> u32 {
        self.lut_inputs
    }

    /// # Examples
    ///
    /// ```
    /// # use intmul_tiling::target::{Device, DeviceKind, Target};
    /// #
    /// let device = Device::new(DeviceKind::Virtex6);
    ///
    /// assert_eq!(device.lut_consumption(5), 0.5);
    /// assert_eq!(device.lut_consumption(6), 1.0);
    /// assert_eq!(device.lut_consumption(8), 4.0);
    /// ```
    fn lut_consumption(&self, inputs: u32) -> f64 {
        if self.fracturable && inputs < self.lut_inputs {
            0.5
        } else if inputs <= self.lut_inputs {
            1.0
        } else {
            f64::from(1u32 << (inputs - self.lut_inputs).min(16))
        }
    }

    fn dsp_widths(&self) -> (u32, u32) {
        self.dsp_widths
    }

    fn dsp_cascade_shift(&self) -> Option<u32> {
        self.cascade_shift
    }
}
