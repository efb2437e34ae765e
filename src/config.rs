//! Tiling configuration.

use std::time::Duration;

use strum_macros::{Display, EnumString, VariantNames};

/// The tiling strategy to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, VariantNames)]
pub enum TilingMethod {
    #[strum(serialize = "basic")]
    Basic,
    #[default]
    #[strum(serialize = "greedy")]
    Greedy,
    #[strum(serialize = "xgreedy")]
    XGreedy,
    #[strum(serialize = "beamsearch")]
    BeamSearch,
    #[strum(serialize = "optimal")]
    Optimal,
    #[strum(serialize = "optimalTilingAndCompression")]
    OptimalTilingAndCompression,
}

/// The MILP backend used by the ILP strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum SolverKind {
    /// The bundled branch-and-bound solver.
    #[default]
    Builtin,
    /// Gurobi, available with the `gurobi` feature.
    Gurobi,
}

/// Options shared by all strategies and by the tile catalog.
#[derive(Clone, Debug)]
pub struct TilingOptions {
    pub method: TilingMethod,
    /// Minimum useful fraction of a DSP tile's area for it to be placed.
    pub occupation_threshold: f64,
    pub max_dsp: u32,
    /// Number of neighbouring tile choices beam search explores per step.
    pub beam_range: usize,
    pub use_irregular: bool,
    pub use_2xk: bool,
    pub use_supertiles: bool,
    pub use_karatsuba: bool,
    pub solver: SolverKind,
    pub ilp_timeout: Duration,
    /// Seed the ILP strategies with a greedy solution.
    pub ilp_warm_start: bool,
    /// Cap on the compression stage count; derived from the bit heap when
    /// unset.
    pub max_stages: Option<u32>,
}

impl TilingOptions {
    /// Options for a pure LUT implementation.
    pub fn lut_only() -> TilingOptions {
        TilingOptions {
            max_dsp: 0,
            ..Default::default()
        }
    }
}

impl Default for TilingOptions {
    fn default() -> Self {
        TilingOptions {
            method: TilingMethod::default(),
            occupation_threshold: 0.0,
            max_dsp: u32::MAX,
            beam_range: 3,
            use_irregular: false,
            use_2xk: false,
            use_supertiles: false,
            use_karatsuba: false,
            solver: SolverKind::default(),
            ilp_timeout: Duration::from_secs(30),
            ilp_warm_start: true,
            max_stages: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn method_names() {
        assert_eq!(
            TilingMethod::from_str("beamsearch").unwrap(),
            TilingMethod::BeamSearch
        );
        assert_eq!(
            TilingMethod::OptimalTilingAndCompression.to_string(),
            "optimalTilingAndCompression"
        );
        assert!(TilingMethod::from_str("heuristic").is_err());
        assert_eq!(SolverKind::from_str("gurobi").unwrap(), SolverKind::Gurobi);
    }
}
