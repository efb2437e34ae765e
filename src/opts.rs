use std::time::Duration;

use argh::FromArgs;
use log::LevelFilter;

use crate::config::{SolverKind, TilingMethod, TilingOptions};
use crate::target::{Device, DeviceKind};
use crate::tiles::TileCollection;
use crate::tiling::{TilingError, TilingParams};

/// Multiplier tiling optimizer.
#[derive(FromArgs)]
pub struct Opts {
    /// width of the first operand
    #[argh(positional)]
    pub wx: u32,

    /// width of the second operand
    #[argh(positional)]
    pub wy: u32,

    /// output width (default: full product)
    #[argh(option)]
    pub wout: Option<u32>,

    /// signed operands
    #[argh(switch)]
    pub signed: bool,

    /// tiling strategy
    #[argh(option, default = "Default::default()")]
    pub method: TilingMethod,

    /// target device
    #[argh(option, default = "DeviceKind::Virtex6")]
    pub device: DeviceKind,

    /// minimum fraction of a DSP block that must be used
    #[argh(option, default = "0.0")]
    pub threshold: f64,

    /// maximum number of DSP blocks (default: unlimited)
    #[argh(option)]
    pub max_dsp: Option<u32>,

    /// number of alternatives beam search explores per step
    #[argh(option, default = "3")]
    pub beam_range: usize,

    /// use irregular LUT tiles
    #[argh(switch)]
    pub irregular: bool,

    /// use 2xk carry-chain tiles
    #[argh(switch)]
    pub two_by_k: bool,

    /// fuse DSP pairs into supertiles
    #[argh(switch)]
    pub supertiles: bool,

    /// use Karatsuba DSP groups
    #[argh(switch)]
    pub karatsuba: bool,

    /// ILP solver backend
    #[argh(option, default = "Default::default()")]
    pub solver: SolverKind,

    /// ILP time limit in seconds
    #[argh(option, default = "30")]
    pub timeout: u64,

    /// comma-separated tile kinds replacing the device catalog, e.g.
    /// `DSP24x17,LUT3x3,LUT1x1`
    #[argh(option)]
    pub tiles: Option<String>,

    /// cap on compression stages
    #[argh(option)]
    pub max_stages: Option<u32>,

    /// logging level
    #[argh(option, long = "log", default = "LevelFilter::Warn")]
    pub log_level: LevelFilter,
}

impl Opts {
    /// Parse options from `env::args`.
    pub fn parse() -> Opts {
        argh::from_env()
    }

    pub fn params(&self) -> TilingParams {
        let params = TilingParams::new(self.wx, self.wy).signed(self.signed);

        match self.wout {
            Some(w_out) => params.with_w_out(w_out),
            None => params,
        }
    }

    pub fn device(&self) -> Device {
        Device::new(self.device)
    }

    /// The tile catalog: the `--tiles` list if given, else the full catalog
    /// of the device.
    pub fn collection(
        &self,
        device: &Device,
        params: &TilingParams,
        opts: &TilingOptions,
    ) -> Result<TileCollection, TilingError> {
        match &self.tiles {
            Some(list) => {
                let names: Vec<&str> = list.split(',').collect();

                TileCollection::from_names(device, params.wx, params.wy, &names)
            }
            None => Ok(TileCollection::new(device, params.wx, params.wy, opts)),
        }
    }

    pub fn tiling_options(&self) -> TilingOptions {
        let defaults = TilingOptions::default();

        TilingOptions {
            method: self.method,
            occupation_threshold: self.threshold,
            max_dsp: self.max_dsp.unwrap_or(defaults.max_dsp),
            beam_range: self.beam_range,
            use_irregular: self.irregular,
            use_2xk: self.two_by_k,
            use_supertiles: self.supertiles,
            use_karatsuba: self.karatsuba,
            solver: self.solver,
            ilp_timeout: Duration::from_secs(self.timeout),
            max_stages: self.max_stages,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Opts {
        Opts::from_args(&["intmul-tiling"], args).unwrap()
    }

    #[test]
    fn defaults() {
        let opts = parse(&["24", "17"]);

        assert_eq!(opts.params(), TilingParams::new(24, 17));

        let tiling = opts.tiling_options();
        assert_eq!(tiling.method, TilingMethod::Greedy);
        assert_eq!(tiling.max_dsp, u32::MAX);
        assert_eq!(tiling.ilp_timeout, Duration::from_secs(30));
    }

    #[test]
    fn flags_reach_options() {
        let opts = parse(&[
            "32", "32", "--wout", "32", "--signed", "--method", "beamsearch",
            "--device", "stratix5", "--max-dsp", "2", "--two-by-k", "--log",
            "debug",
        ]);

        let params = opts.params();
        assert!(params.is_truncated() && params.signed_io);
        assert_eq!(opts.device().dsp_widths, (26, 26));
        assert_eq!(opts.log_level, LevelFilter::Debug);

        let tiling = opts.tiling_options();
        assert!(opts.collection(&opts.device(), &params, &tiling).is_ok());
        assert_eq!(tiling.method, TilingMethod::BeamSearch);
        assert_eq!(tiling.max_dsp, 2);
        assert!(tiling.use_2xk && !tiling.use_irregular);
    }

    #[test]
    fn explicit_tile_list() {
        let opts = parse(&["8", "8", "--tiles", "LUT3x3,LUT1x1"]);
        let tiling = opts.tiling_options();

        let collection = opts
            .collection(&opts.device(), &opts.params(), &tiling)
            .unwrap();
        assert_eq!(collection.len(), 2);

        let bad = parse(&["8", "8", "--tiles", "LUT3x3,MUX4"]);
        assert!(matches!(
            bad.collection(&bad.device(), &bad.params(), &tiling),
            Err(TilingError::InvalidShape { .. })
        ));
    }
}
