use std::process::ExitCode;

use log::debug;

use intmul_tiling::bitheap::BitHeapShape;
use intmul_tiling::opts::Opts;
use intmul_tiling::tiles::OperatorManager;
use intmul_tiling::tiling;

fn main() -> ExitCode {
    let opts = Opts::parse();

    env_logger::Builder::new()
        .filter_level(opts.log_level)
        .init();

    let params = opts.params();
    let device = opts.device();
    let tiling_opts = opts.tiling_options();

    let solution = match opts
        .collection(&device, &params, &tiling_opts)
        .and_then(|collection| tiling::solve_with(&params, &collection, &tiling_opts))
    {
        Ok(solution) => solution,
        Err(err) => {
            eprintln!("error: {err}");

            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = solution.verify(&params, tiling_opts.max_dsp) {
        eprintln!("error: {err}");

        return ExitCode::FAILURE;
    }

    let mut operators = OperatorManager::new();
    for tile in &solution {
        operators.get(&tile.param);
    }

    let operators = operators.into_operators();
    for op in &operators {
        debug!(
            "operator {}: {}x{} signed {:?}, {} DSPs, {:.2} LUTs, {} terms",
            op.name,
            op.input_widths.0,
            op.input_widths.1,
            op.signed,
            op.dsp_blocks,
            op.luts,
            op.terms.len()
        );
    }

    let heap = BitHeapShape::from_solution(&solution, &params);

    println!("{}", tiling::format_solution(&solution, &params));
    println!(
        "{} tiles, {} DSPs, {:.2} LUTs, {} operators, bit heap {} columns of height <= {}",
        solution.len(),
        solution.dsp_count(),
        solution.lut_cost(&params),
        operators.len(),
        heap.width(),
        heap.max_height()
    );

    ExitCode::SUCCESS
}
