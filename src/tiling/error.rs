use std::error::Error;
use std::fmt;

use crate::geometry::Coord;
use crate::ilp::SolverError;

#[derive(Debug)]
pub enum TilingError {
    /// No tile of the catalog can cover the cell.
    NoTileFits { x: i32, y: i32 },
    /// Every tile of the catalog needs DSP blocks but none may be used.
    DspBudget,
    EmptyCatalog,
    /// A tile shape parameter outside the enumerated range.
    InvalidShape { kind: String, param: u32 },
    Infeasible,
    /// The compression model stayed infeasible up to the stage cap.
    StageLimit { limit: u32 },
    Solver(SolverError),
    InvalidSolution(String),
}

impl TilingError {
    pub(crate) fn no_tile_fits(at: Coord) -> TilingError {
        TilingError::NoTileFits { x: at.x, y: at.y }
    }
}

impl fmt::Display for TilingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TilingError::NoTileFits { x, y } => {
                write!(f, "no tile can cover cell ({x}, {y})")
            }
            TilingError::DspBudget => {
                write!(f, "the tile catalog requires DSP blocks but none are allowed")
            }
            TilingError::EmptyCatalog => write!(f, "the tile catalog is empty"),
            TilingError::InvalidShape { kind, param } => {
                write!(f, "no {kind} tile with parameter {param}")
            }
            TilingError::Infeasible => write!(f, "the tiling model is infeasible"),
            TilingError::StageLimit { limit } => {
                write!(f, "no compression found within {limit} stages")
            }
            TilingError::Solver(err) => err.fmt(f),
            TilingError::InvalidSolution(msg) => {
                write!(f, "invalid tiling: {msg}")
            }
        }
    }
}

impl Error for TilingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TilingError::Solver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SolverError> for TilingError {
    fn from(err: SolverError) -> Self {
        TilingError::Solver(err)
    }
}
