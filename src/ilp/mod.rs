//! Integer linear programming.
//!
//! The ILP tiling strategies build a [`Model`] and hand it to a [`Solver`].
//! Two backends exist: the bundled exact [`BranchAndBound`] search, suited to
//! small multipliers, and Gurobi with the `gurobi` feature.

mod bnb;
#[cfg(feature = "gurobi")]
mod gurobi;
mod model;

use std::error::Error;
use std::fmt;
use std::time::Duration;

pub use bnb::BranchAndBound;
#[cfg(feature = "gurobi")]
pub use gurobi::Gurobi;
pub use model::{Constraint, LinExpr, Model, Sense, Var, VarInfo};

use crate::config::SolverKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Proven optimal.
    Optimal,
    /// A solution was found but the time limit stopped the proof.
    Feasible,
    /// Proven infeasible.
    Infeasible,
    /// The time limit expired before any solution was found.
    TimeLimit,
}

impl Status {
    pub fn has_solution(self) -> bool {
        matches!(self, Status::Optimal | Status::Feasible)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Status::Optimal => "optimal",
            Status::Feasible => "feasible",
            Status::Infeasible => "infeasible",
            Status::TimeLimit => "time limit",
        })
    }
}

#[derive(Clone, Debug)]
pub struct SolverSolution {
    pub status: Status,
    pub objective: f64,
    pub values: Vec<f64>,
}

impl SolverSolution {
    pub fn without_solution(status: Status) -> SolverSolution {
        SolverSolution {
            status,
            objective: f64::INFINITY,
            values: Vec::new(),
        }
    }

    pub fn value(&self, var: Var) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }

    /// Whether a binary variable is set.
    pub fn is_set(&self, var: Var) -> bool {
        self.value(var) > 0.5
    }
}

pub trait Solver {
    fn solve(
        &mut self,
        model: &Model,
        time_limit: Duration,
    ) -> Result<SolverSolution, SolverError>;
}

#[derive(Debug)]
pub enum SolverError {
    Unsupported(&'static str),
    Backend(String),
    Unavailable(SolverKind),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SolverError::Unsupported(what) => {
                write!(f, "unsupported model: {what}")
            }
            SolverError::Backend(msg) => write!(f, "solver failed: {msg}"),
            SolverError::Unavailable(kind) => {
                write!(f, "solver `{kind}` is not available in this build")
            }
        }
    }
}

impl Error for SolverError {}

/// Instantiates the solver backend of the given kind.
pub fn solver(kind: SolverKind) -> Result<Box<dyn Solver>, SolverError> {
    match kind {
        SolverKind::Builtin => Ok(Box::new(BranchAndBound::new())),
        #[cfg(feature = "gurobi")]
        SolverKind::Gurobi => Ok(Box::new(Gurobi)),
        #[cfg(not(feature = "gurobi"))]
        SolverKind::Gurobi => Err(SolverError::Unavailable(kind)),
    }
}
