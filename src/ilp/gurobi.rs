//! Gurobi backend.

use std::time::Duration;

use grb::prelude as gp;
use log::debug;

use super::{Model, Sense, Solver, SolverError, SolverSolution, Status};

pub struct Gurobi;

impl Solver for Gurobi {
    fn solve(
        &mut self,
        model: &Model,
        time_limit: Duration,
    ) -> Result<SolverSolution, SolverError> {
        solve(model, time_limit).map_err(|err| SolverError::Backend(err.to_string()))
    }
}

fn solve(model: &Model, time_limit: Duration) -> grb::Result<SolverSolution> {
    let env = gp::Env::new("")?;
    let mut m = gp::Model::with_env(model.name(), env)?;

    m.set_param(gp::param::LogToConsole, 0)?;
    m.set_param(gp::param::TimeLimit, time_limit.as_secs_f64())?;

    let vars = model
        .vars()
        .iter()
        .map(|v| {
            if v.is_binary() {
                grb::add_binvar!(m, name: &v.name)
            } else {
                grb::add_intvar!(m, name: &v.name, bounds: (v.lb as f64)..(v.ub as f64))
            }
        })
        .collect::<grb::Result<Vec<_>>>()?;

    let linear = |terms: &mut dyn Iterator<Item = (usize, f64)>| {
        terms.fold(gp::Expr::from(0.0), |expr, (idx, coef)| {
            expr + vars[idx] * coef
        })
    };

    for c in model.constraints() {
        let lhs = linear(&mut c.terms.iter().map(|&(v, coef)| (v.index(), coef)));

        let constr = match c.sense {
            Sense::Le => grb::c!(lhs <= c.rhs),
            Sense::Ge => grb::c!(lhs >= c.rhs),
            Sense::Eq => grb::c!(lhs == c.rhs),
        };

        m.add_constr(&c.name, constr)?;
    }

    let objective = linear(&mut model.vars().iter().map(|v| v.obj).enumerate());
    m.set_objective(objective, gp::ModelSense::Minimize)?;

    if let Some(start) = model.start() {
        for (var, value) in vars.iter().zip(start) {
            m.set_obj_attr(gp::attr::Start, var, value)?;
        }
    }

    m.optimize()?;

    let found = m.get_attr(gp::attr::SolCount)? > 0;
    let status = match m.status()? {
        gp::Status::Optimal => Status::Optimal,
        gp::Status::Infeasible | gp::Status::InfOrUnbd => Status::Infeasible,
        _ if found => Status::Feasible,
        _ => Status::TimeLimit,
    };

    debug!("gurobi finished `{}` with status {status}", model.name());

    if !found {
        return Ok(SolverSolution::without_solution(status));
    }

    let values = vars
        .iter()
        .map(|var| m.get_obj_attr(gp::attr::X, var))
        .collect::<grb::Result<Vec<_>>>()?;

    Ok(SolverSolution {
        status,
        objective: m.get_attr(gp::attr::ObjVal)?,
        values,
    })
}
