//! A depth-first branch-and-bound solver.
//!
//! Bounds are tightened by constraint propagation with an undo trail, so a
//! node costs no more than the bound changes it makes. Partition rows (unit
//! coefficients, equal to one, over binaries) are branched on as a whole,
//! fixing one member to one per child; the lower bound spreads each free
//! member's cost over the open partition rows it would close.

use std::time::{Duration, Instant};

use itertools::Itertools;
use log::debug;

use super::{Model, Sense, Solver, SolverError, SolverSolution, Status};

const EPS: f64 = 1e-9;

/// How often, in nodes, the deadline is checked.
const CLOCK_INTERVAL: u64 = 256;

#[derive(Default)]
pub struct BranchAndBound;

impl BranchAndBound {
    pub fn new() -> BranchAndBound {
        BranchAndBound
    }
}

impl Solver for BranchAndBound {
    fn solve(
        &mut self,
        model: &Model,
        time_limit: Duration,
    ) -> Result<SolverSolution, SolverError> {
        if model.vars().iter().any(|v| v.lb > v.ub) {
            return Ok(SolverSolution::without_solution(Status::Infeasible));
        }

        if model.vars().iter().any(|v| v.obj < 0.0) {
            return Err(SolverError::Unsupported("negative objective coefficient"));
        }

        let start = Instant::now();
        let mut search = Search::new(model, start + time_limit);

        if let Some(values) = model.start().filter(|v| model.is_feasible(v)) {
            debug!("warm start with objective {}", model.objective(&values));
            search.best = Some((model.objective(&values), values));
        }

        let all = (0..model.constraints().len()).collect_vec();

        if search.propagate(all) {
            search.dfs();
        }

        debug!(
            "branch and bound on `{}`: {} nodes in {:?}",
            model.name(),
            search.nodes,
            start.elapsed()
        );

        let status = match (&search.best, search.timed_out) {
            (Some(_), false) => Status::Optimal,
            (Some(_), true) => Status::Feasible,
            (None, false) => Status::Infeasible,
            (None, true) => Status::TimeLimit,
        };

        Ok(match search.best {
            Some((objective, values)) => SolverSolution {
                status,
                objective,
                values,
            },
            None => SolverSolution::without_solution(status),
        })
    }
}

enum Branch {
    /// Set one of the free members of a partition row.
    Row(Vec<usize>),
    /// Enumerate the values of a variable.
    Var(usize),
}

struct Search<'m> {
    model: &'m Model,
    lb: Vec<i64>,
    ub: Vec<i64>,
    trail: Vec<(usize, i64, i64)>,
    /// Constraints each variable occurs in.
    occurs: Vec<Vec<usize>>,
    partitions: Vec<usize>,
    deadline: Instant,
    best: Option<(f64, Vec<f64>)>,
    timed_out: bool,
    nodes: u64,
}

impl<'m> Search<'m> {
    fn new(model: &'m Model, deadline: Instant) -> Search<'m> {
        let mut occurs = vec![Vec::new(); model.vars().len()];

        for (ci, c) in model.constraints().iter().enumerate() {
            for &(var, _) in &c.terms {
                occurs[var.index()].push(ci);
            }
        }

        let partitions = model
            .constraints()
            .iter()
            .positions(|c| {
                c.sense == Sense::Eq
                    && c.rhs == 1.0
                    && c.terms.iter().all(|&(var, coef)| {
                        coef == 1.0 && model.var(var).is_binary()
                    })
            })
            .collect();

        Search {
            model,
            lb: model.vars().iter().map(|v| v.lb).collect(),
            ub: model.vars().iter().map(|v| v.ub).collect(),
            trail: Vec::new(),
            occurs,
            partitions,
            deadline,
            best: None,
            timed_out: false,
            nodes: 0,
        }
    }

    fn set_bounds(&mut self, var: usize, lb: i64, ub: i64) {
        self.trail.push((var, self.lb[var], self.ub[var]));
        self.lb[var] = lb;
        self.ub[var] = ub;
    }

    fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some((var, lb, ub)) = self.trail.pop() {
                self.lb[var] = lb;
                self.ub[var] = ub;
            }
        }
    }

    /// Fixes `var` to `value` and propagates. Returns `false` on conflict.
    fn fix(&mut self, var: usize, value: i64) -> bool {
        if value < self.lb[var] || value > self.ub[var] {
            return false;
        }

        self.set_bounds(var, value, value);
        self.propagate(self.occurs[var].clone())
    }

    /// Tightens bounds until no constraint in the closure of `queue` changes
    /// them. Returns `false` if some constraint cannot be satisfied.
    fn propagate(&mut self, mut queue: Vec<usize>) -> bool {
        let mut queued = vec![false; self.model.constraints().len()];

        for &ci in &queue {
            queued[ci] = true;
        }

        while let Some(ci) = queue.pop() {
            queued[ci] = false;

            let sides: &[f64] = match self.model.constraints()[ci].sense {
                Sense::Le => &[1.0],
                Sense::Ge => &[-1.0],
                Sense::Eq => &[1.0, -1.0],
            };

            for &sign in sides {
                match self.tighten(ci, sign) {
                    None => return false,
                    Some(changed) => {
                        for var in changed {
                            for &other in &self.occurs[var] {
                                if !queued[other] {
                                    queued[other] = true;
                                    queue.push(other);
                                }
                            }
                        }
                    }
                }
            }
        }

        true
    }

    /// Applies `sign · lhs ≤ sign · rhs` to the bounds of its variables.
    /// Returns the variables whose bounds changed, or `None` on conflict.
    fn tighten(&mut self, ci: usize, sign: f64) -> Option<Vec<usize>> {
        let model = self.model;
        let c = &model.constraints()[ci];
        let rhs = sign * c.rhs;

        let min_activity: f64 = c
            .terms
            .iter()
            .map(|&(var, coef)| {
                let a = sign * coef;
                let v = var.index();

                if a > 0.0 {
                    a * self.lb[v] as f64
                } else {
                    a * self.ub[v] as f64
                }
            })
            .sum();

        if min_activity > rhs + EPS {
            return None;
        }

        let mut changed = Vec::new();

        for &(var, coef) in &c.terms {
            let a = sign * coef;
            let v = var.index();

            if self.lb[v] == self.ub[v] {
                continue;
            }

            if a > 0.0 {
                let rest = min_activity - a * self.lb[v] as f64;
                let limit = ((rhs - rest) / a + EPS).floor() as i64;

                if limit < self.ub[v] {
                    if limit < self.lb[v] {
                        return None;
                    }

                    self.set_bounds(v, self.lb[v], limit);
                    changed.push(v);
                }
            } else {
                let rest = min_activity - a * self.ub[v] as f64;
                let limit = ((rhs - rest) / a - EPS).ceil() as i64;

                if limit > self.lb[v] {
                    if limit > self.ub[v] {
                        return None;
                    }

                    self.set_bounds(v, limit, self.ub[v]);
                    changed.push(v);
                }
            }
        }

        Some(changed)
    }

    /// Open partition rows: those without a member fixed to one.
    fn open_partitions(&self) -> impl Iterator<Item = usize> + '_ {
        self.partitions.iter().copied().filter(|&ci| {
            self.model.constraints()[ci]
                .terms
                .iter()
                .all(|&(var, _)| self.lb[var.index()] == 0)
        })
    }

    fn free_members(&self, ci: usize) -> impl Iterator<Item = usize> + '_ {
        self.model.constraints()[ci]
            .terms
            .iter()
            .map(|&(var, _)| var.index())
            .filter(|&v| self.ub[v] == 1)
    }

    /// Lower bound on the objective of any completion of the current node.
    fn bound(&self) -> f64 {
        let vars = self.model.vars();
        let fixed: f64 = (0..vars.len()).map(|v| vars[v].obj * self.lb[v] as f64).sum();

        let open = self.open_partitions().collect_vec();
        let mut rows_closed = vec![0u32; vars.len()];

        for &ci in &open {
            for v in self.free_members(ci) {
                rows_closed[v] += 1;
            }
        }

        let shared: f64 = open
            .iter()
            .map(|&ci| {
                self.free_members(ci)
                    .map(|v| vars[v].obj / f64::from(rows_closed[v]))
                    .fold(f64::INFINITY, f64::min)
            })
            .sum();

        fixed + shared
    }

    fn select(&self) -> Option<Branch> {
        let row = self
            .open_partitions()
            .min_by_key(|&ci| self.free_members(ci).count());

        if let Some(ci) = row {
            let vars = self.model.vars();
            let members = self
                .free_members(ci)
                .sorted_by(|&a, &b| vars[a].obj.total_cmp(&vars[b].obj))
                .collect();

            return Some(Branch::Row(members));
        }

        (0..self.lb.len())
            .find(|&v| self.lb[v] < self.ub[v])
            .map(Branch::Var)
    }

    fn out_of_time(&mut self) -> bool {
        if !self.timed_out
            && self.nodes % CLOCK_INTERVAL == 0
            && Instant::now() >= self.deadline
        {
            self.timed_out = true;
        }

        self.timed_out
    }

    fn incumbent(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |(obj, _)| *obj)
    }

    fn dfs(&mut self) {
        self.nodes += 1;

        if self.out_of_time() || self.bound() >= self.incumbent() - EPS {
            return;
        }

        match self.select() {
            None => {
                let values = self.lb.iter().map(|&x| x as f64).collect_vec();

                if self.model.is_feasible(&values) {
                    self.best = Some((self.model.objective(&values), values));
                }
            }
            Some(Branch::Row(members)) => {
                let outer = self.trail.len();

                for v in members {
                    let mark = self.trail.len();

                    if self.fix(v, 1) {
                        self.dfs();
                    }
                    self.undo(mark);

                    if self.timed_out || !self.fix(v, 0) {
                        break;
                    }
                }

                self.undo(outer);
            }
            Some(Branch::Var(v)) => {
                for value in self.lb[v]..=self.ub[v] {
                    let mark = self.trail.len();

                    if self.fix(v, value) {
                        self.dfs();
                    }
                    self.undo(mark);

                    if self.timed_out {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ilp::LinExpr;

    fn solve(model: &Model) -> SolverSolution {
        BranchAndBound::new()
            .solve(model, Duration::from_secs(10))
            .unwrap()
    }

    #[test]
    fn set_partitioning() {
        // Cover {0, 1, 2} with {0, 1} (3), {1, 2} (3), {0} (1), {1} (1),
        // {2} (1.5) and {0, 1, 2} (4).
        let sets: [(&[usize], f64); 6] = [
            (&[0, 1], 3.0),
            (&[1, 2], 3.0),
            (&[0], 1.0),
            (&[1], 1.0),
            (&[2], 1.5),
            (&[0, 1, 2], 4.0),
        ];

        let mut model = Model::new("partition");
        let vars = sets
            .iter()
            .enumerate()
            .map(|(i, (_, cost))| model.add_binary(format!("s{i}"), *cost))
            .collect_vec();

        for e in 0..3 {
            let expr = sets
                .iter()
                .zip(&vars)
                .filter(|((elems, _), _)| elems.contains(&e))
                .map(|(_, &var)| (var, 1.0))
                .collect::<LinExpr>();

            model.add_constraint(format!("e{e}"), &expr, Sense::Eq, 1.0);
        }

        let solution = solve(&model);

        assert_eq!(solution.status, Status::Optimal);
        assert_eq!(solution.objective, 3.5);
        assert!(solution.is_set(vars[2]) && solution.is_set(vars[3]));
        assert!(solution.is_set(vars[4]));
    }

    #[test]
    fn integer_covering() {
        // min 3a + 2b  s.t.  3a + 2b >= 7, a <= 1.
        let mut model = Model::new("cover");
        let a = model.add_integer("a", 0, 1, 3.0);
        let b = model.add_integer("b", 0, 10, 2.0);

        let expr = [(a, 3.0), (b, 2.0)].into_iter().collect::<LinExpr>();
        model.add_constraint("c", &expr, Sense::Ge, 7.0);

        let solution = solve(&model);

        assert_eq!(solution.status, Status::Optimal);
        assert_eq!(solution.objective, 7.0);
        assert_eq!(solution.value(a), 1.0);
        assert_eq!(solution.value(b), 2.0);
    }

    #[test]
    fn infeasibility_is_proven() {
        let mut model = Model::new("infeasible");
        let x = model.add_binary("x", 1.0);
        let y = model.add_binary("y", 1.0);

        let sum = [(x, 1.0), (y, 1.0)].into_iter().collect::<LinExpr>();
        model.add_constraint("many", &sum, Sense::Ge, 2.0);
        model.add_constraint("few", &sum, Sense::Le, 1.0);

        assert_eq!(solve(&model).status, Status::Infeasible);
    }

    #[test]
    fn warm_start_is_kept_when_optimal() {
        let mut model = Model::new("start");
        let x = model.add_binary("x", 1.0);
        let y = model.add_binary("y", 2.0);

        let sum = [(x, 1.0), (y, 1.0)].into_iter().collect::<LinExpr>();
        model.add_constraint("one", &sum, Sense::Eq, 1.0);
        model.set_start(x, 1.0);
        model.set_start(y, 0.0);

        let solution = solve(&model);

        assert_eq!(solution.status, Status::Optimal);
        assert!(solution.is_set(x));
    }
}
