//! Mixed-integer linear models.

use std::fmt;

/// Handle of a decision variable within its [`Model`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub(crate) usize);

impl Var {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarInfo {
    pub name: String,
    /// Integer bounds; binaries are `[0, 1]`.
    pub lb: i64,
    pub ub: i64,
    /// Objective coefficient.
    pub obj: f64,
}

impl VarInfo {
    pub fn is_binary(&self) -> bool {
        self.lb == 0 && self.ub == 1
    }
}

/// A linear expression `Σ coef · var + constant`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> LinExpr {
        LinExpr::default()
    }

    pub fn add_term(&mut self, var: Var, coef: f64) -> &mut LinExpr {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut LinExpr {
        self.constant += value;
        self
    }

    /// Adds `scale · other` to this expression.
    pub fn add_expr(&mut self, other: &LinExpr, scale: f64) -> &mut LinExpr {
        for &(var, coef) in &other.terms {
            self.add_term(var, coef * scale);
        }
        self.constant += other.constant * scale;
        self
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn eval(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(var, coef)| coef * values[var.0])
                .sum::<f64>()
    }
}

impl FromIterator<(Var, f64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (Var, f64)>>(iter: I) -> Self {
        let mut expr = LinExpr::new();
        for (var, coef) in iter {
            expr.add_term(var, coef);
        }
        expr
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "==",
        })
    }
}

/// A linear constraint with its constant folded into the right-hand side.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(Var, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64]) -> bool {
        const TOLERANCE: f64 = 1e-6;

        let lhs: f64 = self.terms.iter().map(|&(v, c)| c * values[v.0]).sum();

        match self.sense {
            Sense::Le => lhs <= self.rhs + TOLERANCE,
            Sense::Ge => lhs >= self.rhs - TOLERANCE,
            Sense::Eq => (lhs - self.rhs).abs() <= TOLERANCE,
        }
    }
}

/// A minimization problem over bounded integer variables.
#[derive(Clone, Debug, Default)]
pub struct Model {
    name: String,
    vars: Vec<VarInfo>,
    constraints: Vec<Constraint>,
    start: Vec<Option<f64>>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Model {
        Model {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_binary(&mut self, name: impl Into<String>, obj: f64) -> Var {
        self.add_integer(name, 0, 1, obj)
    }

    pub fn add_integer(
        &mut self,
        name: impl Into<String>,
        lb: i64,
        ub: i64,
        obj: f64,
    ) -> Var {
        let var = Var(self.vars.len());

        self.vars.push(VarInfo {
            name: name.into(),
            lb,
            ub,
            obj,
        });
        self.start.push(None);

        var
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: &LinExpr,
        sense: Sense,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            terms: expr.terms.clone(),
            sense,
            rhs: rhs - expr.constant,
        });
    }

    /// Suggests a value for `var` in an initial solution.
    pub fn set_start(&mut self, var: Var, value: f64) {
        self.start[var.0] = Some(value);
    }

    /// The initial solution, if every variable has a suggested value.
    pub fn start(&self) -> Option<Vec<f64>> {
        self.start.iter().copied().collect()
    }

    pub fn vars(&self) -> &[VarInfo] {
        &self.vars
    }

    pub fn var(&self, var: Var) -> &VarInfo {
        &self.vars[var.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self, values: &[f64]) -> f64 {
        self.vars.iter().zip(values).map(|(v, x)| v.obj * x).sum()
    }

    /// Whether `values` is an integral assignment within bounds that satisfies
    /// every constraint.
    pub fn is_feasible(&self, values: &[f64]) -> bool {
        values.len() == self.vars.len()
            && self.vars.iter().zip(values).all(|(v, &x)| {
                x.fract() == 0.0 && x >= v.lb as f64 && x <= v.ub as f64
            })
            && self.constraints.iter().all(|c| c.is_satisfied(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_fold_into_rhs() {
        let mut model = Model::new("fold");
        let x = model.add_integer("x", 0, 5, 1.0);

        let mut expr = LinExpr::new();
        expr.add_term(x, 2.0).add_constant(1.0);
        model.add_constraint("c", &expr, Sense::Ge, 5.0);

        assert_eq!(model.constraints()[0].rhs, 4.0);
        assert!(model.is_feasible(&[2.0]));
        assert!(!model.is_feasible(&[1.0]));
        assert!(!model.is_feasible(&[1.5]));
        assert!(model.start().is_none());

        model.set_start(x, 3.0);
        assert_eq!(model.start(), Some(vec![3.0]));
    }
}
