//! Solver-independent mixed-integer linear model.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Continuous { lower: f64, upper: f64 },
}

impl VarKind {
    pub fn bounds(self) -> (f64, f64) {
        match self {
            VarKind::Binary => (0.0, 1.0),
            VarKind::Continuous { lower, upper } => (lower, upper),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
}

/// `sum(coeff * var)`; a variable appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, var: VarId, coeff: f64) -> Self {
        self.add(var, coeff);
        self
    }

    /// Adds `coeff * var`, merging with an existing term on the same variable.
    pub fn add(&mut self, var: VarId, coeff: f64) {
        match self.terms.iter_mut().find(|(v, _)| *v == var) {
            Some((_, c)) => *c += coeff,
            None => self.terms.push((var, coeff)),
        }
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.0]).sum()
    }
}

/// Sums `coeff * var` pairs whose variables are known to be distinct.
impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        LinearExpr { terms: iter.into_iter().collect() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cmp::Le => "<=",
            Cmp::Ge => ">=",
            Cmp::Eq => "=",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Stable identifier, unique within a model.
    pub name: String,
    pub lhs: LinearExpr,
    pub cmp: Cmp,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        let lhs = self.lhs.eval(values);
        match self.cmp {
            Cmp::Le => lhs <= self.rhs + tol,
            Cmp::Ge => lhs >= self.rhs - tol,
            Cmp::Eq => (lhs - self.rhs).abs() <= tol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    sense: Sense,
    objective: LinearExpr,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Model {
            name: name.into(),
            variables: vec![],
            constraints: vec![],
            sense: Sense::Minimize,
            objective: LinearExpr::new(),
        }
    }

    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_variable(name.into(), VarKind::Binary)
    }

    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_variable(name.into(), VarKind::Continuous { lower, upper })
    }

    fn add_variable(&mut self, name: String, kind: VarKind) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable { name, kind });
        id
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, lhs: LinearExpr, cmp: Cmp, rhs: f64) {
        self.constraints.push(Constraint { name: name.into(), lhs, cmp, rhs });
    }

    pub fn set_objective(&mut self, sense: Sense, objective: LinearExpr) {
        self.sense = sense;
        self.objective = objective;
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn variables(&self) -> &[Variable] { &self.variables }
    pub fn constraints(&self) -> &[Constraint] { &self.constraints }
    pub fn sense(&self) -> Sense { self.sense }
    pub fn objective(&self) -> &LinearExpr { &self.objective }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.eval(values)
    }

    /// Names of the constraints and bounds that `values` violates.
    pub fn violations(&self, values: &[f64], tol: f64) -> Vec<String> {
        let mut violated = vec![];
        for (k, var) in self.variables.iter().enumerate() {
            let (lo, hi) = var.kind.bounds();
            let v = values[k];
            if v < lo - tol || v > hi + tol {
                violated.push(format!("bound of {}", var.name));
            } else if var.kind == VarKind::Binary && (v - v.round()).abs() > tol {
                violated.push(format!("integrality of {}", var.name));
            }
        }
        violated.extend(self.constraints.iter().filter(|c| !c.is_satisfied(values, tol)).map(|c| c.name.clone()));
        violated
    }
}
