//! Semidefinite-program capability contract.
//!
//! Both engines assemble their sub-problems as an [`SdpProblem`] — symmetric
//! matrix variables, a linear objective over Frobenius inner products, and
//! linear equality/inequality constraints — and hand it to an [`SdpSolve`]
//! backend. Backend bindings (SCS, MOSEK) live outside this crate; the
//! problem model can evaluate any of its linear functionals at a candidate
//! point, which is what the engines use to read payouts off a solution.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linalg;

/// Named solver backend identity.
///
/// A closed enumeration: selecting anything else is unrepresentable, and
/// configuration parsing rejects unknown names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    #[default]
    Scs,
    Mosek,
}

impl Solver {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scs => "scs",
            Self::Mosek => "mosek",
        }
    }
}

impl std::str::FromStr for Solver {
    type Err = UnknownSolver;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scs" => Ok(Self::Scs),
            "mosek" => Ok(Self::Mosek),
            _ => Err(UnknownSolver(s.to_string())),
        }
    }
}

/// Unknown solver name.
#[derive(Debug, Clone, Error)]
#[error("unknown solver {0:?} (supported: scs, mosek)")]
pub struct UnknownSolver(pub String);

/// Options forwarded to the backend for one solve call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveOptions {
    pub solver: Solver,
    pub verbose: bool,
    pub warm_start: bool,
}

/// One symmetric matrix variable.
#[derive(Debug, Clone, Copy)]
pub struct MatrixVar {
    pub dim: usize,
    pub psd: bool,
}

/// Linear functional `sum_v <coeff_v, X_v> + constant` over the problem's
/// variables, with `<A, B>` the Frobenius inner product.
#[derive(Debug, Clone, Default)]
pub struct LinearExpr {
    pub terms: Vec<(usize, Array2<f64>)>,
    pub constant: f64,
}

impl LinearExpr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, var: usize, coeff: Array2<f64>) {
        self.terms.push((var, coeff));
    }

    /// Value of the functional at a candidate variable assignment.
    #[must_use]
    pub fn eval(&self, values: &[Array2<f64>]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| linalg::frobenius(coeff, &values[*var]))
            .sum::<f64>()
            + self.constant
    }
}

/// Constraint sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Ge,
}

/// `expr (== | >=) rhs`.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

/// A semidefinite program in the form both engines produce: maximize a
/// linear objective over symmetric (optionally PSD) matrix variables under
/// linear constraints.
#[derive(Debug, Clone, Default)]
pub struct SdpProblem {
    pub vars: Vec<MatrixVar>,
    pub objective: LinearExpr,
    pub constraints: Vec<Constraint>,
}

impl SdpProblem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a `dim × dim` symmetric variable; returns its index.
    pub fn add_var(&mut self, dim: usize, psd: bool) -> usize {
        self.vars.push(MatrixVar { dim, psd });
        self.vars.len() - 1
    }

    pub fn maximize(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn add_constraint(&mut self, expr: LinearExpr, relation: Relation, rhs: f64) {
        self.constraints.push(Constraint {
            expr,
            relation,
            rhs,
        });
    }

    /// Constrain `sum_v X_v == I` entrywise over `dim × dim` variables.
    pub fn add_sum_to_identity(&mut self, vars: &[usize], dim: usize) {
        for i in 0..dim {
            for j in i..dim {
                let mut expr = LinearExpr::new();
                for &var in vars {
                    expr.push(var, entry_selector(dim, i, j));
                }
                let rhs = f64::from(u8::from(i == j));
                self.add_constraint(expr, Relation::Eq, rhs);
            }
        }
    }

    /// Objective value at a candidate variable assignment.
    #[must_use]
    pub fn objective_value(&self, values: &[Array2<f64>]) -> f64 {
        self.objective.eval(values)
    }

    /// Largest constraint violation at a candidate assignment (0 when
    /// feasible with respect to the linear constraints).
    #[must_use]
    pub fn max_violation(&self, values: &[Array2<f64>]) -> f64 {
        self.constraints
            .iter()
            .map(|c| {
                let v = c.expr.eval(values) - c.rhs;
                match c.relation {
                    Relation::Eq => v.abs(),
                    Relation::Ge => (-v).max(0.0),
                }
            })
            .fold(0.0, f64::max)
    }
}

/// Selector matrix whose Frobenius product with a symmetric `X` reads
/// `X[i][j]`.
#[must_use]
pub fn entry_selector(dim: usize, i: usize, j: usize) -> Array2<f64> {
    let mut e = Array2::zeros((dim, dim));
    if i == j {
        e[[i, i]] = 1.0;
    } else {
        e[[i, j]] = 0.5;
        e[[j, i]] = 0.5;
    }
    e
}

/// Solved variable values plus the attained objective.
#[derive(Debug, Clone)]
pub struct SdpSolution {
    pub values: Vec<Array2<f64>>,
    pub objective: f64,
}

/// Typed backend failure set.
#[derive(Debug, Error)]
pub enum SdpError {
    #[error("problem is infeasible")]
    Infeasible,

    #[error("problem is unbounded")]
    Unbounded,

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// A semidefinite-program solver backend.
pub trait SdpSolve {
    /// Solve `problem`, populating every variable's value.
    ///
    /// # Errors
    ///
    /// Returns an [`SdpError`] when the problem is infeasible, unbounded,
    /// or the backend fails numerically.
    fn solve(&mut self, problem: &SdpProblem, options: &SolveOptions)
    -> Result<SdpSolution, SdpError>;
}
