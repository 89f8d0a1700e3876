//! Nullcline tracing for two-variable systems.
//!
//! Each equation's zero locus is attempted in order: an explicit y(x) over
//! the x grid, an explicit x(y) over the y grid, then a numeric sweep that
//! fixes one coordinate per grid sample and collects every root of the
//! induced scalar problem along the other. Curves are recomputed on every
//! call; fixed values and parameters may differ between systems, so nothing
//! is cached.

use crate::equation_engine::Univariate;
use crate::error::AnalysisError;
use crate::fixed_points::{dedup_scalar, numeric_scalar_roots};
use crate::symbolic::{solve_zero_with_timeout, SolveOutcome};
use crate::system::PhaseSystem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which coordinate the numeric sweep iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepCoords {
    /// Fix each x sample, solve for y.
    XThenY,
    /// Fix each y sample, solve for x.
    YThenX,
}

/// How a nullcline was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum NullclineMethod {
    SymbolicYOfX,
    SymbolicXOfY,
    NumericSweep { coords: SweepCoords },
}

/// Sampled zero locus of one equation, as parallel coordinate vectors.
/// Scatter vs. connected rendering is the caller's choice; the engine
/// reports coordinates and the method tag only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullclineCurve {
    /// Dynamical variable whose derivative vanishes on this curve.
    pub equation: String,
    pub method: NullclineMethod,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Per-call tracing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NullclineSettings {
    /// Sweep-coordinate override per equation, keyed by the equation's
    /// variable name. Equations without an entry sweep the first variable.
    pub coords: HashMap<String, SweepCoords>,
}

/// Traces both nullclines of a two-variable system.
pub fn trace_nullclines(
    system: &PhaseSystem,
    settings: &NullclineSettings,
) -> Result<Vec<NullclineCurve>, AnalysisError> {
    if system.dimension() != 2 {
        return Err(AnalysisError::RequiresPlane {
            operation: "trace_nullclines",
        });
    }
    let mut curves = Vec::with_capacity(2);
    for eq in 0..2 {
        let name = &system.var(eq).name;
        let coords = settings
            .coords
            .get(name)
            .copied()
            .unwrap_or(SweepCoords::XThenY);
        curves.push(trace_equation(system, eq, coords));
    }
    Ok(curves)
}

fn trace_equation(system: &PhaseSystem, eq: usize, coords: SweepCoords) -> NullclineCurve {
    let options = system.options();
    let x_name = system.var(0).name.clone();
    let y_name = system.var(1).name.clone();
    let xs = system.grid().samples(0);
    let ys = system.grid().samples(1);
    let equation = system.var(eq).name.clone();
    let bound = system.bound_rhs(eq);

    if !options.skip_symbolic {
        if let SolveOutcome::Solved(branches) =
            solve_zero_with_timeout(bound, &y_name, options.timeout())
        {
            let mut cx = Vec::new();
            let mut cy = Vec::new();
            for branch in &branches {
                let f = Univariate::new(branch, &x_name);
                for &x in xs {
                    let y = f.eval(x);
                    // A branch can leave its real domain (e.g. a negative
                    // discriminant under a square root); skip those samples.
                    if y.is_finite() {
                        cx.push(x);
                        cy.push(y);
                    }
                }
            }
            return NullclineCurve {
                equation,
                method: NullclineMethod::SymbolicYOfX,
                x: cx,
                y: cy,
            };
        }
        if let SolveOutcome::Solved(branches) =
            solve_zero_with_timeout(bound, &x_name, options.timeout())
        {
            let mut cx = Vec::new();
            let mut cy = Vec::new();
            for branch in &branches {
                let f = Univariate::new(branch, &y_name);
                for &y in ys {
                    let x = f.eval(y);
                    if x.is_finite() {
                        cx.push(x);
                        cy.push(y);
                    }
                }
            }
            return NullclineCurve {
                equation,
                method: NullclineMethod::SymbolicXOfY,
                x: cx,
                y: cy,
            };
        }
    }

    // Numeric sweep, reusing the root finder's numeric scalar search. A
    // sweep sample may contribute zero, one, or several roots; all are kept.
    let mut cx = Vec::new();
    let mut cy = Vec::new();
    match coords {
        SweepCoords::XThenY => {
            for &x0 in xs {
                let f = |y: f64| system.eval(eq, &[x0, y]);
                let roots = dedup_scalar(numeric_scalar_roots(&f, ys, options), options.xl_tol);
                for c in roots {
                    cx.push(x0);
                    cy.push(c.x);
                }
            }
        }
        SweepCoords::YThenX => {
            for &y0 in ys {
                let f = |x: f64| system.eval(eq, &[x, y0]);
                let roots = dedup_scalar(numeric_scalar_roots(&f, xs, options), options.xl_tol);
                for c in roots {
                    cx.push(c.x);
                    cy.push(y0);
                }
            }
        }
    }
    NullclineCurve {
        equation,
        method: NullclineMethod::NumericSweep { coords },
        x: cx,
        y: cy,
    }
}
