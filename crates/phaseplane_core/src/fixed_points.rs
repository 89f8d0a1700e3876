//! Fixed-point location and classification.
//!
//! The candidate search is symbolic-first: closed forms are attempted under
//! a time budget and evaluated numerically; any failure falls through to
//! the grid-seeded optimizer. Candidates from either path are merged by
//! distance before classification, collapsing both the optimizer's
//! duplicate minimizers and symbolic multiplicities.

use crate::equation_engine::{eval_constant, Expr, Univariate};
use crate::error::AnalysisError;
use crate::optimizer::{plane_minimizers, scalar_minimizers};
use crate::stability::{classify_1d, classify_2d, Stability1d, Stability2d};
use crate::symbolic::{solve_zero_with_timeout, SolveOutcome};
use crate::system::{AnalysisOptions, PhaseSystem};
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a root candidate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    Symbolic,
    Numeric,
}

/// Serializable complex eigenvalue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex64> for ComplexNumber {
    fn from(value: Complex64) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

/// Transient root candidate on a line. Produced during search, consumed by
/// deduplication, never returned to callers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate1d {
    pub x: f64,
    pub residual: f64,
    pub method: SolveMethod,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate2d {
    pub x: f64,
    pub y: f64,
    pub residual: f64,
    pub method: SolveMethod,
}

/// A classified fixed point of a one-variable system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedPoint1d {
    pub x: f64,
    pub derivative: f64,
    pub stability: Stability1d,
    pub method: SolveMethod,
}

/// A classified fixed point of a two-variable system, with its
/// finite-difference Jacobian (row-major) and complex eigenvalues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedPoint2d {
    pub x: f64,
    pub y: f64,
    pub jacobian: [f64; 4],
    pub eigenvalues: [ComplexNumber; 2],
    pub stability: Stability2d,
    pub method: SolveMethod,
}

/// Result set of a fixed-point query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FixedPoints {
    Line(Vec<FixedPoint1d>),
    Plane(Vec<FixedPoint2d>),
}

/// Locates and classifies every fixed point of the system inside its
/// bounded domain. An empty result set means the search found nothing
/// within tolerance; it is not an error.
pub fn find_fixed_points(system: &PhaseSystem) -> Result<FixedPoints, AnalysisError> {
    match system.dimension() {
        1 => Ok(FixedPoints::Line(find_on_line(system))),
        _ => Ok(FixedPoints::Plane(find_on_plane(system))),
    }
}

/// Scalar root candidates, symbolic-first. This is the single policy point
/// for the solve ordering: closed forms under a time budget (unless the
/// caller opted out), then the grid-seeded optimizer. The nullcline
/// tracer's numeric sweep reuses [`numeric_scalar_roots`] directly.
pub(crate) fn scalar_root_candidates(
    f: &dyn Fn(f64) -> f64,
    bound: &Expr,
    var: &str,
    domain: (f64, f64),
    samples: &[f64],
    options: &AnalysisOptions,
) -> Vec<Candidate1d> {
    if !options.skip_symbolic {
        if let SolveOutcome::Solved(roots) =
            solve_zero_with_timeout(bound, var, options.timeout())
        {
            let mut out = Vec::new();
            for root in &roots {
                let x = eval_constant(root);
                if x.is_finite() && x >= domain.0 && x <= domain.1 {
                    out.push(Candidate1d {
                        x,
                        residual: f(x),
                        method: SolveMethod::Symbolic,
                    });
                }
            }
            return out;
        }
    }
    numeric_scalar_roots(f, samples, options)
}

/// The numeric half of the scalar search: optimizer minimizers filtered by
/// the residual tolerance.
pub(crate) fn numeric_scalar_roots(
    f: &dyn Fn(f64) -> f64,
    samples: &[f64],
    options: &AnalysisOptions,
) -> Vec<Candidate1d> {
    scalar_minimizers(f, samples, &options.optimizer)
        .into_iter()
        .filter(|(_, residual)| residual.is_finite() && residual.abs() < options.fl_tol)
        .map(|(x, residual)| Candidate1d {
            x,
            residual,
            method: SolveMethod::Numeric,
        })
        .collect()
}

/// Sorts candidates by coordinate and merges neighbors closer than
/// `xl_tol`, keeping the lower-residual representative of each cluster.
pub(crate) fn dedup_scalar(mut candidates: Vec<Candidate1d>, xl_tol: f64) -> Vec<Candidate1d> {
    candidates.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    let mut out: Vec<Candidate1d> = Vec::new();
    for c in candidates {
        match out.last_mut() {
            Some(last) if (c.x - last.x).abs() < xl_tol => {
                if c.residual.abs() < last.residual.abs() {
                    *last = c;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Greedy Euclidean merge: candidates are taken in residual order and kept
/// only when no better candidate sits within `xl_tol`. The survivors are
/// reported in coordinate order so discovery order never leaks out.
pub(crate) fn dedup_plane(mut candidates: Vec<Candidate2d>, xl_tol: f64) -> Vec<Candidate2d> {
    candidates.sort_by(|a, b| {
        a.residual
            .abs()
            .partial_cmp(&b.residual.abs())
            .unwrap_or(Ordering::Equal)
    });
    let mut kept: Vec<Candidate2d> = Vec::new();
    for c in candidates {
        let distinct = kept
            .iter()
            .all(|k| ((k.x - c.x).powi(2) + (k.y - c.y).powi(2)).sqrt() >= xl_tol);
        if distinct {
            kept.push(c);
        }
    }
    kept.sort_by(|a, b| {
        (a.x, a.y)
            .partial_cmp(&(b.x, b.y))
            .unwrap_or(Ordering::Equal)
    });
    kept
}

fn find_on_line(system: &PhaseSystem) -> Vec<FixedPoint1d> {
    let options = system.options();
    let var = system.var(0).clone();
    let f = |x: f64| system.eval(0, &[x]);
    let candidates = scalar_root_candidates(
        &f,
        system.bound_rhs(0),
        &var.name,
        var.domain(),
        system.grid().samples(0),
        options,
    );
    let roots = dedup_scalar(candidates, options.xl_tol);

    let h = options.disturb;
    roots
        .into_iter()
        .map(|c| {
            let derivative = (f(c.x + h) - f(c.x - h)) / (2.0 * h);
            FixedPoint1d {
                x: c.x,
                derivative,
                stability: classify_1d(derivative, options.fl_tol),
                method: c.method,
            }
        })
        .collect()
}

fn find_on_plane(system: &PhaseSystem) -> Vec<FixedPoint2d> {
    let options = system.options();
    let x_var = system.var(0).clone();
    let y_var = system.var(1).clone();
    let xs = system.grid().samples(0);
    let ys = system.grid().samples(1);
    let residual_at = |x: f64, y: f64| {
        let fx = system.eval(0, &[x, y]);
        let gy = system.eval(1, &[x, y]);
        (fx * fx + gy * gy).sqrt()
    };

    let mut candidates: Vec<Candidate2d> = Vec::new();
    let mut reduced = false;

    if !options.skip_symbolic {
        // Reduce to one dimension by eliminating a coordinate through the
        // second equation's nullcline relation.
        if let SolveOutcome::Solved(branches) =
            solve_zero_with_timeout(system.bound_rhs(1), &y_var.name, options.timeout())
        {
            reduced = true;
            for branch in &branches {
                let relation = Univariate::new(branch, &x_var.name);
                let composed = system.bound_rhs(0).substitute(&y_var.name, branch);
                let scalar = Univariate::new(&composed, &x_var.name);
                let f = |x: f64| scalar.eval(x);
                for c in scalar_root_candidates(
                    &f,
                    &composed,
                    &x_var.name,
                    x_var.domain(),
                    xs,
                    options,
                ) {
                    let y = relation.eval(c.x);
                    if y.is_finite() && y >= y_var.min && y <= y_var.max {
                        candidates.push(Candidate2d {
                            x: c.x,
                            y,
                            residual: residual_at(c.x, y),
                            method: c.method,
                        });
                    }
                }
            }
        } else if let SolveOutcome::Solved(branches) =
            solve_zero_with_timeout(system.bound_rhs(1), &x_var.name, options.timeout())
        {
            reduced = true;
            for branch in &branches {
                let relation = Univariate::new(branch, &y_var.name);
                let composed = system.bound_rhs(0).substitute(&x_var.name, branch);
                let scalar = Univariate::new(&composed, &y_var.name);
                let f = |y: f64| scalar.eval(y);
                for c in scalar_root_candidates(
                    &f,
                    &composed,
                    &y_var.name,
                    y_var.domain(),
                    ys,
                    options,
                ) {
                    let x = relation.eval(c.x);
                    if x.is_finite() && x >= x_var.min && x <= x_var.max {
                        candidates.push(Candidate2d {
                            x,
                            y: c.x,
                            residual: residual_at(x, c.x),
                            method: c.method,
                        });
                    }
                }
            }
        }
    }

    if !reduced {
        // No usable closed form anywhere: minimize the squared residual sum
        // over the full mesh.
        let h = |x: f64, y: f64| {
            let fx = system.eval(0, &[x, y]);
            let gy = system.eval(1, &[x, y]);
            fx * fx + gy * gy
        };
        candidates = plane_minimizers(&h, xs, ys, &options.optimizer)
            .into_iter()
            .filter(|(_, _, residual)| residual.is_finite() && *residual < options.fl_tol)
            .map(|(x, y, residual)| Candidate2d {
                x,
                y,
                residual,
                method: SolveMethod::Numeric,
            })
            .collect();
    }

    let roots = dedup_plane(candidates, options.xl_tol);
    roots
        .into_iter()
        .map(|c| {
            let jacobian = estimate_jacobian(system, c.x, c.y, options.disturb);
            FixedPoint2d {
                x: c.x,
                y: c.y,
                jacobian,
                eigenvalues: eigenvalues_of(&jacobian),
                stability: classify_2d(&jacobian, options.fl_tol),
                method: c.method,
            }
        })
        .collect()
}

/// Central-difference 2x2 Jacobian with step `disturb`, row-major.
fn estimate_jacobian(system: &PhaseSystem, x: f64, y: f64, disturb: f64) -> [f64; 4] {
    let h = disturb;
    let eval = |eq: usize, x: f64, y: f64| system.eval(eq, &[x, y]);
    [
        (eval(0, x + h, y) - eval(0, x - h, y)) / (2.0 * h),
        (eval(0, x, y + h) - eval(0, x, y - h)) / (2.0 * h),
        (eval(1, x + h, y) - eval(1, x - h, y)) / (2.0 * h),
        (eval(1, x, y + h) - eval(1, x, y - h)) / (2.0 * h),
    ]
}

fn eigenvalues_of(jacobian: &[f64; 4]) -> [ComplexNumber; 2] {
    if jacobian.iter().any(|v| !v.is_finite()) {
        let nan = ComplexNumber {
            re: f64::NAN,
            im: f64::NAN,
        };
        return [nan, nan];
    }
    let matrix = DMatrix::from_row_slice(2, 2, jacobian);
    let eigenvalues = matrix.complex_eigenvalues();
    [
        ComplexNumber::from(eigenvalues[0]),
        ComplexNumber::from(eigenvalues[1]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Model;

    fn line_system(rhs: &str, domain: (f64, f64), options: AnalysisOptions) -> PhaseSystem {
        let model = Model::new(&[("x", rhs)], &[]).expect("model should build");
        PhaseSystem::new(&model, &[("x", domain)], &[], &[], options)
            .expect("system should build")
    }

    fn plane_system(
        x_rhs: &str,
        y_rhs: &str,
        options: AnalysisOptions,
    ) -> PhaseSystem {
        let model =
            Model::new(&[("x", x_rhs), ("y", y_rhs)], &[]).expect("model should build");
        PhaseSystem::new(
            &model,
            &[("x", (-2.0, 2.0)), ("y", (-2.0, 2.0))],
            &[],
            &[],
            options,
        )
        .expect("system should build")
    }

    fn line_roots(points: &FixedPoints) -> Vec<(f64, Stability1d)> {
        match points {
            FixedPoints::Line(list) => list.iter().map(|p| (p.x, p.stability)).collect(),
            FixedPoints::Plane(_) => panic!("expected a line result"),
        }
    }

    #[test]
    fn cubic_has_three_roots_with_expected_stability() {
        let system = line_system("x * (x - 1) * (x + 1)", (-2.0, 2.0), AnalysisOptions::default());
        let points = find_fixed_points(&system).expect("search should run");
        let roots = line_roots(&points);
        assert_eq!(roots.len(), 3, "expected exactly -1, 0, 1: {roots:?}");
        assert!((roots[0].0 + 1.0).abs() < 1e-4);
        assert!((roots[1].0).abs() < 1e-4);
        assert!((roots[2].0 - 1.0).abs() < 1e-4);
        // f' = 3x^2 - 1: positive at the outer roots, negative at zero.
        assert_eq!(roots[0].1, Stability1d::Unstable);
        assert_eq!(roots[1].1, Stability1d::Stable);
        assert_eq!(roots[2].1, Stability1d::Unstable);
    }

    #[test]
    fn repeated_searches_return_the_same_roots() {
        let system = line_system("x * (x - 1) * (x + 1)", (-2.0, 2.0), AnalysisOptions::default());
        let first = line_roots(&find_fixed_points(&system).expect("search should run"));
        let second = line_roots(&find_fixed_points(&system).expect("search should run"));
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert!((a.0 - b.0).abs() < 1e-4);
            assert_eq!(a.1, b.1);
        }
    }

    #[test]
    fn symbolic_and_numeric_paths_agree() {
        let symbolic = line_system("x ^ 2 - 1", (-2.0, 2.0), AnalysisOptions::default());
        let numeric = line_system(
            "x ^ 2 - 1",
            (-2.0, 2.0),
            AnalysisOptions {
                skip_symbolic: true,
                ..AnalysisOptions::default()
            },
        );
        let sym_points = match find_fixed_points(&symbolic).expect("search should run") {
            FixedPoints::Line(list) => list,
            _ => unreachable!(),
        };
        let num_points = match find_fixed_points(&numeric).expect("search should run") {
            FixedPoints::Line(list) => list,
            _ => unreachable!(),
        };
        assert!(sym_points.iter().all(|p| p.method == SolveMethod::Symbolic));
        assert!(num_points.iter().all(|p| p.method == SolveMethod::Numeric));
        assert_eq!(sym_points.len(), num_points.len());
        for (a, b) in sym_points.iter().zip(&num_points) {
            assert!(
                (a.x - b.x).abs() < 1e-4,
                "paths disagree: {} vs {}",
                a.x,
                b.x
            );
        }
    }

    #[test]
    fn rootless_equations_yield_empty_sets_not_errors() {
        let symbolic = line_system("x ^ 2 + 1", (-2.0, 2.0), AnalysisOptions::default());
        assert!(line_roots(&find_fixed_points(&symbolic).expect("search should run")).is_empty());
        let numeric = line_system(
            "x ^ 2 + 1",
            (-2.0, 2.0),
            AnalysisOptions {
                skip_symbolic: true,
                ..AnalysisOptions::default()
            },
        );
        assert!(line_roots(&find_fixed_points(&numeric).expect("search should run")).is_empty());
    }

    #[test]
    fn roots_outside_the_domain_are_discarded() {
        let system = line_system("x ^ 2 - 9", (-2.0, 2.0), AnalysisOptions::default());
        assert!(line_roots(&find_fixed_points(&system).expect("search should run")).is_empty());
    }

    #[test]
    fn linear_plane_systems_classify_correctly() {
        let cases = [
            ("-x", "-y", Stability2d::StableNode),
            ("x", "-y", Stability2d::Saddle),
            ("-x - y", "x - y", Stability2d::StableFocus),
        ];
        for (x_rhs, y_rhs, expected) in cases {
            let system = plane_system(x_rhs, y_rhs, AnalysisOptions::default());
            let points = match find_fixed_points(&system).expect("search should run") {
                FixedPoints::Plane(list) => list,
                _ => unreachable!(),
            };
            assert_eq!(points.len(), 1, "{x_rhs}/{y_rhs} should have one root");
            let p = &points[0];
            assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
            assert_eq!(p.stability, expected, "for system ({x_rhs}, {y_rhs})");
        }
    }

    #[test]
    fn stable_node_eigenvalues_are_real_and_negative() {
        let system = plane_system("-x", "-y", AnalysisOptions::default());
        let points = match find_fixed_points(&system).expect("search should run") {
            FixedPoints::Plane(list) => list,
            _ => unreachable!(),
        };
        for ev in points[0].eigenvalues {
            assert!((ev.re + 1.0).abs() < 1e-3);
            assert!(ev.im.abs() < 1e-6);
        }
    }

    #[test]
    fn nonlinear_reduction_through_the_second_equation() {
        // dy/dt = y - x is solvable for y, turning dx/dt = x - x^2 into a
        // scalar problem with roots at 0 and 1.
        let system = plane_system("x - x ^ 2", "y - x", AnalysisOptions::default());
        let mut points = match find_fixed_points(&system).expect("search should run") {
            FixedPoints::Plane(list) => list,
            _ => unreachable!(),
        };
        points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());
        assert_eq!(points.len(), 2, "expected (0,0) and (1,1)");
        assert!(points[0].x.abs() < 1e-6 && points[0].y.abs() < 1e-6);
        assert!((points[1].x - 1.0).abs() < 1e-6 && (points[1].y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn plane_fallback_runs_when_nothing_is_isolatable() {
        let model = Model::new(&[("x", "x - y"), ("y", "sin(x) + sin(y)")], &[])
            .expect("model should build");
        let system = PhaseSystem::new(
            &model,
            &[("x", (-1.0, 1.0)), ("y", (-1.0, 1.0))],
            &[],
            &[],
            AnalysisOptions::default(),
        )
        .expect("system should build");
        let points = match find_fixed_points(&system).expect("search should run") {
            FixedPoints::Plane(list) => list,
            _ => unreachable!(),
        };
        assert_eq!(points.len(), 1, "only the origin lies in this window");
        let p = &points[0];
        assert!(p.x.abs() < 1e-4 && p.y.abs() < 1e-4);
        assert_eq!(p.method, SolveMethod::Numeric);
        assert_eq!(p.stability, Stability2d::UnstableFocus);
    }

    #[test]
    fn deduplication_keeps_the_lower_residual_representative() {
        let candidates = vec![
            Candidate1d {
                x: 1.0,
                residual: 1e-7,
                method: SolveMethod::Numeric,
            },
            Candidate1d {
                x: 1.00005,
                residual: 1e-9,
                method: SolveMethod::Numeric,
            },
            Candidate1d {
                x: 2.0,
                residual: 1e-8,
                method: SolveMethod::Numeric,
            },
        ];
        let merged = dedup_scalar(candidates, 1e-4);
        assert_eq!(merged.len(), 2);
        assert!((merged[0].x - 1.00005).abs() < 1e-12);
        assert_eq!(merged[0].residual, 1e-9);
    }
}
