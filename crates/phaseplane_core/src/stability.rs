use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative stability of a fixed point on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability1d {
    Stable,
    Unstable,
    /// Derivative indistinguishable from zero at the working tolerance.
    Degenerate,
    /// Non-finite derivative estimate.
    Undetermined,
}

/// Qualitative stability of a fixed point in the plane, from the trace and
/// determinant of the local Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability2d {
    StableNode,
    StableFocus,
    UnstableNode,
    UnstableFocus,
    Saddle,
    /// Non-hyperbolic: determinant positive, trace indistinguishable from
    /// zero.
    Center,
    /// Determinant indistinguishable from zero.
    Degenerate,
    /// Non-finite Jacobian entries.
    Undetermined,
}

impl fmt::Display for Stability1d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stability1d::Stable => "stable",
            Stability1d::Unstable => "unstable",
            Stability1d::Degenerate => "degenerate",
            Stability1d::Undetermined => "undetermined",
        };
        write!(f, "{label}")
    }
}

impl fmt::Display for Stability2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stability2d::StableNode => "stable node",
            Stability2d::StableFocus => "stable focus",
            Stability2d::UnstableNode => "unstable node",
            Stability2d::UnstableFocus => "unstable focus",
            Stability2d::Saddle => "saddle",
            Stability2d::Center => "center",
            Stability2d::Degenerate => "degenerate",
            Stability2d::Undetermined => "undetermined",
        };
        write!(f, "{label}")
    }
}

/// Classifies a 1D fixed point from the sign of df/dx. Total: every input,
/// finite or not, maps to exactly one class.
pub fn classify_1d(derivative: f64, fl_tol: f64) -> Stability1d {
    if !derivative.is_finite() {
        Stability1d::Undetermined
    } else if derivative.abs() <= fl_tol {
        Stability1d::Degenerate
    } else if derivative < 0.0 {
        Stability1d::Stable
    } else {
        Stability1d::Unstable
    }
}

/// Classifies a 2D fixed point from the Jacobian (row-major). Total:
/// non-finite entries yield `Undetermined` rather than a panic, and the
/// trace/determinant comparisons against zero are taken within `fl_tol`.
pub fn classify_2d(jacobian: &[f64; 4], fl_tol: f64) -> Stability2d {
    if jacobian.iter().any(|v| !v.is_finite()) {
        return Stability2d::Undetermined;
    }
    let trace = jacobian[0] + jacobian[3];
    let det = jacobian[0] * jacobian[3] - jacobian[1] * jacobian[2];

    if det.abs() <= fl_tol {
        Stability2d::Degenerate
    } else if det < 0.0 {
        Stability2d::Saddle
    } else if trace.abs() <= fl_tol {
        Stability2d::Center
    } else {
        let discriminant = trace * trace - 4.0 * det;
        match (trace < 0.0, discriminant >= 0.0) {
            (true, true) => Stability2d::StableNode,
            (true, false) => Stability2d::StableFocus,
            (false, true) => Stability2d::UnstableNode,
            (false, false) => Stability2d::UnstableFocus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn line_classification_follows_derivative_sign() {
        assert_eq!(classify_1d(-2.0, TOL), Stability1d::Stable);
        assert_eq!(classify_1d(3.0, TOL), Stability1d::Unstable);
        assert_eq!(classify_1d(0.0, TOL), Stability1d::Degenerate);
        assert_eq!(classify_1d(1e-9, TOL), Stability1d::Degenerate);
        assert_eq!(classify_1d(f64::NAN, TOL), Stability1d::Undetermined);
        assert_eq!(classify_1d(f64::INFINITY, TOL), Stability1d::Undetermined);
    }

    #[test]
    fn plane_classification_covers_the_trace_determinant_chart() {
        // dx/dt = -x, dy/dt = -y
        assert_eq!(
            classify_2d(&[-1.0, 0.0, 0.0, -1.0], TOL),
            Stability2d::StableNode
        );
        // dx/dt = x, dy/dt = -y
        assert_eq!(classify_2d(&[1.0, 0.0, 0.0, -1.0], TOL), Stability2d::Saddle);
        // dx/dt = -x - y, dy/dt = x - y
        assert_eq!(
            classify_2d(&[-1.0, -1.0, 1.0, -1.0], TOL),
            Stability2d::StableFocus
        );
        assert_eq!(
            classify_2d(&[1.0, 0.0, 0.0, 1.0], TOL),
            Stability2d::UnstableNode
        );
        assert_eq!(
            classify_2d(&[1.0, -1.0, 1.0, 1.0], TOL),
            Stability2d::UnstableFocus
        );
        // Pure rotation: T = 0, D = 1.
        assert_eq!(classify_2d(&[0.0, -1.0, 1.0, 0.0], TOL), Stability2d::Center);
        // Rank-deficient Jacobian.
        assert_eq!(
            classify_2d(&[1.0, 0.0, 0.0, 0.0], TOL),
            Stability2d::Degenerate
        );
    }

    #[test]
    fn non_finite_jacobians_are_undetermined() {
        assert_eq!(
            classify_2d(&[f64::NAN, 0.0, 0.0, -1.0], TOL),
            Stability2d::Undetermined
        );
        assert_eq!(
            classify_2d(&[f64::INFINITY, 0.0, 0.0, -1.0], TOL),
            Stability2d::Undetermined
        );
    }
}
