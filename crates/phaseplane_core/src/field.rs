//! Raw derivative sampling over the evaluation grid.
//!
//! Expressions may be undefined on parts of the window (poles, logs of
//! negative arguments); the sampler reports those entries as non-finite
//! values in place rather than raising, and any derived normalization is
//! skipped entirely so NaN never flows through a finite-max computation.

use crate::system::PhaseSystem;
use serde::{Deserialize, Serialize};

/// Derivative samples of a one-variable system along its grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineField {
    pub x: Vec<f64>,
    pub dx: Vec<f64>,
}

/// Derivative samples of a two-variable system over the mesh, row-major
/// (`ix + iy * nx`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneField {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub dx: Vec<f64>,
    pub dy: Vec<f64>,
}

impl PlaneField {
    /// Pointwise speed `sqrt(dx^2 + dy^2)`, or `None` when any entry is
    /// non-finite. Presentation layers use this for line-width scaling and
    /// must fall back to unscaled rendering on `None`.
    pub fn speed(&self) -> Option<Vec<f64>> {
        if self
            .dx
            .iter()
            .chain(&self.dy)
            .any(|value| !value.is_finite())
        {
            return None;
        }
        Some(
            self.dx
                .iter()
                .zip(&self.dy)
                .map(|(dx, dy)| (dx * dx + dy * dy).sqrt())
                .collect(),
        )
    }
}

/// Result of a vector-field query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorFieldSamples {
    Line(LineField),
    Plane(PlaneField),
}

/// Evaluates every right-hand side over the grid (1D) or mesh (2D).
pub fn sample_vector_field(system: &PhaseSystem) -> VectorFieldSamples {
    if system.dimension() == 1 {
        let x = system.grid().samples(0).to_vec();
        let dx = x.iter().map(|&x| system.eval(0, &[x])).collect();
        return VectorFieldSamples::Line(LineField { x, dx });
    }

    let x = system.grid().samples(0).to_vec();
    let y = system.grid().samples(1).to_vec();
    let nx = x.len();
    let ny = y.len();
    let mut dx = vec![0.0; nx * ny];
    let mut dy = vec![0.0; nx * ny];
    for (iy, &yv) in y.iter().enumerate() {
        for (ix, &xv) in x.iter().enumerate() {
            dx[ix + iy * nx] = system.eval(0, &[xv, yv]);
            dy[ix + iy * nx] = system.eval(1, &[xv, yv]);
        }
    }
    VectorFieldSamples::Plane(PlaneField { x, y, dx, dy })
}
