//! The `phaseplane_core` crate is the analytical engine for qualitative
//! analysis of 1D/2D dynamical systems: fixed-point location and stability
//! classification, nullcline tracing, vector-field sampling, and trajectory
//! integration over a bounded window, with all other state variables held
//! fixed.
//!
//! Key components:
//! - **Equation engine**: parser, AST, and bytecode VM binding textual
//!   right-hand sides into numeric evaluators.
//! - **Symbolic solver**: closed-form roots under a time budget, with the
//!   grid-seeded numeric optimizer as the always-available fallback.
//! - **Fixed points / Nullclines / Vector field**: the analysis queries.
//! - **Solvers**: tableau-driven Runge-Kutta steppers behind the
//!   `Steppable` seam used by the trajectory sampler.

pub mod equation_engine;
pub mod error;
pub mod field;
pub mod fixed_points;
pub mod grid;
pub mod nullcline;
pub mod optimizer;
pub mod solvers;
pub mod stability;
pub mod symbolic;
pub mod system;
pub mod traits;
pub mod trajectory;

pub use error::AnalysisError;
pub use field::{sample_vector_field, LineField, PlaneField, VectorFieldSamples};
pub use fixed_points::{
    find_fixed_points, ComplexNumber, FixedPoint1d, FixedPoint2d, FixedPoints, SolveMethod,
};
pub use grid::{Grid, GridAxis, Resolution, ResolutionSpec};
pub use nullcline::{
    trace_nullclines, NullclineCurve, NullclineMethod, NullclineSettings, SweepCoords,
};
pub use optimizer::OptimizerOptions;
pub use stability::{Stability1d, Stability2d};
pub use system::{AnalysisOptions, Model, PhaseSystem, StateVar};
pub use trajectory::{
    run_trajectories, ExternalInput, Series, StepperKind, TimeSpan, Trajectory,
    TrajectorySettings,
};
