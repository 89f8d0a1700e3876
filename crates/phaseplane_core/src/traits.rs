use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in evaluation and
/// integration. Must support basic arithmetic, debug printing, and
/// conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A vector field over one or two free variables, with every fixed variable
/// and parameter already bound. This is the seam the analytical core
/// consumes: it never sees expressions, only evaluators.
pub trait VectorField<T: Scalar> {
    /// Number of free (dynamical) variables.
    fn dimension(&self) -> usize;

    /// Evaluates the right-hand sides at state `x` into `out`.
    /// `t` is carried for integrator compatibility; the systems analyzed
    /// here are autonomous.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A fixed-step integrator that can advance a system. External runners
/// plug in here; the crate ships tableau-driven Runge-Kutta steppers.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt, updating `t` and `state` in place.
    fn step(&mut self, system: &impl VectorField<T>, t: &mut T, state: &mut [T], dt: T);
}
