//! Trajectory sampling for a batch of initial conditions.
//!
//! The engine's role is packaging: validate the batch, hold fixed
//! variables and parameters constant, hand integration to a stepper, and
//! return one time series per initial condition. The [`Steppable`] trait
//! is the seam for external integrators; the crate's tableau steppers are
//! the default runners.

use crate::error::AnalysisError;
use crate::solvers::ExplicitRk;
use crate::system::PhaseSystem;
use crate::traits::{Steppable, VectorField};
use serde::{Deserialize, Serialize};

/// Integration window: a duration from time zero, or an explicit span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpan {
    Until(f64),
    Between(f64, f64),
}

impl From<f64> for TimeSpan {
    fn from(duration: f64) -> Self {
        TimeSpan::Until(duration)
    }
}

impl From<(f64, f64)> for TimeSpan {
    fn from((start, stop): (f64, f64)) -> Self {
        TimeSpan::Between(start, stop)
    }
}

/// Which bundled stepper advances the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepperKind {
    Rk4,
    Tsit5,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectorySettings {
    pub dt: f64,
    pub stepper: StepperKind,
}

impl Default for TrajectorySettings {
    fn default() -> Self {
        Self {
            dt: 0.01,
            stepper: StepperKind::Rk4,
        }
    }
}

/// Constant additive drive applied to one dynamical variable's derivative
/// for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalInput {
    pub var: String,
    pub amount: f64,
}

/// One variable's sampled values along a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub var: String,
    pub values: Vec<f64>,
}

/// One integrated trajectory: shared time axis plus one series per
/// dynamical variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub initial: Vec<f64>,
    pub ts: Vec<f64>,
    pub series: Vec<Series>,
}

/// The analyzed system with an external drive added on top.
struct DrivenField<'a> {
    inner: &'a PhaseSystem,
    drive: Vec<f64>,
}

impl VectorField<f64> for DrivenField<'_> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        VectorField::apply(self.inner, t, x, out);
        for (value, drive) in out.iter_mut().zip(&self.drive) {
            *value = *value + drive;
        }
    }
}

/// Integrates one trajectory per initial condition. Every tuple must have
/// exactly one entry per dynamical variable; the batch is validated in
/// full before any integration starts.
pub fn run_trajectories(
    system: &PhaseSystem,
    initials: &[Vec<f64>],
    span: TimeSpan,
    inputs: &[ExternalInput],
    settings: &TrajectorySettings,
) -> Result<Vec<Trajectory>, AnalysisError> {
    let dim = system.dimension();
    for (index, initial) in initials.iter().enumerate() {
        if initial.len() != dim {
            return Err(AnalysisError::MalformedInitialCondition {
                index,
                expected: dim,
                got: initial.len(),
            });
        }
    }

    let (t_start, t_stop) = match span {
        TimeSpan::Until(duration) => (0.0, duration),
        TimeSpan::Between(start, stop) => (start, stop),
    };
    if !t_start.is_finite() || !t_stop.is_finite() || t_stop <= t_start {
        return Err(AnalysisError::InvalidDuration {
            reason: format!("span [{t_start}, {t_stop}] is empty or non-finite"),
        });
    }
    if !settings.dt.is_finite() || settings.dt <= 0.0 {
        return Err(AnalysisError::InvalidDuration {
            reason: format!("step {} must be finite and positive", settings.dt),
        });
    }

    let mut drive = vec![0.0; dim];
    for input in inputs {
        match system.var_index(&input.var) {
            Some(i) => drive[i] += input.amount,
            None => {
                return Err(AnalysisError::MissingVariable {
                    name: input.var.clone(),
                })
            }
        }
    }
    let driven = DrivenField {
        inner: system,
        drive,
    };

    let steps = ((t_stop - t_start) / settings.dt).ceil() as usize;
    let mut trajectories = Vec::with_capacity(initials.len());
    for initial in initials {
        let mut stepper = build_stepper(settings.stepper, dim);
        let mut state = initial.clone();
        let mut t = t_start;
        let mut ts = Vec::with_capacity(steps + 1);
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(steps + 1); dim];

        ts.push(t);
        for (column, &value) in columns.iter_mut().zip(&state) {
            column.push(value);
        }
        for _ in 0..steps {
            // Clip the final step so every run lands exactly on t_stop.
            let dt = settings.dt.min(t_stop - t);
            if dt <= 0.0 {
                break;
            }
            stepper.step(&driven, &mut t, &mut state, dt);
            ts.push(t);
            for (column, &value) in columns.iter_mut().zip(&state) {
                column.push(value);
            }
        }

        trajectories.push(Trajectory {
            initial: initial.clone(),
            ts,
            series: system
                .vars()
                .iter()
                .zip(columns)
                .map(|(var, values)| Series {
                    var: var.name.clone(),
                    values,
                })
                .collect(),
        });
    }
    Ok(trajectories)
}

fn build_stepper(kind: StepperKind, dim: usize) -> ExplicitRk<f64> {
    match kind {
        StepperKind::Rk4 => ExplicitRk::rk4(dim),
        StepperKind::Tsit5 => ExplicitRk::tsit5(dim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{AnalysisOptions, Model};

    fn decay_system() -> PhaseSystem {
        let model = Model::new(&[("x", "-x")], &[]).expect("model should build");
        PhaseSystem::new(
            &model,
            &[("x", (-2.0, 2.0))],
            &[],
            &[],
            AnalysisOptions::default(),
        )
        .expect("system should build")
    }

    #[test]
    fn each_initial_condition_yields_one_series_with_a_shared_time_axis() {
        let system = decay_system();
        let trajectories = run_trajectories(
            &system,
            &[vec![1.0], vec![0.5], vec![-0.25]],
            TimeSpan::Until(5.0),
            &[],
            &TrajectorySettings::default(),
        )
        .expect("batch should integrate");
        assert_eq!(trajectories.len(), 3);
        let len = trajectories[0].ts.len();
        for trajectory in &trajectories {
            assert_eq!(trajectory.ts.len(), len);
            assert_eq!(trajectory.series.len(), 1);
            assert_eq!(trajectory.series[0].values.len(), len);
            assert_eq!(trajectory.ts[0], 0.0);
            assert!((trajectory.ts[len - 1] - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn malformed_batches_fail_before_integration() {
        let system = decay_system();
        let err = run_trajectories(
            &system,
            &[vec![1.0], vec![1.0, 2.0]],
            TimeSpan::Until(1.0),
            &[],
            &TrajectorySettings::default(),
        )
        .expect_err("should fail");
        assert!(matches!(
            err,
            AnalysisError::MalformedInitialCondition {
                index: 1,
                expected: 1,
                got: 2
            }
        ));
    }

    #[test]
    fn decay_matches_the_closed_form() {
        let system = decay_system();
        let trajectories = run_trajectories(
            &system,
            &[vec![1.0]],
            TimeSpan::Until(1.0),
            &[],
            &TrajectorySettings::default(),
        )
        .expect("batch should integrate");
        let last = *trajectories[0].series[0].values.last().unwrap();
        assert!((last - (-1.0f64).exp()).abs() < 1e-6, "got {last}");
    }

    #[test]
    fn spans_start_at_the_requested_time() {
        let system = decay_system();
        let trajectories = run_trajectories(
            &system,
            &[vec![1.0]],
            TimeSpan::Between(1.0, 2.0),
            &[],
            &TrajectorySettings {
                stepper: StepperKind::Tsit5,
                ..TrajectorySettings::default()
            },
        )
        .expect("batch should integrate");
        assert_eq!(trajectories[0].ts[0], 1.0);
        assert!((trajectories[0].ts.last().unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn constant_inputs_drive_the_state() {
        let model = Model::new(&[("x", "0")], &[]).expect("model should build");
        let system = PhaseSystem::new(
            &model,
            &[("x", (-10.0, 10.0))],
            &[],
            &[],
            AnalysisOptions::default(),
        )
        .expect("system should build");
        let trajectories = run_trajectories(
            &system,
            &[vec![0.0]],
            TimeSpan::Until(1.0),
            &[ExternalInput {
                var: "x".to_string(),
                amount: 2.0,
            }],
            &TrajectorySettings::default(),
        )
        .expect("batch should integrate");
        let last = *trajectories[0].series[0].values.last().unwrap();
        assert!((last - 2.0).abs() < 1e-9, "dx/dt = 2 from 0 should reach 2: {last}");
    }

    #[test]
    fn inputs_must_name_a_dynamical_variable() {
        let system = decay_system();
        let err = run_trajectories(
            &system,
            &[vec![1.0]],
            TimeSpan::Until(1.0),
            &[ExternalInput {
                var: "w".to_string(),
                amount: 1.0,
            }],
            &TrajectorySettings::default(),
        )
        .expect_err("should fail");
        assert!(matches!(err, AnalysisError::MissingVariable { name } if name == "w"));
    }

    #[test]
    fn empty_or_inverted_spans_are_rejected() {
        let system = decay_system();
        assert!(matches!(
            run_trajectories(
                &system,
                &[vec![1.0]],
                TimeSpan::Between(2.0, 1.0),
                &[],
                &TrajectorySettings::default(),
            ),
            Err(AnalysisError::InvalidDuration { .. })
        ));
        assert!(matches!(
            run_trajectories(
                &system,
                &[vec![1.0]],
                TimeSpan::Until(1.0),
                &[],
                &TrajectorySettings {
                    dt: 0.0,
                    ..TrajectorySettings::default()
                },
            ),
            Err(AnalysisError::InvalidDuration { .. })
        ));
    }
}
