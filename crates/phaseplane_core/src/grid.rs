use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default sampling step when a variable has no explicit resolution.
pub const DEFAULT_STEP: f64 = 0.1;

/// Sampling density for a single variable: a uniform step or an explicit
/// list of sample points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resolution {
    Step(f64),
    Samples(Vec<f64>),
}

/// Resolution for the whole system: one shared step, or a per-variable map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolutionSpec {
    Shared(f64),
    PerVariable(HashMap<String, Resolution>),
}

impl Default for ResolutionSpec {
    fn default() -> Self {
        ResolutionSpec::Shared(DEFAULT_STEP)
    }
}

impl ResolutionSpec {
    /// Resolution for one variable; variables absent from a per-variable
    /// map fall back to the default step.
    pub fn for_variable(&self, name: &str) -> Resolution {
        match self {
            ResolutionSpec::Shared(step) => Resolution::Step(*step),
            ResolutionSpec::PerVariable(map) => map
                .get(name)
                .cloned()
                .unwrap_or(Resolution::Step(DEFAULT_STEP)),
        }
    }
}

/// Ordered, deduplicated samples for one dynamical variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub samples: Vec<f64>,
}

/// Evaluation grid, one axis per dynamical variable. Built once per
/// analysis session and read-only thereafter; the 2D mesh is the row-major
/// outer product of the two axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    axes: Vec<GridAxis>,
}

impl Grid {
    pub fn new(axes: Vec<GridAxis>) -> Self {
        Self { axes }
    }

    pub fn axis(&self, index: usize) -> &GridAxis {
        &self.axes[index]
    }

    pub fn samples(&self, index: usize) -> &[f64] {
        &self.axes[index].samples
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }
}

/// Builds the sample axis for one variable.
///
/// A scalar step produces `min, min+r, min+2r, ...` strictly below `max`:
/// the domain maximum is excluded, mirroring the half-open sampling the
/// engine has always used. Explicit samples are used as given, but sorted,
/// deduplicated, and clipped into `[min, max]` with a warning.
pub fn build_axis(
    name: &str,
    domain: (f64, f64),
    resolution: &Resolution,
) -> Result<GridAxis, AnalysisError> {
    let (min, max) = domain;
    if !min.is_finite() || !max.is_finite() || max <= min {
        return Err(AnalysisError::InvalidDomain {
            name: name.to_string(),
        });
    }

    let samples = match resolution {
        Resolution::Step(step) => {
            if !step.is_finite() || *step <= 0.0 {
                return Err(AnalysisError::InvalidResolution {
                    name: name.to_string(),
                    reason: format!("step must be finite and positive, got {step}"),
                });
            }
            let mut out = Vec::new();
            let mut i = 0usize;
            loop {
                let x = min + *step * i as f64;
                if x >= max {
                    break;
                }
                out.push(x);
                i += 1;
            }
            out
        }
        Resolution::Samples(list) => {
            if list.is_empty() {
                return Err(AnalysisError::InvalidResolution {
                    name: name.to_string(),
                    reason: "explicit sample list is empty".to_string(),
                });
            }
            if list.iter().any(|s| !s.is_finite()) {
                return Err(AnalysisError::InvalidResolution {
                    name: name.to_string(),
                    reason: "explicit samples must be finite".to_string(),
                });
            }
            let mut clipped = 0usize;
            let mut out: Vec<f64> = list
                .iter()
                .map(|&s| {
                    if s < min || s > max {
                        clipped += 1;
                        s.clamp(min, max)
                    } else {
                        s
                    }
                })
                .collect();
            if clipped > 0 {
                log::warn!(
                    "{clipped} sample(s) for `{name}` fell outside [{min}, {max}] and were clipped"
                );
            }
            out.sort_by(|a, b| a.partial_cmp(b).expect("finite samples"));
            out.dedup();
            out
        }
    };

    Ok(GridAxis {
        name: name.to_string(),
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_sampling_is_half_open() {
        let axis = build_axis("x", (0.0, 1.0), &Resolution::Step(0.25))
            .expect("axis should build");
        assert_eq!(axis.samples, vec![0.0, 0.25, 0.5, 0.75]);
        assert!(
            *axis.samples.last().unwrap() < 1.0,
            "domain maximum must be excluded"
        );
    }

    #[test]
    fn step_larger_than_domain_keeps_the_minimum() {
        let axis = build_axis("x", (0.0, 1.0), &Resolution::Step(5.0))
            .expect("axis should build");
        assert_eq!(axis.samples, vec![0.0]);
    }

    #[test]
    fn explicit_samples_are_sorted_deduplicated_and_clipped() {
        let axis = build_axis(
            "x",
            (0.0, 1.0),
            &Resolution::Samples(vec![0.5, -2.0, 0.25, 0.5, 3.0]),
        )
        .expect("axis should build");
        assert_eq!(axis.samples, vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn bad_domains_and_resolutions_are_rejected() {
        assert!(matches!(
            build_axis("x", (1.0, 0.0), &Resolution::Step(0.1)),
            Err(AnalysisError::InvalidDomain { .. })
        ));
        assert!(matches!(
            build_axis("x", (0.0, f64::INFINITY), &Resolution::Step(0.1)),
            Err(AnalysisError::InvalidDomain { .. })
        ));
        assert!(matches!(
            build_axis("x", (0.0, 1.0), &Resolution::Step(-0.1)),
            Err(AnalysisError::InvalidResolution { .. })
        ));
        assert!(matches!(
            build_axis("x", (0.0, 1.0), &Resolution::Samples(vec![])),
            Err(AnalysisError::InvalidResolution { .. })
        ));
        assert!(matches!(
            build_axis("x", (0.0, 1.0), &Resolution::Samples(vec![f64::NAN])),
            Err(AnalysisError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn per_variable_spec_falls_back_to_default_step() {
        let mut map = HashMap::new();
        map.insert("x".to_string(), Resolution::Step(0.5));
        let spec = ResolutionSpec::PerVariable(map);
        assert_eq!(spec.for_variable("x"), Resolution::Step(0.5));
        assert_eq!(spec.for_variable("y"), Resolution::Step(DEFAULT_STEP));
    }
}
