use crate::equation_engine::{parse, Bytecode, Compiler, Expr, VM};
use crate::error::AnalysisError;
use crate::grid::{build_axis, Grid, GridAxis, ResolutionSpec};
use crate::optimizer::OptimizerOptions;
use crate::traits::{Scalar, VectorField};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

/// A declared model: one right-hand side per state variable, plus the
/// parameter set with default values. Parsing and function-name validation
/// happen here; symbol resolution waits until the analysis scope (fixed
/// variables, overrides) is known.
#[derive(Debug, Clone)]
pub struct Model {
    equations: Vec<(String, Expr)>,
    parameters: BTreeMap<String, f64>,
}

impl Model {
    pub fn new(
        equations: &[(&str, &str)],
        parameters: &[(&str, f64)],
    ) -> Result<Self, AnalysisError> {
        let mut parsed = Vec::with_capacity(equations.len());
        for (var, rhs) in equations {
            let expr = parse(rhs).map_err(|message| AnalysisError::InvalidExpression {
                text: (*rhs).to_string(),
                message,
            })?;
            expr.check_functions()
                .map_err(|message| AnalysisError::InvalidExpression {
                    text: (*rhs).to_string(),
                    message,
                })?;
            parsed.push(((*var).to_string(), expr));
        }
        Ok(Self {
            equations: parsed,
            parameters: parameters
                .iter()
                .map(|(n, v)| ((*n).to_string(), *v))
                .collect(),
        })
    }

    pub fn rhs(&self, var: &str) -> Option<&Expr> {
        self.equations
            .iter()
            .find(|(name, _)| name == var)
            .map(|(_, expr)| expr)
    }

    pub fn parameters(&self) -> &BTreeMap<String, f64> {
        &self.parameters
    }
}

/// Analysis configuration. Deserialization ignores unrecognized keys (serde
/// default behavior), so caller-supplied option dictionaries stay forward
/// compatible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Grid density: shared scalar step or per-variable step/samples.
    pub resolution: ResolutionSpec,
    /// Axis padding factor for presentation; see [`PhaseSystem::axis_limits`].
    pub lim_scale: f64,
    /// Seconds allowed for one closed-form solve attempt.
    pub symbolic_timeout: f64,
    /// Skip closed-form solving and go straight to the numeric fallback.
    pub skip_symbolic: bool,
    /// Pass-through tuning for the numeric fallback.
    pub optimizer: OptimizerOptions,
    /// Finite-difference step for derivative and Jacobian estimation.
    pub disturb: f64,
    /// Residual tolerance below which a candidate counts as a root.
    pub fl_tol: f64,
    /// Distance tolerance below which two candidates merge.
    pub xl_tol: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            resolution: ResolutionSpec::default(),
            lim_scale: 1.05,
            symbolic_timeout: 5.0,
            skip_symbolic: false,
            optimizer: OptimizerOptions::default(),
            disturb: 1e-4,
            fl_tol: 1e-6,
            xl_tol: 1e-4,
        }
    }
}

impl AnalysisOptions {
    pub(crate) fn timeout(&self) -> Duration {
        if self.symbolic_timeout.is_finite() && self.symbolic_timeout > 0.0 {
            Duration::from_secs_f64(self.symbolic_timeout)
        } else {
            Duration::ZERO
        }
    }
}

/// A dynamical variable with its closed interval domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVar {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl StateVar {
    pub fn domain(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

#[derive(Debug)]
struct BoundEquation {
    /// Compiled over (dynamical variables, scope); scope values are passed
    /// at evaluation time.
    code: Bytecode,
    /// Fully substituted right-hand side for the symbolic solver.
    bound: Expr,
}

/// An immutable 1D or 2D analysis target: dynamical variables with domains,
/// fixed variables, resolved parameters, and one bound right-hand side per
/// dynamical variable. The evaluation grid is built once at construction.
#[derive(Debug)]
pub struct PhaseSystem {
    vars: Vec<StateVar>,
    scope_names: Vec<String>,
    scope_values: Vec<f64>,
    equations: Vec<BoundEquation>,
    grid: Grid,
    options: AnalysisOptions,
    // Scratch stack for the VM. Interior mutability keeps `eval` callable
    // through a shared reference, at the cost of the system not being Sync.
    stack: RefCell<Vec<f64>>,
}

impl PhaseSystem {
    pub fn new(
        model: &Model,
        targets: &[(&str, (f64, f64))],
        fixed: &[(&str, f64)],
        overrides: &[(&str, f64)],
        options: AnalysisOptions,
    ) -> Result<Self, AnalysisError> {
        let count = targets.len();
        if count == 0 || count > 2 {
            return Err(AnalysisError::UnsupportedDimensionality { count });
        }

        for (i, (name, _)) in targets.iter().enumerate() {
            if targets[..i].iter().any(|(other, _)| other == name) {
                return Err(AnalysisError::VariableConflict {
                    name: (*name).to_string(),
                });
            }
        }
        for (name, _) in fixed {
            if targets.iter().any(|(target, _)| target == name) {
                return Err(AnalysisError::VariableConflict {
                    name: (*name).to_string(),
                });
            }
            if model.parameters.contains_key(*name) {
                return Err(AnalysisError::VariableConflict {
                    name: (*name).to_string(),
                });
            }
        }
        for (name, _) in overrides {
            if !model.parameters.contains_key(*name) {
                return Err(AnalysisError::UnknownParameter {
                    name: (*name).to_string(),
                });
            }
        }

        // Scope: declared parameters (with overrides applied), then fixed
        // variables.
        let mut resolved = model.parameters.clone();
        for (name, value) in overrides {
            resolved.insert((*name).to_string(), *value);
        }
        let mut scope_names: Vec<String> = resolved.keys().cloned().collect();
        let mut scope_values: Vec<f64> = resolved.values().copied().collect();
        for (name, value) in fixed {
            scope_names.push((*name).to_string());
            scope_values.push(*value);
        }

        let var_names: Vec<String> = targets.iter().map(|(n, _)| (*n).to_string()).collect();
        let compiler = Compiler::new(&var_names, &scope_names);

        let mut equations = Vec::with_capacity(count);
        for (name, _) in targets {
            let rhs = model.rhs(name).ok_or_else(|| AnalysisError::MissingEquation {
                name: (*name).to_string(),
            })?;
            for symbol in rhs.free_symbols() {
                let known = var_names.iter().any(|v| *v == symbol)
                    || scope_names.iter().any(|s| *s == symbol);
                if !known {
                    return Err(AnalysisError::MissingVariable { name: symbol });
                }
            }
            let mut bound = rhs.clone();
            for (scope_name, scope_value) in scope_names.iter().zip(&scope_values) {
                bound = bound.substitute(scope_name, &Expr::number(*scope_value));
            }
            equations.push(BoundEquation {
                code: compiler.compile(rhs),
                bound,
            });
        }

        let mut axes: Vec<GridAxis> = Vec::with_capacity(count);
        for (name, domain) in targets {
            let resolution = options.resolution.for_variable(name);
            axes.push(build_axis(name, *domain, &resolution)?);
        }

        Ok(Self {
            vars: targets
                .iter()
                .map(|(name, (min, max))| StateVar {
                    name: (*name).to_string(),
                    min: *min,
                    max: *max,
                })
                .collect(),
            scope_names,
            scope_values,
            equations,
            grid: Grid::new(axes),
            options,
            stack: RefCell::new(Vec::with_capacity(64)),
        })
    }

    pub fn dimension(&self) -> usize {
        self.vars.len()
    }

    pub fn var(&self, index: usize) -> &StateVar {
        &self.vars[index]
    }

    pub fn vars(&self) -> &[StateVar] {
        &self.vars
    }

    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Evaluates the `eq`-th right-hand side at `state`.
    pub fn eval(&self, eq: usize, state: &[f64]) -> f64 {
        VM::execute(
            &self.equations[eq].code,
            state,
            &self.scope_values,
            &mut self.stack.borrow_mut(),
        )
    }

    /// The fully bound right-hand side, for closed-form solving.
    pub(crate) fn bound_rhs(&self, eq: usize) -> &Expr {
        &self.equations[eq].bound
    }

    /// Display limits for one axis: the domain padded by `lim_scale`.
    /// Presentation only; no analysis consumes this.
    pub fn axis_limits(&self, index: usize) -> (f64, f64) {
        let var = &self.vars[index];
        let pad = (var.max - var.min) * (self.options.lim_scale - 1.0) / 2.0;
        (var.min - pad, var.max + pad)
    }
}

impl<T: Scalar> VectorField<T> for PhaseSystem {
    fn dimension(&self) -> usize {
        self.vars.len()
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let scope: Vec<T> = self
            .scope_values
            .iter()
            .map(|&v| T::from_f64(v).unwrap())
            .collect();
        let mut stack = Vec::with_capacity(64);
        for (i, eq) in self.equations.iter().enumerate() {
            out[i] = VM::execute(&eq.code, x, &scope, &mut stack);
        }
    }
}
