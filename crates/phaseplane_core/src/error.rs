use thiserror::Error;

/// User-facing failures of the analysis engine.
///
/// Symbolic-solver failures (timeout, unsupported equation form) are
/// deliberately absent from this taxonomy: they are recovered internally by
/// the numeric fallback, and an exhausted fallback reports an empty result
/// set rather than an error.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// An equation references a symbol that is neither a dynamical variable,
    /// a fixed variable, nor a declared parameter.
    #[error("variable `{name}` is neither dynamical nor fixed; add it to the fixed variables")]
    MissingVariable { name: String },

    /// More (or fewer) dynamical variables than the engine supports.
    /// Raised at construction time, before any grid is built.
    #[error("phase-plane analysis supports 1 or 2 dynamical variables, got {count}")]
    UnsupportedDimensionality { count: usize },

    /// An initial-condition tuple does not match the dynamical-variable count.
    #[error("initial condition #{index} has {got} entries, expected {expected}")]
    MalformedInitialCondition {
        index: usize,
        expected: usize,
        got: usize,
    },

    /// A parameter override names a parameter the model never declared.
    #[error("`{name}` is not a declared parameter of the model")]
    UnknownParameter { name: String },

    /// The same name was given as both a dynamical and a fixed variable.
    #[error("`{name}` cannot be both a dynamical and a fixed variable")]
    VariableConflict { name: String },

    /// A dynamical variable has no right-hand side in the model.
    #[error("the model declares no equation for `{name}`")]
    MissingEquation { name: String },

    /// A variable domain is unusable for grid construction.
    #[error("domain of `{name}` must be finite with max > min")]
    InvalidDomain { name: String },

    /// A resolution step or explicit sample list is unusable.
    #[error("invalid resolution for `{name}`: {reason}")]
    InvalidResolution { name: String, reason: String },

    /// A right-hand-side expression failed to parse or uses an unknown function.
    #[error("failed to parse `{text}`: {message}")]
    InvalidExpression { text: String, message: String },

    /// A trajectory duration or time step is unusable.
    #[error("invalid trajectory duration or step: {reason}")]
    InvalidDuration { reason: String },

    /// A plane-only operation was invoked on a one-variable system.
    #[error("`{operation}` requires a system with two dynamical variables")]
    RequiresPlane { operation: &'static str },
}
