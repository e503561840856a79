use thiserror::Error;

/// A model constant is absent or unusable. Raised before any variable exists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required constant `{0}`")]
    Missing(&'static str),
    #[error("invalid constant `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// A professor was referenced that has no qualification record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("professor `{0}` has no qualification record")]
pub struct UnknownProfessor(pub String);

#[derive(Debug, Error)]
pub enum TimetablingError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("model is infeasible; conflicting constraints: [{}]", .conflicts.join(", "))]
    Infeasible { conflicts: Vec<String> },
    #[error("solver failed: {0}")]
    Solver(String),
    #[error("cannot interpret solution: {0}")]
    Interpretation(String),
}
