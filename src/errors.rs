/// The parameter that was rejected, its value as given, and why
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParameterError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

impl ParameterError {
    pub fn new(name: &'static str, value: impl std::fmt::Display, reason: &str) -> Self {
        Self {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for ParameterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' = '{}': {}", self.name, self.value, self.reason)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DetectionError {
    /// Contradictory, missing or ambiguous settings
    Configuration(ParameterError),

    /// Settings that are well formed but can never produce a valid run on the given data
    InfeasibleParameter(ParameterError),

    /// Broken engine invariant, the run is aborted
    Internal(String),
}

impl DetectionError {
    pub fn configuration(name: &'static str, value: impl std::fmt::Display, reason: &str) -> Self {
        Self::Configuration(ParameterError::new(name, value, reason))
    }

    pub fn infeasible(name: &'static str, value: impl std::fmt::Display, reason: &str) -> Self {
        Self::InfeasibleParameter(ParameterError::new(name, value, reason))
    }

    /// The offending parameter, if this error was caused by one
    pub fn parameter(&self) -> Option<&ParameterError> {
        match self {
            Self::Configuration(x) | Self::InfeasibleParameter(x) => Some(x),
            Self::Internal(_) => None,
        }
    }
}

impl std::error::Error for DetectionError {}

impl std::fmt::Display for DetectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(x) => write!(f, "Invalid configuration parameter {x}"),
            Self::InfeasibleParameter(x) => write!(f, "Infeasible parameter {x}"),
            Self::Internal(msg) => write!(f, "Internal error in cluster detection: {msg}"),
        }
    }
}

pub type DetectionResult<T> = Result<T, DetectionError>;
