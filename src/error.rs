use remip_client::RemipError;
use thiserror::Error;

use crate::models::EntityKind;
use crate::runtime::{ScriptError, ScriptOutput};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures surfaced by the engine to tool callers
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any script ran
    #[error("{0}")]
    Validation(String),

    /// Zero or several problem objects after running model code
    #[error("{message}")]
    Discovery {
        message: String,
        stdout: String,
        stderr: String,
    },

    /// The interpreter raised while running caller code
    #[error("{message}")]
    ScriptExecution {
        message: String,
        stdout: String,
        stderr: String,
    },

    #[error("Solver request failed: {source}")]
    Transport {
        source: RemipError,
        stdout: String,
        stderr: String,
    },

    /// The solver finished without a result
    #[error("Solver failed to produce a solution.")]
    NoSolution { stdout: String, stderr: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The session was torn down while the request was in flight
    #[error("Session {0} was closed before the result could be stored")]
    SessionClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Discovery { .. } => "discovery",
            EngineError::ScriptExecution { .. } => "script_execution",
            EngineError::Transport { .. } => "transport",
            EngineError::NoSolution { .. } => "no_solution",
            EngineError::NotFound { .. } => "not_found",
            EngineError::SessionClosed(_) => "session_closed",
            EngineError::Internal(_) => "internal",
        }
    }

    /// Script output captured up to the failure, if the failure carries any
    pub fn output(&self) -> Option<(&str, &str)> {
        match self {
            EngineError::Discovery { stdout, stderr, .. }
            | EngineError::ScriptExecution { stdout, stderr, .. }
            | EngineError::Transport { stdout, stderr, .. }
            | EngineError::NoSolution { stdout, stderr } => {
                Some((stdout.as_str(), stderr.as_str()))
            }
            _ => None,
        }
    }

    /// Attach the model's output to a failure raised after the model ran
    pub fn with_output(self, output: &ScriptOutput) -> Self {
        match self {
            EngineError::Transport { source, .. } => EngineError::Transport {
                source,
                stdout: output.stdout.clone(),
                stderr: output.stderr.clone(),
            },
            EngineError::NoSolution { .. } => EngineError::NoSolution {
                stdout: output.stdout.clone(),
                stderr: output.stderr.clone(),
            },
            other => other,
        }
    }
}

impl From<RemipError> for EngineError {
    fn from(source: RemipError) -> Self {
        EngineError::Transport {
            source,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

impl From<ScriptError> for EngineError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::InvalidGlobals(msg) => EngineError::Validation(msg),
            ScriptError::Closed(session_id) => EngineError::SessionClosed(session_id),
            other => EngineError::ScriptExecution {
                message: other.to_string(),
                stdout: String::new(),
                stderr: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_globals_become_validation_errors() {
        let err: EngineError = ScriptError::InvalidGlobals("bad key".to_string()).into();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.to_string(), "bad key");
    }

    #[test]
    fn test_not_found_message() {
        let err = EngineError::not_found(EntityKind::Model, "knapsack");
        assert_eq!(err.to_string(), "Model not found: knapsack");
        assert!(err.output().is_none());
    }

    #[test]
    fn test_transport_error_keeps_model_output() {
        let output = ScriptOutput {
            stdout: "items: 2\n".to_string(),
            stderr: String::new(),
        };
        let err = EngineError::from(RemipError::EmptyBody).with_output(&output);
        assert_eq!(err.kind(), "transport");
        assert_eq!(err.output(), Some(("items: 2\n", "")));
    }
}
