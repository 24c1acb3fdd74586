use crate::value::Value;
use thiserror::Error;

/// Result type for aspect operations
pub type Result<T> = std::result::Result<T, AspectError>;

/// Errors raised while wrapping or invoking aspected targets
#[derive(Error, Debug)]
pub enum AspectError {
    /// Malformed or unresolvable declaration, or invalid settings. Raised at wrap time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A declared argument was not supplied by the caller
    #[error("Missing argument '{argument}' for predicate '{predicate}'")]
    MissingArgument { predicate: String, argument: String },

    /// Precondition predicate returned a falsy value
    #[error("Precondition '{predicate}' failed, args: {}", format_args_tuple(.args))]
    PreconditionViolation { predicate: String, args: Vec<Value> },

    /// Postcondition predicate returned a falsy value
    #[error("Postcondition '{predicate}' failed, args: {}", format_args_tuple(.args))]
    PostconditionViolation { predicate: String, args: Vec<Value> },

    /// Call does not match the target's declared parameter shape
    #[error("Signature mismatch calling '{target}': {message}")]
    Signature { target: String, message: String },

    /// Recursive handle invoked before binding or after the wrapper was dropped
    #[error("Recursive handle for '{0}' is not bound")]
    Unbound(String),

    /// Error raised by the wrapped behavior itself
    #[error(transparent)]
    Target(#[from] anyhow::Error),
}

impl AspectError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a missing argument error
    pub fn missing_argument(predicate: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::MissingArgument {
            predicate: predicate.into(),
            argument: argument.into(),
        }
    }

    /// Create a signature mismatch error
    pub fn signature(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Signature {
            target: target.into(),
            message: message.into(),
        }
    }

    /// True for precondition and postcondition violations
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::PreconditionViolation { .. } | Self::PostconditionViolation { .. }
        )
    }
}

fn format_args_tuple(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_message_carries_predicate_and_args() {
        let err = AspectError::PreconditionViolation {
            predicate: "is_positive".to_string(),
            args: vec![Value::Int(-1), Value::Int(100)],
        };
        assert_eq!(
            err.to_string(),
            "Precondition 'is_positive' failed, args: (-1, 100)"
        );
        assert!(err.is_contract_violation());
    }

    #[test]
    fn target_errors_are_transparent() {
        let err: AspectError = anyhow::anyhow!("division by zero").into();
        assert_eq!(err.to_string(), "division by zero");
        assert!(!err.is_contract_violation());
    }
}
