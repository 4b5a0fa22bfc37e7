use std::fmt;

use thiserror::Error;

/// Failure of a single tool invocation. The `Display` output is exactly the
/// message placed in the `{"error": ...}` result the model sees.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Configuration(_) => "configuration",
            ToolError::Validation(_) => "validation",
            ToolError::NotFound(_) => "not_found",
            ToolError::Upstream(_) => "upstream",
            ToolError::Store(_) => "store",
            ToolError::Internal(_) => "internal",
        }
    }

    /// Maps a transport failure, keeping timeouts distinguishable in the message.
    pub fn upstream(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ToolError::Upstream(format!("{} request timed out", service))
        } else {
            ToolError::Upstream(format!("{} request failed: {}", service, err))
        }
    }

    /// Like `upstream` but without the service name, for callers that
    /// prefix the message themselves.
    pub fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ToolError::Upstream("request timed out".to_string())
        } else {
            ToolError::Upstream(err.to_string())
        }
    }
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        ToolError::Validation(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

/// Every field-level problem found in one set of tool arguments.
#[derive(Clone, Debug, Error)]
pub struct ValidationError {
    pub tool: String,
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid arguments for {}: ", self.tool)?;
        for (idx, violation) in self.violations.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.reason)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("invalid tool definition: {0}")]
    InvalidTool(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("tool loop exceeded: model requested tools for more than {limit} rounds")]
    ToolLoopExceeded { limit: usize },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("session cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable '{0}' is not set")]
    Missing(String),

    #[error("invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_field() {
        let err = ValidationError {
            tool: "create_job".to_string(),
            violations: vec![
                FieldViolation {
                    field: "company".to_string(),
                    reason: "missing required field".to_string(),
                },
                FieldViolation {
                    field: "job_fit".to_string(),
                    reason: "must be between 0 and 5".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid arguments for create_job: company: missing required field; job_fit: must be between 0 and 5"
        );
        assert!(err.mentions("job_fit"));
    }

    #[test]
    fn tool_error_displays_bare_message() {
        let err = ToolError::NotFound("Job with id 4 not found".to_string());
        assert_eq!(err.to_string(), "Job with id 4 not found");
        assert_eq!(err.kind(), "not_found");
    }
}
