use thiserror::Error;

/// Failures of the init/apply workflow and of state decoding.
///
/// Diagnostics are carried verbatim so test reports show exactly what terraform printed.
#[derive(Debug, Error)]
pub enum TerraformError {
    /// A required variable was omitted and the module declares no default.
    #[error("missing required variable: {name}")]
    MissingVariable { name: String },

    /// Apply exited non-zero for any other reason.
    #[error("terraform apply failed:\n{diagnostics}")]
    ApplyFailed { diagnostics: String },

    #[error("terraform init failed:\n{diagnostics}")]
    InitFailed { diagnostics: String },

    /// Raw output did not have the shape of a terraform state.
    #[error("malformed state: {0}")]
    MalformedState(String),

    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TerraformError {
    pub fn is_missing_variable(&self, expected: &str) -> bool {
        matches!(self, TerraformError::MissingVariable { name } if name == expected)
    }
}
