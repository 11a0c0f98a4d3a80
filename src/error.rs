use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Terraform(#[from] crate::terraform::TerraformError),

    #[error(transparent)]
    Validation(#[from] crate::validator::ValidationError),

    #[error(transparent)]
    Value(#[from] crate::terraform::ValueError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("no instance matches {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
