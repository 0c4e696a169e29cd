use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WpdevError {
    #[error("compose file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("service not found in compose file: {0}")]
    ServiceNotFound(String),

    #[error("service '{service}' is missing required field '{field}'")]
    MissingField { service: String, field: String },

    #[error("invalid identifier '{0}': must contain only letters, digits and underscores")]
    InvalidIdentifier(String),

    #[error("the {0} variable is not set; ensure it is defined in the `.env` file")]
    MissingSecret(String),

    #[error("`{command}` returned non-zero exit code: {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl WpdevError {
    /// Process exit code for this error: a failed external command exits with
    /// that command's code, everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            WpdevError::CommandFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, WpdevError>;
