use std::path::PathBuf;

use fhevm_predeploy::{ErrorKind, PipelineFailure, PredeployError};

/// Error types for the fhevm-deploy commands
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Pipeline error outside of a deployment run
    #[error(transparent)]
    Predeploy(#[from] PredeployError),

    /// A deployment run stopped early
    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    /// A capability grant was included but reverted
    #[error("Capability grant denied for {grantee} on {target}")]
    CapabilityDenied {
        /// The contract
        target: String,
        /// The account that was not authorized
        grantee: String,
    },

    /// Invalid command-line input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failed to write command output or logs
    #[error("Failed to write {}: {source}", .path.display())]
    Output {
        /// Output path
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Failed to serialize command output
    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// The process exit status for this error.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 2    | invalid input |
    /// | 3    | I/O |
    /// | 4    | network or timeout |
    /// | 5    | deployment failure |
    /// | 6    | nonce drift |
    /// | 7    | capability target is not a contract |
    /// | 8    | capability denied |
    /// | 9    | stale artifact or unusable compiler output |
    /// | 130  | cancelled |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Predeploy(err) => kind_exit_code(err.kind()),
            Self::Pipeline(failure) => kind_exit_code(failure.error.kind()),
            Self::CapabilityDenied { .. } => 8,
            Self::InvalidInput(_) => 2,
            Self::Output { .. } => 3,
            Self::Json(_) => 1,
        }
    }
}

const fn kind_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidInput => 2,
        ErrorKind::Io => 3,
        ErrorKind::Network => 4,
        ErrorKind::DeploymentFailure => 5,
        ErrorKind::NonceDrift => 6,
        ErrorKind::NotAContract => 7,
        ErrorKind::Artifact => 9,
        ErrorKind::Cancelled => 130,
    }
}

/// Result type for the fhevm-deploy commands
pub type Result<T> = std::result::Result<T, DeployError>;
