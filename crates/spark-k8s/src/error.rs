use spark_common::error::SparkError;
use thiserror::Error;

pub type SparkK8sResult<T = (), E = SparkK8sError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum SparkK8sError {
    #[error("Command failed: {command} (exit {code:?})\n{stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Service account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid service account id (expected <namespace>:<name>): {0}")]
    InvalidAccountId(String),

    #[error("Kubernetes context not found: {0}")]
    ContextNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Malformed property at {file}:{line}: {reason}")]
    MalformedProperty {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Malformed option token: {0}")]
    MalformedOption(String),

    #[error("Invalid secret data: {0}")]
    InvalidSecretData(String),

    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Invalid Kubernetes Yaml: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Runtime error: {0}")]
    RuntimeError(#[from] anyhow::Error),
}

impl From<SparkK8sError> for SparkError {
    fn from(error: SparkK8sError) -> Self {
        match error {
            SparkK8sError::CommandFailed {
                command,
                code,
                stderr,
            } => SparkError::CommandFailed {
                command,
                code,
                stderr,
            },
            SparkK8sError::AccountNotFound(e) => SparkError::AccountNotFound(e),
            SparkK8sError::InvalidAccountId(e) => SparkError::Cli(format!(
                "invalid service account id (expected <namespace>:<name>): {e}"
            )),
            SparkK8sError::ContextNotFound(e) => SparkError::ContextNotFound(e),
            SparkK8sError::FileNotFound(e) => SparkError::FileNotFound(e),
            SparkK8sError::MalformedProperty { file, line, reason } => {
                SparkError::MalformedProperty { file, line, reason }
            }
            SparkK8sError::MalformedOption(e) => SparkError::MalformedOption(e),
            SparkK8sError::InvalidSecretData(e) => SparkError::Cli(e),
            SparkK8sError::IOError(e) => SparkError::IOError(e),
            SparkK8sError::Yaml { source } => SparkError::Yaml { source },
            SparkK8sError::RuntimeError(e) => SparkError::Runtime(e),
        }
    }
}
