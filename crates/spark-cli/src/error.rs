use spark_common::error::SparkError;
use thiserror::Error;

pub type SparkCliResult<T = (), E = SparkCliError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum SparkCliError {
    #[error("Unable to parse arguments: {0}")]
    Command(#[from] clap::error::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error(transparent)]
    Spark(#[from] SparkError),
}

impl From<spark_k8s::error::SparkK8sError> for SparkCliError {
    fn from(error: spark_k8s::error::SparkK8sError) -> Self {
        SparkCliError::Spark(error.into())
    }
}

impl From<std::io::Error> for SparkCliError {
    fn from(error: std::io::Error) -> Self {
        SparkCliError::Spark(SparkError::IOError(error))
    }
}

impl From<anyhow::Error> for SparkCliError {
    fn from(error: anyhow::Error) -> Self {
        SparkCliError::Runtime(error.to_string())
    }
}

impl From<SparkCliError> for SparkError {
    fn from(error: SparkCliError) -> Self {
        match error {
            SparkCliError::Command(e) => SparkError::Cli(e.to_string()),
            SparkCliError::Config(e) => SparkError::Cli(e),
            SparkCliError::Runtime(e) => SparkError::Cli(e),
            SparkCliError::Spark(e) => e,
        }
    }
}
