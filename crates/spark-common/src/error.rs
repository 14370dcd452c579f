pub type SparkResult<T = (), E = SparkError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SparkError {
    #[error("CLI error: {0}")]
    Cli(String),
    #[error("Runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
    #[error("Command error: {0}")]
    IOError(#[from] std::io::Error),
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
    #[error("Command failed: {command} (exit {code:?})\n{stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Service account not found: {0}")]
    AccountNotFound(String),
    #[error("Kubernetes context not found: {0}")]
    ContextNotFound(String),

    #[error("Invalid Kubernetes Yaml: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}

impl From<Box<dyn std::error::Error>> for SparkError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        SparkError::Runtime(anyhow::anyhow!("{:#?}", err))
    }
}
