use std::process::{Command, Stdio};

use crate::error::{SparkK8sError, SparkK8sResult};

/// Narrow capability interface over external command execution. The
/// control-plane client and the registry only ever talk to the cluster
/// through this, so they can be driven by an in-memory fake in tests.
pub trait CommandRunner {
    /// Run a command and return its standard output. Non-zero exit status is
    /// a failure carrying the command line, exit code and standard error.
    fn run(&self, program: &str, args: &[String]) -> SparkK8sResult<Vec<u8>>;

    /// Run a command with inherited standard streams, for interactive
    /// wrappers (submit, shell).
    fn run_attach(&self, program: &str, args: &[String]) -> SparkK8sResult<()>;
}

pub fn render_command(program: &str, args: &[String]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Runs commands as blocking child processes. No retries: failure
/// propagates immediately to the caller.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> SparkK8sResult<Vec<u8>> {
        spark_common::debug!("running: {}", render_command(program, args));

        let output = command(program, args)
            .stdin(Stdio::null())
            .output()
            .map_err(SparkK8sError::IOError)?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(SparkK8sError::CommandFailed {
                command: render_command(program, args),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }

    fn run_attach(&self, program: &str, args: &[String]) -> SparkK8sResult<()> {
        spark_common::debug!("running attached: {}", render_command(program, args));

        let status = command(program, args)
            .status()
            .map_err(SparkK8sError::IOError)?;

        if status.success() {
            Ok(())
        } else {
            Err(SparkK8sError::CommandFailed {
                command: render_command(program, args),
                code: status.code(),
                stderr: String::new(),
            })
        }
    }
}

// Construct a `Command` from an array of arguments.
fn command(program: &str, args: &[String]) -> Command {
    let mut command = Command::new(program);
    for arg in args {
        command.arg(arg);
    }
    command
}
