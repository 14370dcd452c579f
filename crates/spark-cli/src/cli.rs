use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use spark_common::metadata::LevelFilter;
use spark_common::settings::Defaults;
use spark_common::util::tracing::setup_tracing;
use spark_k8s::exec::{CommandRunner, ProcessRunner};
use spark_k8s::KubeInterface;

use crate::error::SparkCliResult;

mod launch;
mod service_account;
mod shell;
mod submit;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[clap(short('l'), long, value_name("LEVEL"), default_value("info"))]
    pub log_level: LevelFilter,

    /// Path to the kube-config file; defaults to $KUBECONFIG or
    /// ~/.kube/config, with kubectl autodetection as a last resort.
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubernetes context to use instead of the document's current context.
    #[arg(long)]
    pub context: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Parser, Clone)]
pub enum Command {
    #[command(about = "Manage spark service accounts", alias = "sa")]
    ServiceAccount(service_account::ServiceAccountArgs),
    #[command(about = "Submit a spark job")]
    Submit(submit::SubmitArgs),
    #[command(about = "Launch an interactive spark shell")]
    Shell(shell::ShellArgs),
}

pub fn exec() -> SparkCliResult {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_tracing(Some(cli.log_level));
    let defaults = Defaults::from_env();

    match &cli.cmd {
        Command::ServiceAccount(args) => service_account::run(args.clone(), &cli, &defaults)?,
        Command::Submit(args) => submit::run(args.clone(), &cli, &defaults)?,
        Command::Shell(args) => shell::run(args.clone(), &cli, &defaults)?,
    }
    Ok(())
}

/// Build the control-plane client: explicit kube-config path first, then the
/// environment default, then autodetection through kubectl itself.
pub(crate) fn build_kube(cli: &Cli, defaults: &Defaults) -> SparkCliResult<KubeInterface> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let kubectl_cmd = defaults.kubectl_cmd();

    let client = match &cli.kubeconfig {
        Some(path) => KubeInterface::from_file(path.clone(), runner)?,
        None => {
            let path = defaults.kube_config();
            if Path::new(&path).exists() {
                KubeInterface::from_file(path, runner)?
            } else {
                KubeInterface::autodetect(cli.context.as_deref(), &kubectl_cmd, runner)?
            }
        }
    };

    let client = client.with_kubectl_cmd(&kubectl_cmd);
    Ok(match &cli.context {
        Some(context) => client.with_context(context),
        None => client,
    })
}
