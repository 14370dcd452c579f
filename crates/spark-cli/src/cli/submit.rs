use clap::Parser;
use spark_common::info;
use spark_common::settings::Defaults;
use spark_k8s::exec::{CommandRunner, ProcessRunner};
use spark_k8s::K8sServiceAccountRegistry;

use crate::cli::launch::{assemble_configuration, rendered_args, resolve_account};
use crate::cli::{build_kube, Cli};
use crate::error::SparkCliResult;

#[derive(Parser, Debug, Clone)]
pub struct SubmitArgs {
    /// Account name to submit as; defaults to the environment default.
    #[arg(long)]
    pub username: Option<String>,

    /// Namespace of the account.
    #[arg(long)]
    pub namespace: Option<String>,

    /// Configuration overrides, `key=value`, highest priority.
    #[arg(long = "conf")]
    pub conf: Vec<String>,

    /// Extra properties file layered below the CLI overrides.
    #[arg(long)]
    pub properties_file: Option<String>,

    /// Arguments passed through to spark-submit.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub fn run(args: SubmitArgs, cli: &Cli, defaults: &Defaults) -> SparkCliResult<()> {
    let kube = build_kube(cli, defaults)?;
    let registry = K8sServiceAccountRegistry::new(kube);

    let account = resolve_account(
        &registry,
        args.username.as_deref(),
        args.namespace.as_deref(),
        defaults,
    )?;
    let kube = registry.kube().select_by_master(&account.api_server)?;
    let master = format!("k8s://{}", kube.cluster()?.server);

    let merged = assemble_configuration(
        &account,
        &args.conf,
        args.properties_file.as_deref(),
        defaults,
    )?;

    // merged configuration goes through a temp properties file
    let conf_file = tempfile::Builder::new()
        .prefix("spark-conf-")
        .suffix(".conf")
        .tempfile()?;
    merged.write_to_file(conf_file.path())?;

    let mut submit_args = vec![
        "--master".to_string(),
        master,
        "--properties-file".to_string(),
        conf_file.path().display().to_string(),
    ];
    submit_args.extend(args.args.clone());

    info!("submitting as {}", account.id());
    spark_common::debug!("spark-submit {}", rendered_args(&submit_args));
    let runner = ProcessRunner;
    runner.run_attach(&defaults.spark_submit(), &submit_args)?;
    Ok(())
}
