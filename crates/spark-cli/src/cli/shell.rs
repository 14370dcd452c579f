use std::collections::BTreeMap;

use clap::Parser;
use spark_common::info;
use spark_common::settings::Defaults;
use spark_k8s::exec::{CommandRunner, ProcessRunner};
use spark_k8s::{K8sServiceAccountRegistry, PropertyFile};

use crate::cli::launch::{assemble_configuration, resolve_account};
use crate::cli::{build_kube, Cli};
use crate::error::SparkCliResult;

#[derive(Parser, Debug, Clone)]
pub struct ShellArgs {
    /// Account name to run the shell as.
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
}

/// Shell-session defaults generated at launch, currently the scala history
/// location.
fn shell_defaults(defaults: &Defaults) -> SparkCliResult<PropertyFile> {
    let props: BTreeMap<String, String> = [(
        "spark.driver.extraJavaOptions".to_string(),
        format!("-Dscala.shell.histfile={}", defaults.scala_history_file()),
    )]
    .into_iter()
    .collect();
    Ok(PropertyFile::from_map(props)?)
}

pub fn run(args: ShellArgs, cli: &Cli, defaults: &Defaults) -> SparkCliResult<()> {
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

    let merged = shell_defaults(defaults)?.merge(&assemble_configuration(
        &account,
        &args.conf,
        args.properties_file.as_deref(),
        defaults,
    )?);

    let conf_file = tempfile::Builder::new()
        .prefix("spark-shell-conf-")
        .suffix(".conf")
        .tempfile()?;
    merged.write_to_file(conf_file.path())?;

    let shell_args = vec![
        "--master".to_string(),
        master,
        "--properties-file".to_string(),
        conf_file.path().display().to_string(),
    ];

    info!("starting shell as {}", account.id());
    let runner = ProcessRunner;
    runner.run_attach(&defaults.spark_shell(), &shell_args)?;
    Ok(())
}
