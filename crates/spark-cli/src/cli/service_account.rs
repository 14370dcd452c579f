use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use spark_common::settings::Defaults;
use spark_k8s::{K8sServiceAccountRegistry, PropertyFile, ServiceAccount};

use crate::cli::{build_kube, Cli};
use crate::error::SparkCliResult;

#[derive(Parser, Debug, Clone)]
pub struct ServiceAccountArgs {
    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Parser, Debug, Clone)]
pub enum Subcommand {
    #[command(about = "Create a service account with its role and binding")]
    Create(CreateArgs),
    #[command(about = "Delete a service account and its coupled resources")]
    Delete(IdArgs),
    #[command(about = "List managed service accounts")]
    List,
    #[command(about = "Make a service account the primary one")]
    SetPrimary(IdArgs),
    #[command(about = "Print the stored configuration of a service account")]
    GetConfig(IdArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct CreateArgs {
    /// Account name.
    #[arg(long, default_value = "spark")]
    pub username: String,

    /// Namespace to create the account in.
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Mark the new account as the primary submission account.
    #[arg(long, default_value_t = false)]
    pub primary: bool,

    /// Properties file with extra configuration to store with the account.
    #[arg(long)]
    pub properties_file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct IdArgs {
    /// Composite account id, `<namespace>:<name>`.
    pub id: String,
}

pub fn run(args: ServiceAccountArgs, cli: &Cli, defaults: &Defaults) -> SparkCliResult<()> {
    let kube = build_kube(cli, defaults)?;
    let registry = K8sServiceAccountRegistry::new(kube);

    match args.subcommand {
        Subcommand::Create(args) => {
            let extra_confs = match &args.properties_file {
                Some(path) => PropertyFile::read_with_env(path, defaults.environ())?,
                None => PropertyFile::empty(),
            };
            let api_server = registry.kube().cluster()?.server;
            let account = ServiceAccount {
                name: args.username,
                namespace: args.namespace,
                api_server,
                primary: args.primary,
                extra_confs,
            };
            let id = registry.create(&account)?;
            println!("{id}");
        }
        Subcommand::Delete(args) => {
            let id = registry.delete(&args.id)?;
            println!("{id}");
        }
        Subcommand::List => {
            for account in registry.all()? {
                let marker = if account.primary { " (primary)" } else { "" };
                println!("{}{}", account.id(), marker);
            }
        }
        Subcommand::SetPrimary(args) => {
            let id = registry.set_primary(&args.id)?;
            println!("{id}");
        }
        Subcommand::GetConfig(args) => {
            let account = registry.get(&args.id)?;
            let mut stdout = std::io::stdout();
            account.configurations().write(&mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
