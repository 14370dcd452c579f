use std::collections::HashMap;
use std::env;

/// Well-known paths and commands resolved from the process environment.
///
/// Built once at startup from a snapshot of the environment and passed by
/// reference into the components that need it; nothing below re-reads
/// `std::env` after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    environ: HashMap<String, String>,
}

impl Defaults {
    pub fn new(environ: HashMap<String, String>) -> Self {
        Self { environ }
    }

    /// Snapshot the ambient process environment.
    pub fn from_env() -> Self {
        Self::new(env::vars().collect())
    }

    pub fn environ(&self) -> &HashMap<String, String> {
        &self.environ
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.environ.get(name).map(String::as_str)
    }

    /// Static config properties file packaged with the client snap.
    pub fn static_conf_file(&self) -> String {
        format!("{}/conf/spark-defaults.conf", self.var("SNAP").unwrap_or(""))
    }

    /// Dynamic config properties file generated during client setup.
    pub fn dynamic_conf_file(&self) -> String {
        format!(
            "{}/spark-defaults.conf",
            self.var("SNAP_USER_DATA").unwrap_or("")
        )
    }

    /// User-provided pointer to a config properties file with overrides.
    pub fn env_conf_file(&self) -> Option<String> {
        self.var("SNAP_SPARK_ENV_CONF").map(str::to_owned)
    }

    pub fn service_account(&self) -> &str {
        "spark"
    }

    pub fn namespace(&self) -> &str {
        "default"
    }

    pub fn home_folder(&self) -> String {
        self.var("SNAP_REAL_HOME")
            .or_else(|| self.var("HOME"))
            .unwrap_or("/root")
            .to_owned()
    }

    /// Default kubeconfig to use if not explicitly provided.
    pub fn kube_config(&self) -> String {
        self.var("KUBECONFIG")
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{}/.kube/config", self.home_folder()))
    }

    pub fn kubectl_cmd(&self) -> String {
        match self.var("SNAP") {
            Some(snap) => format!("{snap}/kubectl"),
            None => "kubectl".to_owned(),
        }
    }

    pub fn scala_history_file(&self) -> String {
        format!(
            "{}/.scala_history",
            self.var("SNAP_USER_DATA").unwrap_or("")
        )
    }

    pub fn spark_submit(&self) -> String {
        format!("{}/bin/spark-submit", self.var("SNAP").unwrap_or(""))
    }

    pub fn spark_shell(&self) -> String {
        format!("{}/bin/spark-shell", self.var("SNAP").unwrap_or(""))
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::from_env()
    }
}
