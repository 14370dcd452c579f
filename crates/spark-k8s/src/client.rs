use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{SparkK8sError, SparkK8sResult};
use crate::exec::CommandRunner;
use crate::kubeconfig::{Cluster, Context, KubeConfig};

/// Kinds of cluster resources this client manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    ServiceAccount,
    Role,
    RoleBinding,
    Secret,
    /// `secret generic`, for creation from literal key/value data.
    SecretGeneric,
}

impl ResourceType {
    fn tokens(&self) -> &'static [&'static str] {
        match self {
            ResourceType::ServiceAccount => &["serviceaccount"],
            ResourceType::Role => &["role"],
            ResourceType::RoleBinding => &["rolebinding"],
            ResourceType::Secret => &["secret"],
            ResourceType::SecretGeneric => &["secret", "generic"],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ResourceMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Minimal view of a cluster object as returned by `kubectl -o yaml`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct KubeResource {
    pub metadata: ResourceMetadata,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
struct ResourceList {
    #[serde(default)]
    items: Vec<KubeResource>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
struct SecretResource {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

/// Stateless-per-call façade over the control-plane CLI, bound to a
/// kube-config document, a selected context, a namespace and the kubectl
/// command to invoke. Every verb is one blocking external command; exit
/// status plus stderr is the sole success signal and stdout is parsed as
/// YAML. There is no retry at this layer.
#[derive(Clone)]
pub struct KubeInterface {
    config: Arc<KubeConfig>,
    kube_config_file: Option<PathBuf>,
    context_name: Option<String>,
    namespace: String,
    kubectl_cmd: String,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for KubeInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeInterface")
            .field("config", &self.config)
            .field("kube_config_file", &self.kube_config_file)
            .field("context_name", &self.context_name)
            .field("namespace", &self.namespace)
            .field("kubectl_cmd", &self.kubectl_cmd)
            .finish_non_exhaustive()
    }
}

impl KubeInterface {
    pub fn new(
        config: KubeConfig,
        kube_config_file: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            kube_config_file,
            context_name: None,
            namespace: "default".to_string(),
            kubectl_cmd: "kubectl".to_string(),
            runner,
        }
    }

    pub fn from_file<P: Into<PathBuf>>(
        path: P,
        runner: Arc<dyn CommandRunner>,
    ) -> SparkK8sResult<Self> {
        let path = path.into();
        let config = KubeConfig::load(&path)?;
        Ok(Self::new(config, Some(path), runner))
    }

    /// Ask the control-plane CLI itself for the effective single-context
    /// config and build a client bound to it. Used when no kube-config path
    /// is supplied.
    pub fn autodetect(
        context: Option<&str>,
        kubectl_cmd: &str,
        runner: Arc<dyn CommandRunner>,
    ) -> SparkK8sResult<Self> {
        let mut args: Vec<String> = Vec::new();
        if let Some(context) = context {
            args.push("--context".to_string());
            args.push(context.to_string());
        }
        args.extend(
            ["config", "view", "--minify", "-o", "yaml"]
                .into_iter()
                .map(str::to_owned),
        );

        let out = runner.run(kubectl_cmd, &args)?;
        let config = KubeConfig::parse(&String::from_utf8_lossy(&out))?;

        let mut client = Self::new(config, None, runner).with_kubectl_cmd(kubectl_cmd);
        if let Some(context) = context {
            client = client.with_context(context);
        }
        Ok(client)
    }

    pub fn config(&self) -> &KubeConfig {
        &self.config
    }

    pub fn kube_config_file(&self) -> Option<&PathBuf> {
        self.kube_config_file.as_ref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kubectl_cmd(&self) -> &str {
        &self.kubectl_cmd
    }

    /// Selected context name, defaulting to the document's current-context.
    pub fn context_name(&self) -> SparkK8sResult<String> {
        self.context_name
            .clone()
            .or_else(|| self.config.current_context.clone())
            .ok_or_else(|| SparkK8sError::ContextNotFound("current-context".to_string()))
    }

    /// All context names present in the document.
    pub fn available_contexts(&self) -> BTreeSet<String> {
        self.config
            .contexts
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// The context block for the selected context name.
    pub fn context(&self) -> SparkK8sResult<Context> {
        let name = self.context_name()?;
        self.config
            .context(&name)
            .cloned()
            .ok_or(SparkK8sError::ContextNotFound(name))
    }

    /// The cluster block referenced by the selected context.
    pub fn cluster(&self) -> SparkK8sResult<Cluster> {
        let context = self.context()?;
        self.config
            .cluster(&context.cluster)
            .cloned()
            .ok_or(SparkK8sError::ContextNotFound(context.cluster))
    }

    pub fn with_context(&self, name: &str) -> Self {
        let mut client = self.clone();
        client.context_name = Some(name.to_string());
        client
    }

    pub fn with_namespace(&self, namespace: &str) -> Self {
        let mut client = self.clone();
        client.namespace = namespace.to_string();
        client
    }

    pub fn with_kubectl_cmd(&self, kubectl_cmd: &str) -> Self {
        let mut client = self.clone();
        client.kubectl_cmd = kubectl_cmd.to_string();
        client
    }

    /// Find the context whose cluster server URL matches the given master
    /// endpoint; no-op when the selected context already matches.
    pub fn select_by_master(&self, master: &str) -> SparkK8sResult<Self> {
        let url = master.strip_prefix("k8s://").unwrap_or(master);

        if let Ok(cluster) = self.cluster() {
            if cluster.server == url {
                return Ok(self.clone());
            }
        }

        for context in &self.config.contexts {
            if let Some(cluster) = self.config.cluster(&context.context.cluster) {
                if cluster.server == url {
                    return Ok(self.with_context(&context.name));
                }
            }
        }
        Err(SparkK8sError::ContextNotFound(url.to_string()))
    }

    fn base_args(&self, namespace: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.kube_config_file {
            args.push("--kubeconfig".to_string());
            args.push(path.display().to_string());
        }
        if let Ok(context) = self.context_name() {
            args.push("--context".to_string());
            args.push(context);
        }
        args.push("--namespace".to_string());
        args.push(namespace.to_string());
        args
    }

    fn exec(&self, args: Vec<String>) -> SparkK8sResult<Vec<u8>> {
        self.runner.run(&self.kubectl_cmd, &args)
    }

    /// List service accounts matching a conjunctive set of label selectors.
    /// The command's own context namespace is pinned to `default`; the actual
    /// filter namespace goes in a separate flag.
    pub fn get_service_accounts(
        &self,
        namespace: Option<&str>,
        labels: &[String],
    ) -> SparkK8sResult<Vec<KubeResource>> {
        let mut args = self.base_args("default");
        args.push("get".to_string());
        args.push("serviceaccount".to_string());
        for label in labels {
            args.push("-l".to_string());
            args.push(label.clone());
        }
        if let Some(namespace) = namespace {
            args.push("-n".to_string());
            args.push(namespace.to_string());
        }
        args.push("-o".to_string());
        args.push("yaml".to_string());

        let out = self.exec(args)?;
        if out.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let list: ResourceList = serde_yaml::from_slice(&out)?;
        Ok(list.items)
    }

    /// Fetch one secret with every `data` value base64-decoded to text.
    /// Returns `None` when the secret does not exist.
    pub fn get_secret(
        &self,
        name: &str,
        namespace: &str,
    ) -> SparkK8sResult<Option<BTreeMap<String, String>>> {
        let mut args = self.base_args(namespace);
        args.extend(
            ["get", "secret", name, "--ignore-not-found", "-o", "yaml"]
                .into_iter()
                .map(str::to_owned),
        );

        let out = self.exec(args)?;
        if out.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let secret: SecretResource = serde_yaml::from_slice(&out)?;

        let mut data = BTreeMap::new();
        for (key, value) in secret.data {
            let decoded = STANDARD
                .decode(value.trim())
                .map_err(|e| SparkK8sError::InvalidSecretData(format!("{key}: {e}")))?;
            let text = String::from_utf8(decoded)
                .map_err(|e| SparkK8sError::InvalidSecretData(format!("{key}: {e}")))?;
            data.insert(key, text);
        }
        Ok(Some(data))
    }

    /// Apply one label to one resource, or remove it when the label string
    /// ends in `-`. Idempotent.
    pub fn set_label(
        &self,
        resource_type: ResourceType,
        resource_name: &str,
        label: &str,
        namespace: &str,
    ) -> SparkK8sResult<()> {
        let mut args = self.base_args(namespace);
        args.push("label".to_string());
        args.extend(resource_type.tokens().iter().map(|t| t.to_string()));
        args.push(resource_name.to_string());
        args.push(label.to_string());
        args.push("--overwrite".to_string());

        self.exec(args).map(|_| ())
    }

    /// Create a resource. List-valued properties are repeated as separate
    /// flag occurrences. Returns the created resource's name.
    pub fn create(
        &self,
        resource_type: ResourceType,
        resource_name: &str,
        namespace: &str,
        properties: &BTreeMap<String, Vec<String>>,
    ) -> SparkK8sResult<String> {
        let mut args = self.base_args(namespace);
        args.push("create".to_string());
        args.extend(resource_type.tokens().iter().map(|t| t.to_string()));
        args.push(resource_name.to_string());
        for (key, values) in properties {
            for value in values {
                args.push(format!("--{key}={value}"));
            }
        }

        self.exec(args)?;
        Ok(resource_name.to_string())
    }

    /// Delete a resource, tolerant of it being already absent.
    pub fn delete(
        &self,
        resource_type: ResourceType,
        resource_name: &str,
        namespace: &str,
    ) -> SparkK8sResult<()> {
        let mut args = self.base_args(namespace);
        args.push("delete".to_string());
        args.extend(resource_type.tokens().iter().map(|t| t.to_string()));
        args.push(resource_name.to_string());
        args.push("--ignore-not-found".to_string());

        self.exec(args).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::FakeRunner;

    const THREE_CONTEXT_YAML: &str = r#"
apiVersion: v1
clusters:
- cluster:
    server: https://10.1.0.1:16443
  name: cluster-1
- cluster:
    server: https://10.1.0.2:16443
  name: cluster-2
- cluster:
    server: https://10.1.0.3:16443
  name: cluster-3
contexts:
- context:
    cluster: cluster-1
    user: admin-1
  name: c1
- context:
    cluster: cluster-2
    user: admin-2
  name: c2
- context:
    cluster: cluster-3
    user: admin-3
  name: c3
current-context: c2
users:
- name: admin-1
  user:
    token: token-1
- name: admin-2
  user:
    token: token-2
- name: admin-3
  user:
    token: token-3
"#;

    fn client(runner: Arc<FakeRunner>) -> KubeInterface {
        let config = KubeConfig::parse(THREE_CONTEXT_YAML).unwrap();
        KubeInterface::new(config, Some(PathBuf::from("/home/user/.kube/config")), runner)
    }

    #[test]
    fn test_context_resolution() {
        let client = client(Arc::new(FakeRunner::new()));
        assert_eq!(client.context_name().unwrap(), "c2");
        assert_eq!(client.with_context("c3").context_name().unwrap(), "c3");
        assert_eq!(client.available_contexts().len(), 3);
        assert_eq!(client.with_namespace("spark").namespace(), "spark");
        // derivation leaves the original untouched
        assert_eq!(client.context_name().unwrap(), "c2");
        assert_eq!(client.namespace(), "default");
    }

    #[test]
    fn test_cluster_follows_selected_context() {
        let client = client(Arc::new(FakeRunner::new()));
        assert_eq!(client.cluster().unwrap().server, "https://10.1.0.2:16443");
        assert_eq!(
            client.with_context("c1").cluster().unwrap().server,
            "https://10.1.0.1:16443"
        );
    }

    #[test]
    fn test_select_by_master() {
        let client = client(Arc::new(FakeRunner::new()));
        // already matching: same context retained
        let same = client.select_by_master("k8s://https://10.1.0.2:16443").unwrap();
        assert_eq!(same.context_name().unwrap(), "c2");

        let other = client.select_by_master("https://10.1.0.3:16443").unwrap();
        assert_eq!(other.context_name().unwrap(), "c3");

        let err = client.select_by_master("https://10.9.9.9:443").unwrap_err();
        assert!(matches!(err, SparkK8sError::ContextNotFound(_)));
    }

    #[test]
    fn test_get_service_accounts_parses_items() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond(
            "get serviceaccount",
            r#"
apiVersion: v1
kind: List
items:
- metadata:
    name: spark
    namespace: default
    labels:
      app.kubernetes.io/managed-by: spark-client
      app.kubernetes.io/spark-client-primary: "1"
- metadata:
    name: other
    namespace: default
    labels:
      app.kubernetes.io/managed-by: spark-client
"#,
        );
        let client = client(runner.clone());

        let accounts = client
            .get_service_accounts(
                Some("default"),
                &["app.kubernetes.io/managed-by=spark-client".to_string()],
            )
            .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].metadata.name, "spark");
        assert!(accounts[0]
            .metadata
            .labels
            .contains_key("app.kubernetes.io/spark-client-primary"));

        let call = &runner.calls()[0];
        assert!(call.contains("--namespace default"));
        assert!(call.contains("-l app.kubernetes.io/managed-by=spark-client"));
        assert!(call.contains("-n default"));
        assert!(call.contains("--context c2"));
    }

    #[test]
    fn test_get_service_accounts_empty_list() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("get serviceaccount", "apiVersion: v1\nkind: List\nitems: []\n");
        let client = client(runner);
        assert!(client.get_service_accounts(None, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_get_secret_decodes_data() {
        let runner = Arc::new(FakeRunner::new());
        // ZGVtbw== is "demo"
        runner.respond(
            "get secret",
            "apiVersion: v1\nkind: Secret\ndata:\n  spark.app.name: ZGVtbw==\n",
        );
        let client = client(runner);

        let data = client
            .get_secret("spark-client-sa-conf-spark", "default")
            .unwrap()
            .unwrap();
        assert_eq!(data.get("spark.app.name").map(String::as_str), Some("demo"));
    }

    #[test]
    fn test_get_secret_tolerates_not_found() {
        let runner = Arc::new(FakeRunner::new());
        let client = client(runner.clone());

        let secret = client.get_secret("spark-client-sa-conf-x", "default").unwrap();
        assert!(secret.is_none());
        assert!(runner.calls()[0].contains("--ignore-not-found"));
    }

    #[test]
    fn test_create_repeats_list_valued_properties() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond(
            "create role",
            "role.rbac.authorization.k8s.io/spark-role created\n",
        );
        let client = client(runner.clone());

        let properties: BTreeMap<String, Vec<String>> = [
            (
                "resource".to_string(),
                vec!["pods".to_string(), "configmaps".to_string()],
            ),
            ("verb".to_string(), vec!["get".to_string()]),
        ]
        .into_iter()
        .collect();
        let name = client
            .create(ResourceType::Role, "spark-role", "default", &properties)
            .unwrap();
        assert_eq!(name, "spark-role");

        let call = &runner.calls()[0];
        assert!(call.contains("create role spark-role"));
        assert!(call.contains("--resource=pods --resource=configmaps"));
        assert!(call.contains("--verb=get"));
    }

    #[test]
    fn test_command_failure_propagates() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond_err("delete serviceaccount", "error: the server could not be reached");
        let client = client(runner);

        let err = client
            .delete(ResourceType::ServiceAccount, "spark", "default")
            .unwrap_err();
        assert!(matches!(err, SparkK8sError::CommandFailed { .. }));
    }

    #[test]
    fn test_autodetect_builds_client_from_cli_config() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("config view", THREE_CONTEXT_YAML);

        let client = KubeInterface::autodetect(Some("c1"), "kubectl", runner.clone()).unwrap();
        assert_eq!(client.context_name().unwrap(), "c1");
        assert_eq!(client.kubectl_cmd(), "kubectl");
        assert!(client.kube_config_file().is_none());

        let call = &runner.calls()[0];
        assert!(call.contains("--context c1"));
        assert!(call.contains("config view --minify -o yaml"));
    }
}
