use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SparkK8sError, SparkK8sResult};

/// Read-only model of a kube-config document. This system only ever reads
/// these; it never authors one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KubeConfig {
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context", default)]
    pub current_context: Option<String>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Cluster {
    pub server: String,
    #[serde(rename = "certificate-authority-data", default)]
    pub certificate_authority_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Context {
    pub cluster: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: BTreeMap<String, serde_yaml::Value>,
}

impl KubeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> SparkK8sResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                SparkK8sError::FileNotFound(path.display().to_string())
            }
            _ => SparkK8sError::IOError(e),
        })?;
        Ok(serde_yaml::from_reader(file)?)
    }

    pub fn parse(document: &str) -> SparkK8sResult<Self> {
        Ok(serde_yaml::from_str(document)?)
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.context)
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.cluster)
    }

    pub fn user(&self, name: &str) -> Option<&BTreeMap<String, serde_yaml::Value>> {
        self.users.iter().find(|u| u.name == name).map(|u| &u.user)
    }
}

/// Resolved view of one context: the context block joined with the cluster
/// and user it references. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterContext {
    pub context_name: String,
    pub cluster_name: String,
    pub user_name: Option<String>,
    pub server: String,
    pub token: Option<String>,
}

impl ClusterContext {
    pub fn resolve(config: &KubeConfig, context_name: &str) -> SparkK8sResult<Self> {
        let context = config
            .context(context_name)
            .ok_or_else(|| SparkK8sError::ContextNotFound(context_name.to_string()))?;
        let cluster = config
            .cluster(&context.cluster)
            .ok_or_else(|| SparkK8sError::ContextNotFound(context.cluster.clone()))?;
        let token = context
            .user
            .as_deref()
            .and_then(|u| config.user(u))
            .and_then(|u| u.get("token"))
            .and_then(|t| t.as_str().map(str::to_owned));

        Ok(Self {
            context_name: context_name.to_string(),
            cluster_name: context.cluster.clone(),
            user_name: context.user.clone(),
            server: cluster.server.clone(),
            token,
        })
    }
}
