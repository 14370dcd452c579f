use std::collections::BTreeMap;

use crate::props::PropertyFile;

/// Logical identity used to submit jobs, backed in the cluster by a service
/// account plus its coupled role, role-binding and configuration secret.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceAccount {
    pub name: String,
    pub namespace: String,
    pub api_server: String,
    pub primary: bool,
    pub extra_confs: PropertyFile,
}

impl ServiceAccount {
    /// Composite id: `<namespace>:<name>`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    fn k8s_configurations(&self) -> PropertyFile {
        let props: BTreeMap<String, String> = [
            (
                "spark.kubernetes.authenticate.driver.serviceAccountName".to_string(),
                self.name.clone(),
            ),
            (
                "spark.kubernetes.namespace".to_string(),
                self.namespace.clone(),
            ),
        ]
        .into_iter()
        .collect();
        PropertyFile::from_map(props).expect("static keys are plain-valued")
    }

    /// Submission configuration for this account: its stored extra confs
    /// unioned with the derived Kubernetes-specific entries.
    pub fn configurations(&self) -> PropertyFile {
        self.extra_confs.merge(&self.k8s_configurations())
    }
}
