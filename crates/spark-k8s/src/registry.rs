use std::collections::BTreeMap;

use spark_common::info;

use crate::account::ServiceAccount;
use crate::client::{KubeInterface, KubeResource, ResourceType};
use crate::error::{SparkK8sError, SparkK8sResult};
use crate::props::PropertyFile;

/// Marker label identifying resources managed by this registry.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Marker label identifying the default submission account within a scope.
pub const PRIMARY_LABEL: &str = "app.kubernetes.io/spark-client-primary";

const MANAGER: &str = "spark-client";
const SECRET_NAME_PREFIX: &str = "spark-client-sa-conf";

const ROLE_RESOURCES: &[&str] = &["pods", "configmaps", "services"];
const ROLE_VERBS: &[&str] = &["create", "get", "list", "watch", "delete"];

fn managed_by_selector() -> String {
    format!("{MANAGED_BY_LABEL}={MANAGER}")
}

fn role_name(account_name: &str) -> String {
    format!("{account_name}-role")
}

fn role_binding_name(account_name: &str) -> String {
    format!("{account_name}-role-binding")
}

fn secret_name(account_name: &str) -> String {
    format!("{SECRET_NAME_PREFIX}-{account_name}")
}

fn parse_id(id: &str) -> SparkK8sResult<(String, String)> {
    match id.split_once(':') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
            Ok((namespace.to_string(), name.to_string()))
        }
        _ => Err(SparkK8sError::InvalidAccountId(id.to_string())),
    }
}

/// Service-account lifecycle over the cluster. Holds no identity state of
/// its own: every call re-reads authoritative state through the client.
///
/// The primary-marker bookkeeping is a read-then-write sequence with no
/// locking, so two concurrent mutations can transiently leave zero or
/// several accounts marked primary. The invariant is restored by the next
/// `create(primary)` or `set_primary`, which demote every marked account
/// before promoting the target.
pub struct K8sServiceAccountRegistry {
    kube: KubeInterface,
}

impl K8sServiceAccountRegistry {
    pub fn new(kube: KubeInterface) -> Self {
        Self { kube }
    }

    pub fn kube(&self) -> &KubeInterface {
        &self.kube
    }

    /// Every identity carrying the ownership label, with its stored
    /// configuration attached. Primary flag comes strictly from label
    /// presence.
    pub fn all(&self) -> SparkK8sResult<Vec<ServiceAccount>> {
        let resources = self
            .kube
            .get_service_accounts(None, &[managed_by_selector()])?;
        resources
            .iter()
            .map(|r| self.to_service_account(r))
            .collect()
    }

    /// Resolve one identity by its composite id.
    pub fn get(&self, id: &str) -> SparkK8sResult<ServiceAccount> {
        let (namespace, name) = parse_id(id)?;
        let resources = self
            .kube
            .get_service_accounts(Some(&namespace), &[managed_by_selector()])?;
        resources
            .iter()
            .find(|r| r.metadata.name == name)
            .map(|r| self.to_service_account(r))
            .transpose()?
            .ok_or_else(|| SparkK8sError::AccountNotFound(id.to_string()))
    }

    /// Create an identity with its coupled role, role-binding and (when it
    /// has extra configuration) secret, then settle the primary marker.
    ///
    /// Not atomic: a failure partway through leaves the resources created so
    /// far in place. Each step tolerates re-running, so callers retry the
    /// whole call or clean up with `delete`.
    pub fn create(&self, service_account: &ServiceAccount) -> SparkK8sResult<String> {
        let name = &service_account.name;
        let namespace = &service_account.namespace;

        self.kube
            .create(ResourceType::ServiceAccount, name, namespace, &BTreeMap::new())?;

        let role_properties: BTreeMap<String, Vec<String>> = [
            (
                "resource".to_string(),
                ROLE_RESOURCES.iter().map(|r| r.to_string()).collect(),
            ),
            (
                "verb".to_string(),
                ROLE_VERBS.iter().map(|v| v.to_string()).collect(),
            ),
        ]
        .into_iter()
        .collect();
        self.kube
            .create(ResourceType::Role, &role_name(name), namespace, &role_properties)?;

        let binding_properties: BTreeMap<String, Vec<String>> = [
            ("role".to_string(), vec![role_name(name)]),
            (
                "serviceaccount".to_string(),
                vec![format!("{namespace}:{name}")],
            ),
        ]
        .into_iter()
        .collect();
        self.kube.create(
            ResourceType::RoleBinding,
            &role_binding_name(name),
            namespace,
            &binding_properties,
        )?;

        self.kube.set_label(
            ResourceType::ServiceAccount,
            name,
            &managed_by_selector(),
            namespace,
        )?;
        self.kube.set_label(
            ResourceType::RoleBinding,
            &role_binding_name(name),
            &managed_by_selector(),
            namespace,
        )?;

        if service_account.primary {
            self.demote_all(namespace)?;
            self.promote(name, namespace)?;
        }

        if !service_account.extra_confs.is_empty() {
            self.create_account_configurations(service_account)?;
        }

        info!("created service account {}", service_account.id());
        Ok(service_account.id())
    }

    /// Delete the role-binding, role, identity and companion secret, in that
    /// order. Each deletion tolerates the resource being already absent, so
    /// the sequence is safe to re-run to completion after a partial failure.
    pub fn delete(&self, id: &str) -> SparkK8sResult<String> {
        let (namespace, name) = parse_id(id)?;

        self.kube
            .delete(ResourceType::RoleBinding, &role_binding_name(&name), &namespace)?;
        self.kube
            .delete(ResourceType::Role, &role_name(&name), &namespace)?;
        self.kube
            .delete(ResourceType::ServiceAccount, &name, &namespace)?;
        self.kube
            .delete(ResourceType::Secret, &secret_name(&name), &namespace)?;

        info!("deleted service account {id}");
        Ok(id.to_string())
    }

    /// Reassign the primary marker to the given identity. The target must
    /// exist; nothing is mutated otherwise. Every currently-marked identity
    /// is demoted first, which also heals a multi-primary state left behind
    /// by a prior race.
    pub fn set_primary(&self, id: &str) -> SparkK8sResult<String> {
        let (namespace, name) = parse_id(id)?;

        let resources = self
            .kube
            .get_service_accounts(None, &[managed_by_selector()])?;
        let target = resources.iter().find(|r| {
            r.metadata.name == name && r.metadata.namespace.as_deref() == Some(namespace.as_str())
        });
        if target.is_none() {
            return Err(SparkK8sError::AccountNotFound(id.to_string()));
        }

        for resource in resources
            .iter()
            .filter(|r| r.metadata.labels.contains_key(PRIMARY_LABEL))
        {
            let resource_namespace = resource
                .metadata
                .namespace
                .as_deref()
                .unwrap_or("default")
                .to_string();
            self.demote(&resource.metadata.name, &resource_namespace)?;
        }
        self.promote(&name, &namespace)?;

        info!("set primary service account {id}");
        Ok(id.to_string())
    }

    /// The identity's stored configuration, or an empty property file when
    /// no companion secret exists.
    pub fn retrieve_account_configurations(
        &self,
        name: &str,
        namespace: &str,
    ) -> SparkK8sResult<PropertyFile> {
        match self.kube.get_secret(&secret_name(name), namespace)? {
            Some(data) => PropertyFile::from_map(data),
            None => Ok(PropertyFile::empty()),
        }
    }

    fn to_service_account(&self, resource: &KubeResource) -> SparkK8sResult<ServiceAccount> {
        let name = resource.metadata.name.clone();
        let namespace = resource
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let primary = resource.metadata.labels.contains_key(PRIMARY_LABEL);
        let api_server = self.kube.cluster()?.server;
        let extra_confs = self.retrieve_account_configurations(&name, &namespace)?;

        Ok(ServiceAccount {
            name,
            namespace,
            api_server,
            primary,
            extra_confs,
        })
    }

    fn create_account_configurations(
        &self,
        service_account: &ServiceAccount,
    ) -> SparkK8sResult<()> {
        let literals: Vec<String> = service_account
            .extra_confs
            .to_map()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let properties: BTreeMap<String, Vec<String>> =
            [("from-literal".to_string(), literals)].into_iter().collect();

        self.kube
            .create(
                ResourceType::SecretGeneric,
                &secret_name(&service_account.name),
                &service_account.namespace,
                &properties,
            )
            .map(|_| ())
    }

    /// Remove the primary label from every managed identity in the namespace
    /// that carries it.
    fn demote_all(&self, namespace: &str) -> SparkK8sResult<()> {
        let resources = self
            .kube
            .get_service_accounts(Some(namespace), &[managed_by_selector()])?;
        for resource in resources
            .iter()
            .filter(|r| r.metadata.labels.contains_key(PRIMARY_LABEL))
        {
            self.demote(&resource.metadata.name, namespace)?;
        }
        Ok(())
    }

    fn demote(&self, name: &str, namespace: &str) -> SparkK8sResult<()> {
        let removal = format!("{PRIMARY_LABEL}-");
        self.kube
            .set_label(ResourceType::ServiceAccount, name, &removal, namespace)?;
        self.kube.set_label(
            ResourceType::RoleBinding,
            &role_binding_name(name),
            &removal,
            namespace,
        )
    }

    fn promote(&self, name: &str, namespace: &str) -> SparkK8sResult<()> {
        let marker = format!("{PRIMARY_LABEL}=1");
        self.kube
            .set_label(ResourceType::ServiceAccount, name, &marker, namespace)?;
        self.kube.set_label(
            ResourceType::RoleBinding,
            &role_binding_name(name),
            &marker,
            namespace,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::exec::fake::FakeRunner;
    use crate::kubeconfig::KubeConfig;

    const KUBECONFIG_YAML: &str = r#"
apiVersion: v1
clusters:
- cluster:
    server: https://10.1.0.1:16443
  name: cluster-1
contexts:
- context:
    cluster: cluster-1
    user: admin
  name: c1
current-context: c1
users:
- name: admin
  user:
    token: secret-token
"#;

    fn registry(runner: Arc<FakeRunner>) -> K8sServiceAccountRegistry {
        let config = KubeConfig::parse(KUBECONFIG_YAML).unwrap();
        let kube = KubeInterface::new(
            config,
            Some(PathBuf::from("/home/user/.kube/config")),
            runner,
        );
        K8sServiceAccountRegistry::new(kube)
    }

    fn account(name: &str, primary: bool) -> ServiceAccount {
        ServiceAccount {
            name: name.to_string(),
            namespace: "default".to_string(),
            api_server: "https://10.1.0.1:16443".to_string(),
            primary,
            extra_confs: PropertyFile::empty(),
        }
    }

    const TWO_ACCOUNT_LIST: &str = r#"
apiVersion: v1
kind: List
items:
- metadata:
    name: sa1
    namespace: default
    labels:
      app.kubernetes.io/managed-by: spark-client
      app.kubernetes.io/spark-client-primary: "true"
- metadata:
    name: sa3
    namespace: default
    labels:
      app.kubernetes.io/managed-by: spark-client
"#;

    #[test]
    fn test_all_on_empty_scope() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("get serviceaccount", "items: []\n");
        let registry = registry(runner);
        assert!(registry.all().unwrap().is_empty());
    }

    #[test]
    fn test_all_maps_primary_from_labels() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("get serviceaccount", TWO_ACCOUNT_LIST);
        let registry = registry(runner);

        let accounts = registry.all().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "sa1");
        assert!(accounts[0].primary);
        assert_eq!(accounts[1].name, "sa3");
        assert!(!accounts[1].primary);
        assert_eq!(accounts[0].api_server, "https://10.1.0.1:16443");
        assert_eq!(accounts[0].id(), "default:sa1");
    }

    #[test]
    fn test_all_attaches_secret_configurations() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("get serviceaccount", TWO_ACCOUNT_LIST);
        // ZGVtbw== is "demo"
        runner.respond(
            "get secret spark-client-sa-conf-sa1",
            "data:\n  spark.app.name: ZGVtbw==\n",
        );
        let registry = registry(runner);

        let accounts = registry.all().unwrap();
        assert_eq!(
            accounts[0].extra_confs.get("spark.app.name").as_deref(),
            Some("demo")
        );
        assert!(accounts[1].extra_confs.is_empty());
    }

    #[test]
    fn test_create_issues_coupled_resources_and_labels() {
        let runner = Arc::new(FakeRunner::new());
        let registry = registry(runner.clone());

        let id = registry.create(&account("sa2", false)).unwrap();
        assert_eq!(id, "default:sa2");

        let calls = runner.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls[0].contains("create serviceaccount sa2"));
        assert!(calls[1].contains("create role sa2-role"));
        assert!(calls[1].contains("--resource=pods --resource=configmaps --resource=services"));
        assert!(calls[1].contains("--verb=create --verb=get --verb=list --verb=watch --verb=delete"));
        assert!(calls[2].contains("create rolebinding sa2-role-binding"));
        assert!(calls[2].contains("--role=sa2-role"));
        assert!(calls[2].contains("--serviceaccount=default:sa2"));
        assert!(calls[3].contains(
            "label serviceaccount sa2 app.kubernetes.io/managed-by=spark-client"
        ));
        assert!(calls[4].contains(
            "label rolebinding sa2-role-binding app.kubernetes.io/managed-by=spark-client"
        ));
    }

    #[test]
    fn test_create_primary_demotes_previous_primary() {
        let runner = Arc::new(FakeRunner::new());
        // sa1 currently primary in scope; sa3 being created
        runner.respond("get serviceaccount", TWO_ACCOUNT_LIST);
        let registry = registry(runner.clone());

        registry.create(&account("sa3", true)).unwrap();

        let calls = runner.calls();
        let demotions: Vec<&String> = calls
            .iter()
            .filter(|c| c.contains("app.kubernetes.io/spark-client-primary-"))
            .collect();
        assert_eq!(demotions.len(), 2);
        assert!(demotions[0].contains("label serviceaccount sa1"));
        assert!(demotions[1].contains("label rolebinding sa1-role-binding"));

        let promotions: Vec<&String> = calls
            .iter()
            .filter(|c| c.contains("app.kubernetes.io/spark-client-primary=1"))
            .collect();
        assert_eq!(promotions.len(), 2);
        assert!(promotions[0].contains("label serviceaccount sa3"));
        assert!(promotions[1].contains("label rolebinding sa3-role-binding"));
    }

    #[test]
    fn test_create_with_extra_confs_creates_secret() {
        let runner = Arc::new(FakeRunner::new());
        let registry = registry(runner.clone());

        let mut sa = account("sa4", false);
        sa.extra_confs = PropertyFile::from_map(
            [("spark.app.name".to_string(), "demo".to_string())]
                .into_iter()
                .collect(),
        )
        .unwrap();
        registry.create(&sa).unwrap();

        let secret_call = runner
            .calls()
            .into_iter()
            .find(|c| c.contains("create secret generic"))
            .unwrap();
        assert!(secret_call.contains("create secret generic spark-client-sa-conf-sa4"));
        assert!(secret_call.contains("--from-literal=spark.app.name=demo"));
    }

    #[test]
    fn test_set_primary_missing_target_mutates_nothing() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("get serviceaccount", TWO_ACCOUNT_LIST);
        let registry = registry(runner.clone());

        let err = registry.set_primary("default:missing").unwrap_err();
        assert!(matches!(err, SparkK8sError::AccountNotFound(_)));

        // only the listing ran; no label mutation was issued
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("get serviceaccount"));
    }

    #[test]
    fn test_set_primary_demotes_all_marked_accounts() {
        let runner = Arc::new(FakeRunner::new());
        // inconsistent prior state: two accounts both carry the marker
        runner.respond(
            "get serviceaccount",
            r#"
items:
- metadata:
    name: sa1
    namespace: default
    labels:
      app.kubernetes.io/managed-by: spark-client
      app.kubernetes.io/spark-client-primary: "true"
- metadata:
    name: sa2
    namespace: default
    labels:
      app.kubernetes.io/managed-by: spark-client
      app.kubernetes.io/spark-client-primary: "true"
- metadata:
    name: sa3
    namespace: default
    labels:
      app.kubernetes.io/managed-by: spark-client
"#,
        );
        let registry = registry(runner.clone());

        let id = registry.set_primary("default:sa3").unwrap();
        assert_eq!(id, "default:sa3");

        let calls = runner.calls();
        let demotions: Vec<&String> = calls
            .iter()
            .filter(|c| c.contains("app.kubernetes.io/spark-client-primary-"))
            .collect();
        assert_eq!(demotions.len(), 4); // sa1 and sa2, identity plus role-binding

        let promotions: Vec<&String> = calls
            .iter()
            .filter(|c| c.contains("app.kubernetes.io/spark-client-primary=1"))
            .collect();
        assert_eq!(promotions.len(), 2);
        assert!(promotions[0].contains("serviceaccount sa3"));
    }

    #[test]
    fn test_delete_issues_four_tolerant_deletions() {
        let runner = Arc::new(FakeRunner::new());
        let registry = registry(runner.clone());

        let id = registry.delete("default:sa1").unwrap();
        assert_eq!(id, "default:sa1");

        let calls = runner.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].contains("delete rolebinding sa1-role-binding"));
        assert!(calls[1].contains("delete role sa1-role"));
        assert!(calls[2].contains("delete serviceaccount sa1"));
        assert!(calls[3].contains("delete secret spark-client-sa-conf-sa1"));
        for call in &calls {
            assert!(call.contains("--ignore-not-found"));
        }
    }

    #[test]
    fn test_delete_rejects_malformed_id() {
        let runner = Arc::new(FakeRunner::new());
        let registry = registry(runner.clone());

        let err = registry.delete("no-colon").unwrap_err();
        assert!(matches!(err, SparkK8sError::InvalidAccountId(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_get_resolves_by_composite_id() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("get serviceaccount", TWO_ACCOUNT_LIST);
        let registry = registry(runner);

        let sa = registry.get("default:sa1").unwrap();
        assert_eq!(sa.name, "sa1");
        assert!(sa.primary);

        let err = registry.get("default:absent").unwrap_err();
        assert!(matches!(err, SparkK8sError::AccountNotFound(_)));
    }
}
