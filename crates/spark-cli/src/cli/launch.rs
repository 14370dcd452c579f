//! Shared plumbing for the submit and shell wrappers: layered configuration
//! assembly and resolution of the target account.

use std::borrow::Cow;
use std::collections::BTreeMap;

use spark_common::settings::Defaults;
use spark_k8s::error::{SparkK8sError, SparkK8sResult};
use spark_k8s::{K8sServiceAccountRegistry, PropertyFile, ServiceAccount};

use crate::error::{SparkCliError, SparkCliResult};

/// Read a properties file, treating a missing file as empty. Any other
/// failure still surfaces.
pub(crate) fn read_optional(path: &str, defaults: &Defaults) -> SparkK8sResult<PropertyFile> {
    match PropertyFile::read_with_env(path, defaults.environ()) {
        Ok(props) => Ok(props),
        Err(SparkK8sError::FileNotFound(_)) => Ok(PropertyFile::empty()),
        Err(e) => Err(e),
    }
}

/// Parse CLI `--conf key=value` overrides. A value naming an environment
/// variable resolves through the environment snapshot; otherwise it is taken
/// verbatim.
pub(crate) fn parse_conf_overrides(
    conf_args: &[String],
    defaults: &Defaults,
) -> SparkCliResult<PropertyFile> {
    let mut overrides = BTreeMap::new();
    for conf in conf_args {
        let (key, value) = conf.split_once('=').ok_or_else(|| {
            SparkCliError::Config(format!(
                "configuration override without '=': {conf}; expected key=value"
            ))
        })?;
        let value = defaults
            .environ()
            .get(value)
            .map(String::as_str)
            .unwrap_or(value);
        overrides.insert(key.to_string(), value.to_string());
    }
    Ok(PropertyFile::from_map(overrides)?)
}

/// Resolve the account to submit as: explicit namespace/username when given,
/// environment defaults otherwise.
pub(crate) fn resolve_account(
    registry: &K8sServiceAccountRegistry,
    username: Option<&str>,
    namespace: Option<&str>,
    defaults: &Defaults,
) -> SparkCliResult<ServiceAccount> {
    let id = format!(
        "{}:{}",
        namespace.unwrap_or(defaults.namespace()),
        username.unwrap_or(defaults.service_account()),
    );
    Ok(registry.get(&id)?)
}

/// Layered configuration for a launch, priority increasing left to right:
/// static packaged defaults, the account's stored configuration, dynamic
/// setup defaults, the env-pointed overrides file, then CLI overrides.
pub(crate) fn assemble_configuration(
    account: &ServiceAccount,
    conf_overrides: &[String],
    properties_file: Option<&str>,
    defaults: &Defaults,
) -> SparkCliResult<PropertyFile> {
    let static_confs = read_optional(&defaults.static_conf_file(), defaults)?;
    let account_confs = account.configurations();
    let dynamic_confs = read_optional(&defaults.dynamic_conf_file(), defaults)?;
    let env_confs = match defaults.env_conf_file() {
        Some(path) => PropertyFile::read_with_env(&path, defaults.environ())?,
        None => PropertyFile::empty(),
    };
    let extra_confs = match properties_file {
        Some(path) => PropertyFile::read_with_env(path, defaults.environ())?,
        None => PropertyFile::empty(),
    };
    let overrides = parse_conf_overrides(conf_overrides, defaults)?;

    Ok(static_confs.union(&[
        &account_confs,
        &dynamic_confs,
        &env_confs,
        &extra_confs,
        &overrides,
    ]))
}

/// Render the extra arguments passed through to the spark binary, escaping
/// anything the shell would otherwise mangle.
pub(crate) fn rendered_args(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape::escape(Cow::from(a.as_str())).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn defaults(pairs: &[(&str, &str)]) -> Defaults {
        Defaults::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_parse_conf_overrides() {
        let defaults = defaults(&[("MY_TOKEN", "sekret")]);
        let overrides = parse_conf_overrides(
            &[
                "spark.app.name=demo".to_string(),
                "spark.authenticate.secret=MY_TOKEN".to_string(),
                "spark.master=k8s://https://1.2.3.4:443".to_string(),
            ],
            &defaults,
        )
        .unwrap();

        assert_eq!(overrides.get("spark.app.name").as_deref(), Some("demo"));
        // value naming an env var resolves through the snapshot
        assert_eq!(
            overrides.get("spark.authenticate.secret").as_deref(),
            Some("sekret")
        );
        // embedded '=' in the value survives
        assert_eq!(
            overrides.get("spark.master").as_deref(),
            Some("k8s://https://1.2.3.4:443")
        );
    }

    #[test]
    fn test_parse_conf_overrides_rejects_missing_assignment() {
        let err = parse_conf_overrides(&["nonsense".to_string()], &defaults(&[])).unwrap_err();
        assert!(matches!(err, SparkCliError::Config(_)));
    }

    #[test]
    fn test_read_optional_tolerates_missing_file() {
        let props = read_optional("/no/such/file.conf", &defaults(&[])).unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn test_assemble_configuration_priority() {
        let dir = tempfile::tempdir().unwrap();
        let static_path = dir.path().join("static.conf");
        let dynamic_path = dir.path().join("dynamic.conf");
        std::fs::write(&static_path, "spark.app.name=static\nspark.only.static=1\n").unwrap();
        std::fs::write(&dynamic_path, "spark.app.name=dynamic\n").unwrap();

        // point the layered files at the temp dir through the env snapshot
        let defaults = Defaults::new(
            [
                ("SNAP".to_string(), "unused".to_string()),
                ("SNAP_USER_DATA".to_string(), "unused".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let account = ServiceAccount {
            name: "spark".to_string(),
            namespace: "default".to_string(),
            ..Default::default()
        };

        // static/dynamic resolve to nonexistent paths under "unused", so
        // exercise the layering through the properties file and overrides
        let merged = assemble_configuration(
            &account,
            &["spark.app.name=cli".to_string()],
            Some(static_path.to_str().unwrap()),
            &defaults,
        )
        .unwrap();
        assert_eq!(merged.get("spark.app.name").as_deref(), Some("cli"));
        assert_eq!(merged.get("spark.only.static").as_deref(), Some("1"));
        assert_eq!(
            merged.get("spark.kubernetes.namespace").as_deref(),
            Some("default")
        );
    }

    #[test]
    fn test_rendered_args_escapes() {
        let rendered = rendered_args(&[
            "--class".to_string(),
            "org.apache.spark.examples.SparkPi".to_string(),
            "app arg".to_string(),
        ]);
        assert_eq!(rendered, "--class org.apache.spark.examples.SparkPi 'app arg'");
    }
}
