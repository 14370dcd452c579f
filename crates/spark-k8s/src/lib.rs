pub mod account;
pub mod client;
pub mod error;
pub mod exec;
pub mod kubeconfig;
pub mod props;
pub mod registry;

pub use account::ServiceAccount;
pub use client::KubeInterface;
pub use props::PropertyFile;
pub use registry::K8sServiceAccountRegistry;
