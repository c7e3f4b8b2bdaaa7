//! Kubernetes access helpers and workload inspection
//!
//! Client construction mirrors the inspector's deployment reality: explicit
//! kubeconfig path when running outside the cluster, inferred in-cluster
//! config otherwise, with connect/read timeouts set on either path.

pub mod workloads;

use std::path::Path;
use std::time::Duration;

use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::{Error, Result};

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path with default timeouts
///
/// With no path, configuration is inferred (in-cluster service account or
/// `~/.kube/config`). Request cancellation and timeouts live entirely in
/// this client configuration; the aggregators add no timeout layer of
/// their own.
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| Error::config(format!("failed to read kubeconfig: {}", e)))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::config(format!("failed to load kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::config(format!("failed to infer config: {}", e)))?,
    };

    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

    Client::try_from(config).map_err(Error::Kube)
}

/// Build list parameters with an optional label selector
pub(crate) fn list_params(label_selector: Option<&str>) -> ListParams {
    match label_selector {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}
