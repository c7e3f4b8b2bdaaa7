//! Workload metrics inspection for Deployments and StatefulSets
//!
//! Reports, per workload, whether its pod template carries the Prometheus
//! scrape annotations. Aggregation across namespaces is all-or-nothing:
//! the first failed list call aborts the whole request. This is
//! deliberately stricter than the route aggregator's best-effort policy.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::SecondsFormat;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::api::Api;
use kube::Client;
use serde::Serialize;
use tracing::debug;

use crate::k8s::list_params;
use crate::Result;

/// Annotation key enabling Prometheus scraping on a pod template
pub const SCRAPE_ANNOTATION: &str = "prometheus.io/scrape";
/// Annotation key naming the scrape port
pub const PORT_ANNOTATION: &str = "prometheus.io/port";
/// Annotation key naming the scrape path
pub const PATH_ANNOTATION: &str = "prometheus.io/path";

/// Workload kind covered by the inspector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkloadKind {
    /// An apps/v1 Deployment
    Deployment,
    /// An apps/v1 StatefulSet
    StatefulSet,
}

/// Prometheus scrape configuration read from a pod-template annotation map
///
/// `scrape_enabled` is absent when the scrape annotation key itself is
/// absent; that absence is meaningful and distinct from `Some(false)`.
/// Port and path are raw annotation strings, passed through unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsAnnotations {
    /// `Some(true)` iff the scrape annotation value is exactly `"true"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_enabled: Option<bool>,
    /// Raw value of the port annotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Raw value of the path annotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Per-workload metrics report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadMetricsInfo {
    /// Workload name; empty string when metadata carries none
    pub name: String,
    /// Workload namespace; empty string when metadata carries none
    pub namespace: String,
    /// Deployment or StatefulSet
    #[serde(rename = "type")]
    pub kind: WorkloadKind,
    /// Desired replica count from the spec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Ready replica count from the status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
    /// Creation timestamp as an ISO-8601 string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// True iff the scrape annotation key exists, regardless of its value
    pub has_metrics_annotations: bool,
    /// Extracted scrape configuration
    pub metrics_annotations: MetricsAnnotations,
}

/// Capability to list workloads in a namespace
///
/// Production uses the kube-backed implementation; tests substitute
/// in-memory listers.
#[async_trait]
pub trait WorkloadLister: Send + Sync {
    /// List Deployments in a namespace, optionally filtered by label selector
    async fn list_deployments(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Deployment>>;

    /// List StatefulSets in a namespace, optionally filtered by label selector
    async fn list_stateful_sets(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<StatefulSet>>;
}

/// Workload lister backed by the apps/v1 API
#[derive(Clone)]
pub struct KubeWorkloadLister {
    client: Client,
}

impl KubeWorkloadLister {
    /// Create a lister using the given kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadLister for KubeWorkloadLister {
    async fn list_deployments(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&list_params(label_selector)).await?;
        debug!(namespace = %namespace, count = list.items.len(), "deployments listed");
        Ok(list.items)
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<StatefulSet>> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&list_params(label_selector)).await?;
        debug!(namespace = %namespace, count = list.items.len(), "stateful sets listed");
        Ok(list.items)
    }
}

/// Aggregates workload metrics reports across namespaces
pub struct WorkloadRetriever<L> {
    lister: L,
}

impl<L: WorkloadLister> WorkloadRetriever<L> {
    /// Create a retriever over the given lister
    pub fn new(lister: L) -> Self {
        Self { lister }
    }

    /// Collect workload metrics reports for every namespace, in order
    ///
    /// Namespaces are processed sequentially; within each namespace,
    /// Deployments precede StatefulSets, each in the lister's item order.
    /// Either list call failing aborts the whole request with that error.
    pub async fn workload_metrics_from_namespaces(
        &self,
        namespaces: &[String],
        label_selector: Option<&str>,
    ) -> Result<Vec<WorkloadMetricsInfo>> {
        debug!(namespaces = ?namespaces, label_selector = ?label_selector, "retrieving workload metrics info");
        let mut all_workloads = Vec::new();

        for namespace in namespaces {
            let deployments = self.lister.list_deployments(namespace, label_selector).await?;
            let stateful_sets = self
                .lister
                .list_stateful_sets(namespace, label_selector)
                .await?;

            debug!(
                namespace = %namespace,
                deployments = deployments.len(),
                stateful_sets = stateful_sets.len(),
                "workloads fetched"
            );

            all_workloads.extend(deployments.iter().map(deployment_metrics_info));
            all_workloads.extend(stateful_sets.iter().map(stateful_set_metrics_info));
        }

        debug!(total = all_workloads.len(), "returning workload metrics info");
        Ok(all_workloads)
    }
}

/// Extract Prometheus scrape configuration from a pod-template annotation map
///
/// An absent map yields a record with every field absent. Presence of the
/// scrape key is tracked independently of its value: `"true"` enables,
/// any other literal (including `"TRUE"` or `"1"`) reads as disabled.
pub fn extract_metrics_annotations(
    annotations: Option<&BTreeMap<String, String>>,
) -> MetricsAnnotations {
    let Some(annotations) = annotations else {
        return MetricsAnnotations::default();
    };

    MetricsAnnotations {
        scrape_enabled: annotations.get(SCRAPE_ANNOTATION).map(|v| v == "true"),
        port: annotations.get(PORT_ANNOTATION).cloned(),
        path: annotations.get(PATH_ANNOTATION).cloned(),
    }
}

fn deployment_metrics_info(deployment: &Deployment) -> WorkloadMetricsInfo {
    let annotations = deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.annotations.as_ref());
    let metrics_annotations = extract_metrics_annotations(annotations);

    WorkloadMetricsInfo {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
        kind: WorkloadKind::Deployment,
        replicas: deployment.spec.as_ref().and_then(|s| s.replicas),
        ready_replicas: deployment.status.as_ref().and_then(|s| s.ready_replicas),
        created_at: created_at(&deployment.metadata),
        has_metrics_annotations: metrics_annotations.scrape_enabled.is_some(),
        metrics_annotations,
    }
}

fn stateful_set_metrics_info(stateful_set: &StatefulSet) -> WorkloadMetricsInfo {
    let annotations = stateful_set
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.annotations.as_ref());
    let metrics_annotations = extract_metrics_annotations(annotations);

    WorkloadMetricsInfo {
        name: stateful_set.metadata.name.clone().unwrap_or_default(),
        namespace: stateful_set.metadata.namespace.clone().unwrap_or_default(),
        kind: WorkloadKind::StatefulSet,
        replicas: stateful_set.spec.as_ref().and_then(|s| s.replicas),
        ready_replicas: stateful_set.status.as_ref().and_then(|s| s.ready_replicas),
        created_at: created_at(&stateful_set.metadata),
        has_metrics_annotations: metrics_annotations.scrape_enabled.is_some(),
        metrics_annotations,
    }
}

fn created_at(
    metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
) -> Option<String> {
    metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0.to_rfc3339_opts(SecondsFormat::Millis, true))
}
