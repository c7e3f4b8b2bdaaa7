//! HTTP surface of the inspector
//!
//! Two read-only endpoints, both namespace-scoped through a shared query
//! shape:
//!
//! - `GET /metrics-annotations` reports Prometheus scrape annotations on
//!   Deployments and StatefulSets (all-or-nothing across namespaces)
//! - `GET /validate-certs` reports route TLS consistency (best-effort
//!   across namespaces)
//!
//! Errors map to status codes here and nowhere else: bad input is 400,
//! upstream cluster failures are 502, everything else is 500.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::k8s::workloads::{WorkloadLister, WorkloadMetricsInfo, WorkloadRetriever};
use crate::openshift::{RouteInfo, RouteLister, RouteRetriever};
use crate::{Error, Result};

/// Shared state behind the router
pub struct AppState<W, R> {
    /// Workload annotation aggregator
    pub workloads: WorkloadRetriever<W>,
    /// Route TLS aggregator
    pub routes: RouteRetriever<R>,
}

/// Query parameters accepted by both endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectQuery {
    /// Comma-separated namespace list
    #[serde(default)]
    pub namespaces: String,
    /// Optional label selector applied to every list call
    pub label_selector: Option<String>,
    /// Drop routes whose certificate could not be parsed (validate-certs only)
    #[serde(default)]
    pub filter_no_cert: bool,
}

impl InspectQuery {
    /// Split the namespaces parameter, rejecting an effectively empty list
    fn namespace_list(&self) -> Result<Vec<String>> {
        let namespaces: Vec<String> = self
            .namespaces
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(String::from)
            .collect();

        if namespaces.is_empty() {
            return Err(Error::input(
                "namespaces query parameter must name at least one namespace",
            ));
        }
        Ok(namespaces)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Input(_) => StatusCode::BAD_REQUEST,
            Error::Kube(_) | Error::NamespacesFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(status = %status, error = %self, "request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the inspector router over the given state
pub fn api_router<W, R>(state: Arc<AppState<W, R>>) -> Router
where
    W: WorkloadLister + 'static,
    R: RouteLister + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics-annotations", get(metrics_annotations))
        .route("/validate-certs", get(validate_certs))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_annotations<W, R>(
    State(state): State<Arc<AppState<W, R>>>,
    Query(query): Query<InspectQuery>,
) -> Result<Json<Vec<WorkloadMetricsInfo>>>
where
    W: WorkloadLister,
    R: RouteLister,
{
    let namespaces = query.namespace_list()?;
    debug!(namespaces = ?namespaces, "metrics-annotations request");
    let workloads = state
        .workloads
        .workload_metrics_from_namespaces(&namespaces, query.label_selector.as_deref())
        .await?;
    Ok(Json(workloads))
}

async fn validate_certs<W, R>(
    State(state): State<Arc<AppState<W, R>>>,
    Query(query): Query<InspectQuery>,
) -> Result<Json<Vec<RouteInfo>>>
where
    W: WorkloadLister,
    R: RouteLister,
{
    let namespaces = query.namespace_list()?;
    debug!(namespaces = ?namespaces, filter_no_cert = query.filter_no_cert, "validate-certs request");
    let mut routes = state
        .routes
        .routes_from_namespaces(&namespaces, query.label_selector.as_deref())
        .await?;

    if query.filter_no_cert {
        routes.retain(|r| {
            r.tls
                .as_ref()
                .is_some_and(|tls| tls.certificate_info.is_some())
        });
    }

    Ok(Json(routes))
}
