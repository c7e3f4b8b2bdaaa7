//! OpenShift route listing and TLS consistency evaluation
//!
//! Routes are custom resources (`route.openshift.io/v1`), so listing goes
//! through `DynamicObject` with an explicit `ApiResource` rather than a
//! typed k8s-openapi client.
//!
//! # Partial-failure policy
//!
//! Namespaces are processed sequentially and independently. A namespace
//! whose list call fails is logged and skipped; the request fails only
//! when every namespace failed and nothing was collected. When at least
//! one namespace succeeded, the partial result is returned and the other
//! failures are absorbed (logged only). Certificate and key problems never
//! fail anything: they degrade the affected route's TLS fields to absent.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, DynamicObject};
use kube::discovery::ApiResource;
use kube::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::k8s::list_params;
use crate::pki::{self, CertificateInfo};
use crate::{Error, Result};

/// Default for route identity and host fields absent from the cluster object
const UNKNOWN: &str = "unknown";

/// API group of the OpenShift route resource
pub const ROUTE_GROUP: &str = "route.openshift.io";
/// API version of the OpenShift route resource
pub const ROUTE_VERSION: &str = "v1";

/// Build the `ApiResource` for `route.openshift.io/v1 Route`
pub fn route_api_resource() -> ApiResource {
    ApiResource {
        group: ROUTE_GROUP.to_string(),
        version: ROUTE_VERSION.to_string(),
        api_version: format!("{}/{}", ROUTE_GROUP, ROUTE_VERSION),
        kind: "Route".to_string(),
        plural: "routes".to_string(),
    }
}

/// Raw route object as handed over by a [`RouteLister`]
#[derive(Debug, Clone, Default)]
pub struct RouteObject {
    /// Route name from metadata, if present
    pub name: Option<String>,
    /// Route namespace from metadata, if present
    pub namespace: Option<String>,
    /// Deserialized route spec
    pub spec: RouteSpec,
}

/// Spec of an OpenShift route, reduced to the fields the inspector reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Externally reachable host
    pub host: Option<String>,
    /// Path the router matches against
    pub path: Option<String>,
    /// Target service reference
    #[serde(default)]
    pub to: RouteTargetRef,
    /// Target port on the service
    pub port: Option<RoutePort>,
    /// TLS configuration, absent for plain HTTP routes
    pub tls: Option<RouteTlsConfig>,
}

/// Target service of a route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteTargetRef {
    /// Service name
    #[serde(default)]
    pub name: String,
}

/// Target port of a route
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Port number or named port on the target service
    pub target_port: Option<IntOrString>,
}

/// TLS block of a route spec
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteTlsConfig {
    /// Termination mode (edge, passthrough, reencrypt); passed through unvalidated
    #[serde(default)]
    pub termination: String,
    /// PEM-encoded certificate
    pub certificate: Option<String>,
    /// PEM-encoded private key
    pub key: Option<String>,
}

/// Evaluated TLS state of a route
///
/// Absence of a boolean means "could not evaluate" (missing material or a
/// failed crypto operation) and is distinct from `Some(false)`. Fields are
/// never defaulted to `false` on evaluation failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTlsInfo {
    /// Termination mode copied from the spec
    pub termination: String,
    /// Parsed certificate identity, present only on successful parse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_info: Option<CertificateInfo>,
    /// Whether the route host matches the certificate's CN/SAN identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_matches_certificate: Option<bool>,
    /// Whether the supplied private key pairs with the certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_matches_certificate: Option<bool>,
}

/// Per-route report returned to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    /// Route name; `"unknown"` when metadata carries none
    pub name: String,
    /// Route namespace; `"unknown"` when metadata carries none
    pub namespace: String,
    /// Route host; `"unknown"` when the spec carries none
    pub host: String,
    /// Matched path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Target service name
    pub service: String,
    /// Target port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<IntOrString>,
    /// Evaluated TLS state, absent for plain HTTP routes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouteTlsInfo>,
}

/// Capability to list routes in a namespace
#[async_trait]
pub trait RouteLister: Send + Sync {
    /// List routes in a namespace, optionally filtered by label selector
    async fn list_routes(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<RouteObject>>;
}

/// Route lister backed by the cluster's route custom resource
#[derive(Clone)]
pub struct KubeRouteLister {
    client: Client,
}

impl KubeRouteLister {
    /// Create a lister using the given kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RouteLister for KubeRouteLister {
    async fn list_routes(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<RouteObject>> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &route_api_resource());
        let list = api.list(&list_params(label_selector)).await?;
        debug!(namespace = %namespace, count = list.items.len(), "routes listed");

        list.items.into_iter().map(route_object_from_dynamic).collect()
    }
}

fn route_object_from_dynamic(obj: DynamicObject) -> Result<RouteObject> {
    let spec = match obj.data.get("spec") {
        Some(spec) => serde_json::from_value(spec.clone())
            .map_err(|e| Error::serialization(format!("route spec: {}", e)))?,
        None => RouteSpec::default(),
    };

    Ok(RouteObject {
        name: obj.metadata.name,
        namespace: obj.metadata.namespace,
        spec,
    })
}

/// Aggregates route reports across namespaces with best-effort semantics
pub struct RouteRetriever<L> {
    lister: L,
}

impl<L: RouteLister> RouteRetriever<L> {
    /// Create a retriever over the given lister
    pub fn new(lister: L) -> Self {
        Self { lister }
    }

    /// Collect route reports for every namespace, in order
    ///
    /// Namespace order is preserved; within a namespace, the lister's item
    /// order is preserved. Fails only when at least one namespace failed
    /// AND no namespace contributed any route; the error then combines all
    /// per-namespace messages.
    pub async fn routes_from_namespaces(
        &self,
        namespaces: &[String],
        label_selector: Option<&str>,
    ) -> Result<Vec<RouteInfo>> {
        debug!(namespaces = ?namespaces, label_selector = ?label_selector, "retrieving routes");
        let mut all_routes = Vec::new();
        let mut errors = Vec::new();

        for namespace in namespaces {
            match self.lister.list_routes(namespace, label_selector).await {
                Ok(routes) => {
                    debug!(namespace = %namespace, count = routes.len(), "routes fetched");
                    all_routes.extend(routes.into_iter().map(parse_route));
                }
                Err(e) => {
                    error!(namespace = %namespace, error = %e, "failed to get routes from namespace");
                    errors.push(format!(
                        "failed to get routes from namespace {}: {}",
                        namespace, e
                    ));
                }
            }
        }

        if !errors.is_empty() && all_routes.is_empty() {
            error!(errors = ?errors, "no routes found in any namespace");
            return Err(Error::namespaces_failed(&errors));
        }

        debug!(total = all_routes.len(), "returning all routes");
        Ok(all_routes)
    }
}

/// Transform a raw route object into its report
fn parse_route(route: RouteObject) -> RouteInfo {
    let name = route.name.unwrap_or_else(|| UNKNOWN.to_string());
    let namespace = route.namespace.unwrap_or_else(|| UNKNOWN.to_string());
    let spec = route.spec;
    let host = spec.host.unwrap_or_else(|| UNKNOWN.to_string());

    let tls = spec.tls.map(|tls| evaluate_tls(&name, &host, tls));

    RouteInfo {
        name,
        namespace,
        host,
        path: spec.path,
        service: spec.to.name,
        port: spec.port.and_then(|p| p.target_port),
        tls,
    }
}

/// Evaluate the TLS block of a single route
///
/// A missing certificate leaves everything but the termination mode absent.
/// A certificate that fails to parse degrades all three evaluation fields
/// to absent. The key check runs only when both certificate and key are
/// present, and its failure degrades only its own field.
fn evaluate_tls(name: &str, host: &str, tls: RouteTlsConfig) -> RouteTlsInfo {
    let mut certificate_info = None;
    let mut host_matches_certificate = None;
    let mut private_key_matches_certificate = None;

    if let Some(certificate_pem) = &tls.certificate {
        match pki::parse_certificate(certificate_pem) {
            Ok(info) => {
                host_matches_certificate = Some(pki::host_matches_certificate(host, &info));

                if let Some(key_pem) = &tls.key {
                    match pki::private_key_matches_certificate(certificate_pem, key_pem) {
                        Ok(matches) => private_key_matches_certificate = Some(matches),
                        Err(e) => {
                            error!(route = %name, error = %e, "failed to validate private key for route");
                        }
                    }
                }

                certificate_info = Some(info);
            }
            Err(e) => {
                error!(route = %name, error = %e, "failed to parse certificate for route");
            }
        }
    }

    RouteTlsInfo {
        termination: tls.termination,
        certificate_info,
        host_matches_certificate,
        private_key_matches_certificate,
    }
}
