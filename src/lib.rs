//! cluster-inspector - namespace-scoped reporting on workload scrape
//! configuration and OpenShift route TLS consistency
//!
//! The service answers two read-only questions for a set of namespaces:
//! - which Deployment/StatefulSet workloads carry Prometheus scrape
//!   annotations, and
//! - whether each OpenShift Route's TLS block is internally consistent:
//!   the certificate parses, the route host matches the certificate's
//!   CN/SAN identity, and the supplied private key pairs with the
//!   certificate's public key.
//!
//! Route aggregation is best-effort across namespaces: a namespace whose
//! list call fails is skipped and the partial result returned, unless no
//! namespace produced anything at all. Workload aggregation is
//! all-or-nothing: the first list failure aborts the request.
//!
//! # Modules
//!
//! - [`pki`] - X.509 parsing and the host/key matching predicates
//! - [`k8s`] - kube client construction and the workload aggregator
//! - [`openshift`] - route listing and per-route TLS evaluation
//! - [`api`] - HTTP query surface consuming the two aggregators
//! - [`error`] - error types for the service

#![deny(missing_docs)]

pub mod api;
pub mod error;
pub mod k8s;
pub mod openshift;
pub mod pki;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default port for the HTTP API server
pub const DEFAULT_API_PORT: u16 = 8080;
