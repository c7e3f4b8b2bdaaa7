//! Error types for the inspector service

use thiserror::Error;

/// Main error type for inspector operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Every requested namespace failed to list
    #[error("no namespace could be listed: {0}")]
    NamespacesFailed(String),

    /// Invalid request input
    #[error("invalid input: {0}")]
    Input(String),

    /// Kubeconfig loading error
    #[error("kubeconfig error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an input error with the given message
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Create a kubeconfig error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Combine per-namespace failure messages into a single error
    pub fn namespaces_failed(messages: &[String]) -> Self {
        Self::NamespacesFailed(messages.join("; "))
    }
}
