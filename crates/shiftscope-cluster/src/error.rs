//! Error taxonomy for cluster operations

use std::time::Duration;

use thiserror::Error;

/// Failures raised while talking to a cluster.
///
/// `NotFound` and `Parse` are terminal for the request that raised them;
/// callers decide per call site whether a failure is recovered locally
/// (per-pod log fetches, TLS probes) or aborts the whole request.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Login or client construction against a cluster endpoint failed
    #[error("authentication failed for {endpoint}: {reason}")]
    Auth { endpoint: String, reason: String },

    /// A resource query reached the cluster but failed
    #[error("failed to {operation}: {source}")]
    Fetch {
        operation: String,
        #[source]
        source: kube::Error,
    },

    /// The cluster returned structurally unusable data
    #[error("{0}")]
    Parse(String),

    /// A named resource does not exist (distinct from an empty listing)
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },
}

impl ClusterError {
    pub fn auth(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(operation: impl Into<String>, source: kube::Error) -> Self {
        Self::Fetch {
            operation: operation.into(),
            source,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit,
        }
    }
}
