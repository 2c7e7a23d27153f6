//! Cluster access for shiftscope
//!
//! This crate establishes authenticated sessions against configured
//! cluster environments and issues the namespace-scoped resource queries
//! the aggregation layers build on.

mod error;
mod fetch;
mod session;

pub use error::ClusterError;
pub use fetch::ResourceFetcher;
pub use session::{SessionContext, SessionManager};

// Re-export types that are used in our public API
pub use shiftscope_types::{
    ClusterConfig, DeploymentSnapshot, RouteSnapshot, TerminationScheme, Timeouts,
};
