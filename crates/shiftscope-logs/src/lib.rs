//! Per-pod log aggregation for shiftscope
//!
//! Resolves the pods backing a deployment and fetches each pod's log
//! snapshot concurrently. The central contract is partial-failure
//! isolation: one pod's fetch failing never discards the others, and the
//! result always carries exactly one entry per resolved pod.

use std::collections::BTreeMap;
use std::future::Future;

use futures::{StreamExt, stream};
use shiftscope_cluster::{ClusterError, ResourceFetcher};

// Re-export types that are used in our public API
pub use shiftscope_types::{LogCollection, PodLogResult};

/// Source of one pod's log snapshot. Seam over the cluster fetcher so
/// the fan-out semantics are testable without a live cluster.
pub trait PodLogSource {
    fn pod_log(
        &self,
        pod_name: &str,
    ) -> impl Future<Output = Result<String, ClusterError>> + Send;
}

/// Resolves which pods currently back a deployment.
pub trait PodResolver {
    fn resolve_pod_names(
        &self,
        deployment_name: &str,
    ) -> impl Future<Output = Result<Vec<String>, ClusterError>> + Send;
}

impl PodLogSource for ResourceFetcher {
    fn pod_log(
        &self,
        pod_name: &str,
    ) -> impl Future<Output = Result<String, ClusterError>> + Send {
        self.fetch_pod_log(pod_name)
    }
}

impl PodResolver for ResourceFetcher {
    fn resolve_pod_names(
        &self,
        deployment_name: &str,
    ) -> impl Future<Output = Result<Vec<String>, ClusterError>> + Send {
        ResourceFetcher::resolve_pod_names(self, deployment_name)
    }
}

/// Fans log fetches out across a deployment's pods with a bound on
/// simultaneous in-flight calls.
pub struct LogAggregator {
    max_in_flight: usize,
}

impl LogAggregator {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Collect logs for every pod backing `deployment_name`.
    ///
    /// Resolution failures (missing deployment, unreadable selector)
    /// propagate as errors; a deployment whose selector matches no pods
    /// is the distinct `NoPods` state, not an error and not an empty map.
    pub async fn deployment_logs<S>(
        &self,
        source: &S,
        deployment_name: &str,
    ) -> Result<LogCollection, ClusterError>
    where
        S: PodResolver + PodLogSource + Sync,
    {
        let pods = source.resolve_pod_names(deployment_name).await?;
        if pods.is_empty() {
            tracing::info!(deployment = %deployment_name, "selector matched no pods");
            return Ok(LogCollection::NoPods);
        }

        tracing::debug!(
            deployment = %deployment_name,
            pods = pods.len(),
            "fetching pod logs"
        );
        Ok(LogCollection::Collected(self.collect(source, pods).await))
    }

    /// Fetch each pod's log independently, collecting results as they
    /// complete. Failures are folded into that pod's entry only.
    pub async fn collect<S: PodLogSource + Sync>(
        &self,
        source: &S,
        pods: Vec<String>,
    ) -> BTreeMap<String, PodLogResult> {
        stream::iter(pods)
            .map(|pod| async move {
                let result = match source.pod_log(&pod).await {
                    Ok(text) => PodLogResult::Log(text),
                    Err(e) => {
                        tracing::warn!(pod = %pod, error = %e, "pod log fetch failed");
                        PodLogResult::Unavailable(e.to_string())
                    }
                };
                (pod, result)
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await
    }
}
