//! Namespace-scoped resource queries under an authenticated session

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::{ApiResource, DynamicObject, ListParams, LogParams};
use serde::Deserialize;
use shiftscope_types::{DeploymentSnapshot, RouteSnapshot, TerminationScheme, Timeouts};

use crate::error::ClusterError;
use crate::session::SessionContext;

/// Read-only queries against one session's namespace.
///
/// Every query is wrapped in the deadline configured for its call class.
pub struct ResourceFetcher {
    client: kube::Client,
    namespace: String,
    timeouts: Timeouts,
}

/// Route is an OpenShift extension kind, not part of the core API, so it
/// is fetched untyped under a fixed group/version/plural.
fn route_api_resource() -> ApiResource {
    ApiResource {
        group: "route.openshift.io".to_string(),
        version: "v1".to_string(),
        api_version: "route.openshift.io/v1".to_string(),
        kind: "Route".to_string(),
        plural: "routes".to_string(),
    }
}

/// The subset of a route's spec this service consumes.
#[derive(Deserialize)]
struct RouteSpec {
    host: Option<String>,
    #[serde(default)]
    tls: Option<RouteTls>,
}

#[derive(Deserialize)]
struct RouteTls {
    termination: Option<String>,
}

impl ResourceFetcher {
    pub fn new(session: &SessionContext, timeouts: Timeouts) -> Self {
        Self {
            client: session.client(),
            namespace: session.namespace().to_string(),
            timeouts,
        }
    }

    /// Fetch all deployments in the session's namespace.
    pub async fn list_deployments(&self) -> Result<Vec<DeploymentSnapshot>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = self
            .bounded("list deployments", api.list(&ListParams::default()))
            .await?;

        list.items
            .into_iter()
            .map(deployment_to_snapshot)
            .collect()
    }

    /// Fetch all routes in the session's namespace.
    pub async fn list_routes(&self) -> Result<Vec<RouteSnapshot>, ClusterError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &route_api_resource());
        let list = self
            .bounded("list routes", api.list(&ListParams::default()))
            .await?;

        list.items.into_iter().map(route_to_snapshot).collect()
    }

    /// Resolve the pods currently backing a deployment.
    ///
    /// Reads the deployment's selector, then lists pods matching all of
    /// its label pairs. An existing deployment with no matching pods
    /// yields an empty vec; a missing deployment yields `NotFound`.
    pub async fn resolve_pod_names(
        &self,
        deployment_name: &str,
    ) -> Result<Vec<String>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let limit = self.timeouts.list();
        let deploy = match tokio::time::timeout(limit, api.get(deployment_name)).await {
            Err(_) => {
                return Err(ClusterError::timeout(
                    format!("get deployment '{}'", deployment_name),
                    limit,
                ));
            }
            Ok(Err(e)) => return Err(classify_get_error(deployment_name, e)),
            Ok(Ok(deploy)) => deploy,
        };

        let match_labels = deploy
            .spec
            .and_then(|spec| spec.selector.match_labels)
            .unwrap_or_default();
        if match_labels.is_empty() {
            return Err(ClusterError::parse(format!(
                "deployment '{}' has no selector match labels",
                deployment_name
            )));
        }

        let selector = label_selector_string(&match_labels.into_iter().collect());
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = self
            .bounded(
                format!("list pods for deployment '{}'", deployment_name),
                pods.list(&ListParams::default().labels(&selector)),
            )
            .await?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|pod| pod.metadata.name)
            .collect())
    }

    /// Fetch one pod's log snapshot (no follow) under the per-call
    /// deadline.
    pub async fn fetch_pod_log(&self, pod_name: &str) -> Result<String, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let limit = self.timeouts.pod_log();
        match tokio::time::timeout(limit, api.logs(pod_name, &LogParams::default())).await {
            Err(_) => Err(ClusterError::timeout(
                format!("fetch logs for pod '{}'", pod_name),
                limit,
            )),
            Ok(Err(e)) => Err(ClusterError::fetch(
                format!("fetch logs for pod '{}'", pod_name),
                e,
            )),
            Ok(Ok(text)) => Ok(text),
        }
    }

    async fn bounded<T>(
        &self,
        operation: impl Into<String>,
        fut: impl Future<Output = Result<T, kube::Error>>,
    ) -> Result<T, ClusterError> {
        let operation = operation.into();
        let limit = self.timeouts.list();
        match tokio::time::timeout(limit, fut).await {
            Err(_) => Err(ClusterError::timeout(operation, limit)),
            Ok(Err(e)) => Err(ClusterError::fetch(operation, e)),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

/// AND-of-labels selector: `k1=v1,k2=v2` with exact matches only.
fn label_selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

fn classify_get_error(deployment_name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => ClusterError::NotFound {
            kind: "deployment",
            name: deployment_name.to_string(),
        },
        other => ClusterError::fetch(format!("get deployment '{}'", deployment_name), other),
    }
}

fn deployment_to_snapshot(deploy: Deployment) -> Result<DeploymentSnapshot, ClusterError> {
    let name = deploy
        .metadata
        .name
        .ok_or_else(|| ClusterError::parse("deployment record is missing metadata.name"))?;

    let mut snapshot = DeploymentSnapshot {
        name,
        container_images: Vec::new(),
        ready_replicas: 0,
        total_replicas: 0,
        selector: BTreeMap::new(),
    };

    if let Some(spec) = deploy.spec {
        snapshot.total_replicas = spec.replicas.unwrap_or(0);

        if let Some(labels) = spec.selector.match_labels {
            snapshot.selector = labels.into_iter().collect();
        }

        if let Some(pod_spec) = spec.template.spec {
            snapshot.container_images = pod_spec
                .containers
                .into_iter()
                .filter_map(|container| container.image)
                .collect();
        }
    }

    if let Some(status) = deploy.status {
        snapshot.ready_replicas = status.ready_replicas.unwrap_or(0);
    }

    Ok(snapshot)
}

fn route_to_snapshot(route: DynamicObject) -> Result<RouteSnapshot, ClusterError> {
    let name = route
        .metadata
        .name
        .ok_or_else(|| ClusterError::parse("route record is missing metadata.name"))?;

    let spec_value = route
        .data
        .get("spec")
        .cloned()
        .ok_or_else(|| ClusterError::parse(format!("route '{}' has no spec", name)))?;
    let spec: RouteSpec = serde_json::from_value(spec_value)
        .map_err(|e| ClusterError::parse(format!("route '{}' spec is malformed: {}", name, e)))?;

    let host = spec
        .host
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ClusterError::parse(format!("route '{}' has no host", name)))?;

    let raw_termination = spec.tls.as_ref().and_then(|tls| tls.termination.as_deref());
    let termination = TerminationScheme::from_raw(raw_termination).map_err(|raw| {
        ClusterError::parse(format!("route '{}' has unknown termination '{}'", name, raw))
    })?;

    Ok(RouteSnapshot {
        name,
        host,
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deployment_snapshot_from_api_object() {
        let deploy: Deployment = serde_json::from_value(json!({
            "metadata": { "name": "svc-a" },
            "spec": {
                "replicas": 2,
                "selector": { "matchLabels": { "app": "svc-a" } },
                "template": {
                    "spec": {
                        "containers": [
                            { "name": "app", "image": "img:1" },
                            { "name": "sidecar", "image": "envoy:2" }
                        ]
                    }
                }
            },
            "status": { "readyReplicas": 2 }
        }))
        .unwrap();

        let snapshot = deployment_to_snapshot(deploy).unwrap();
        assert_eq!(snapshot.name, "svc-a");
        assert_eq!(snapshot.container_images, vec!["img:1", "envoy:2"]);
        assert_eq!(snapshot.replica_status(), "2/2");
        assert_eq!(snapshot.selector.get("app").map(String::as_str), Some("svc-a"));
    }

    #[test]
    fn test_deployment_without_status_reads_zero_ready() {
        let deploy: Deployment = serde_json::from_value(json!({
            "metadata": { "name": "svc-b" },
            "spec": {
                "replicas": 3,
                "selector": { "matchLabels": { "app": "svc-b" } },
                "template": { "spec": { "containers": [{ "name": "app", "image": "img:9" }] } }
            }
        }))
        .unwrap();

        let snapshot = deployment_to_snapshot(deploy).unwrap();
        assert_eq!(snapshot.replica_status(), "0/3");
    }

    #[test]
    fn test_deployment_missing_name_is_parse_error() {
        let deploy: Deployment = serde_json::from_value(json!({ "metadata": {} })).unwrap();
        assert!(matches!(
            deployment_to_snapshot(deploy),
            Err(ClusterError::Parse(_))
        ));
    }

    fn route_object(spec: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "route.openshift.io/v1",
            "kind": "Route",
            "metadata": { "name": "svc-a" },
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn test_route_snapshot_with_edge_termination() {
        let route = route_object(json!({
            "host": "svc-a.example.com",
            "tls": { "termination": "edge" }
        }));

        let snapshot = route_to_snapshot(route).unwrap();
        assert_eq!(snapshot.name, "svc-a");
        assert_eq!(snapshot.host, "svc-a.example.com");
        assert_eq!(snapshot.termination, TerminationScheme::Edge);
        assert_eq!(snapshot.url(), "https://svc-a.example.com");
    }

    #[test]
    fn test_route_without_tls_block_is_plain_http() {
        let route = route_object(json!({ "host": "svc-a.example.com" }));
        let snapshot = route_to_snapshot(route).unwrap();
        assert_eq!(snapshot.termination, TerminationScheme::None);
        assert_eq!(snapshot.url(), "http://svc-a.example.com");
    }

    #[test]
    fn test_route_with_unknown_termination_is_parse_error() {
        let route = route_object(json!({
            "host": "svc-a.example.com",
            "tls": { "termination": "tunnel" }
        }));
        let err = route_to_snapshot(route).unwrap_err();
        assert!(err.to_string().contains("unknown termination 'tunnel'"));
    }

    #[test]
    fn test_route_missing_host_is_parse_error() {
        let route = route_object(json!({ "tls": { "termination": "edge" } }));
        assert!(matches!(
            route_to_snapshot(route),
            Err(ClusterError::Parse(_))
        ));
    }

    #[test]
    fn test_label_selector_joins_all_pairs() {
        let labels: BTreeMap<String, String> = [
            ("app".to_string(), "svc-a".to_string()),
            ("tier".to_string(), "backend".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(label_selector_string(&labels), "app=svc-a,tier=backend");
    }

    #[test]
    fn test_get_error_classification() {
        let not_found = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "deployments.apps \"ghost\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert!(matches!(
            classify_get_error("ghost", not_found),
            ClusterError::NotFound { kind: "deployment", .. }
        ));

        let server_error = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "internal error".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        });
        assert!(matches!(
            classify_get_error("ghost", server_error),
            ClusterError::Fetch { .. }
        ));
    }
}
