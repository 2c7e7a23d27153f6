//! Session establishment against one cluster endpoint

use k8s_openapi::api::apps::v1::Deployment;
use kube::Api;
use kube::api::ListParams;
use kube::config::{
    AuthInfo, Cluster, Context, KubeConfigOptions, Kubeconfig, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use shiftscope_types::{ClusterConfig, Timeouts};

use crate::error::ClusterError;

/// Name under which the synthesized kubeconfig registers its single
/// cluster, user, and context.
const CONTEXT_NAME: &str = "shiftscope";

/// Builds authenticated session contexts from cluster descriptors.
///
/// Each call to [`SessionManager::authenticate`] produces an independent
/// context; nothing is shared or cached across calls, so concurrent
/// requests for different environments cannot clobber each other's login.
pub struct SessionManager {
    timeouts: Timeouts,
}

/// The authenticated state required to issue queries against one cluster.
pub struct SessionContext {
    client: kube::Client,
    namespace: String,
}

impl SessionContext {
    pub fn client(&self) -> kube::Client {
        self.client.clone()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl SessionManager {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    /// Authenticate against the descriptor's endpoint with its configured
    /// credentials.
    ///
    /// The login is verified with a minimal namespaced query before the
    /// context is handed out, so bad credentials or an unreachable
    /// endpoint surface here instead of in whichever later call happens
    /// to run first.
    pub async fn authenticate(
        &self,
        cluster: &ClusterConfig,
    ) -> Result<SessionContext, ClusterError> {
        let kubeconfig = kubeconfig_for(cluster);

        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    ClusterError::auth(
                        &cluster.api_url,
                        format!("invalid client configuration: {}", e),
                    )
                })?;

        let client = kube::Client::try_from(config).map_err(|e| {
            ClusterError::auth(&cluster.api_url, format!("failed to build client: {}", e))
        })?;

        let probe: Api<Deployment> = Api::namespaced(client.clone(), &cluster.namespace);
        let limit = self.timeouts.authenticate();
        match tokio::time::timeout(limit, probe.list(&ListParams::default().limit(1))).await {
            Err(_) => {
                return Err(ClusterError::timeout(
                    format!("authenticate against {}", cluster.api_url),
                    limit,
                ));
            }
            Ok(Err(e)) => {
                return Err(ClusterError::auth(&cluster.api_url, e.to_string()));
            }
            Ok(Ok(_)) => {}
        }

        tracing::debug!(
            endpoint = %cluster.api_url,
            namespace = %cluster.namespace,
            "session established"
        );

        Ok(SessionContext {
            client,
            namespace: cluster.namespace.clone(),
        })
    }
}

/// Synthesize an in-memory kubeconfig for one cluster descriptor.
///
/// The endpoint and credentials are used exactly as configured; the
/// descriptor's `insecure_skip_tls_verify` field maps directly onto the
/// cluster entry so the trade-off stays visible in configuration.
fn kubeconfig_for(cluster: &ClusterConfig) -> Kubeconfig {
    Kubeconfig {
        clusters: vec![NamedCluster {
            name: CONTEXT_NAME.to_string(),
            cluster: Some(Cluster {
                server: Some(cluster.api_url.clone()),
                insecure_skip_tls_verify: Some(cluster.insecure_skip_tls_verify),
                ..Default::default()
            }),
        }],
        auth_infos: vec![NamedAuthInfo {
            name: CONTEXT_NAME.to_string(),
            auth_info: Some(AuthInfo {
                username: Some(cluster.username.clone()),
                password: Some(cluster.password.clone().into()),
                ..Default::default()
            }),
        }],
        contexts: vec![NamedContext {
            name: CONTEXT_NAME.to_string(),
            context: Some(Context {
                cluster: CONTEXT_NAME.to_string(),
                user: Some(CONTEXT_NAME.to_string()),
                namespace: Some(cluster.namespace.clone()),
                ..Default::default()
            }),
        }],
        current_context: Some(CONTEXT_NAME.to_string()),
        ..Default::default()
    }
}
