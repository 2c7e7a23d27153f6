//! Deployment/route correlation and per-environment aggregation
//!
//! Joins the deployment listing with the route listing, then enriches
//! secure routes with certificate expiry. A failed certificate probe
//! degrades that one record; it never fails the listing.

use std::collections::HashMap;
use std::future::Future;

use chrono::NaiveDate;
use futures::{StreamExt, stream};
use shiftscope_cluster::{ClusterError, ResourceFetcher, SessionManager};
use shiftscope_logs::LogAggregator;
use shiftscope_tls::{TlsInspectError, TlsInspector};
use shiftscope_types::{
    CertExpiry, ClusterConfig, DeploymentSnapshot, EnrichedDeployment, Limits, LogCollection,
    RouteSnapshot, Timeouts,
};

/// Seam over the TLS inspector so correlation is testable without
/// opening sockets.
pub trait ExpiryProbe {
    fn expiry(&self, host: &str) -> impl Future<Output = Result<NaiveDate, TlsInspectError>> + Send;
}

impl ExpiryProbe for TlsInspector {
    fn expiry(&self, host: &str) -> impl Future<Output = Result<NaiveDate, TlsInspectError>> + Send {
        self.inspect_expiry(host)
    }
}

/// A deployment paired with the route that shares its name, if any.
pub struct Correlated {
    pub deployment: DeploymentSnapshot,
    pub route: Option<RouteSnapshot>,
}

/// Join deployments with routes by exact name equality.
///
/// Name equality is a policy choice, not a platform guarantee: a route
/// is free to carry any name, but these environments name routes after
/// their deployments. Should several routes share a name, the last one
/// listed wins.
pub fn correlate(
    deployments: Vec<DeploymentSnapshot>,
    routes: Vec<RouteSnapshot>,
) -> Vec<Correlated> {
    let mut routes_by_name: HashMap<String, RouteSnapshot> = routes
        .into_iter()
        .map(|route| (route.name.clone(), route))
        .collect();

    deployments
        .into_iter()
        .map(|deployment| {
            let route = routes_by_name.remove(&deployment.name);
            Correlated { deployment, route }
        })
        .collect()
}

/// Enrich correlated records, probing certificate expiry for secure
/// routes with at most `max_in_flight` probes running at once.
///
/// Output order follows input order, so repeated calls over unchanged
/// cluster state produce identical listings.
pub async fn enrich<P: ExpiryProbe + Sync>(
    correlated: Vec<Correlated>,
    probe: &P,
    max_in_flight: usize,
) -> Vec<EnrichedDeployment> {
    stream::iter(correlated)
        .map(|item| async move {
            match item.route {
                None => EnrichedDeployment::new(item.deployment, None, CertExpiry::NoRoute),
                Some(route) if !route.termination.is_secure() => {
                    EnrichedDeployment::new(item.deployment, Some(route.url()), CertExpiry::NotHttps)
                }
                Some(route) => {
                    let expiry = match probe.expiry(&route.host).await {
                        Ok(date) => CertExpiry::Date(date),
                        Err(e) => {
                            tracing::warn!(
                                host = %route.host,
                                error = %e,
                                "certificate inspection failed"
                            );
                            CertExpiry::Unavailable(e.to_string())
                        }
                    };
                    EnrichedDeployment::new(item.deployment, Some(route.url()), expiry)
                }
            }
        })
        .buffered(max_in_flight.max(1))
        .collect()
        .await
}

/// Full listing pipeline for one environment: authenticate, fetch
/// deployments and routes, correlate, enrich.
pub async fn environment_deployments(
    cluster: &ClusterConfig,
    timeouts: &Timeouts,
    limits: &Limits,
) -> Result<Vec<EnrichedDeployment>, ClusterError> {
    let session = SessionManager::new(timeouts.clone())
        .authenticate(cluster)
        .await?;
    let fetcher = ResourceFetcher::new(&session, timeouts.clone());

    // The two listings are independent reads; issue them together.
    let (deployments, routes) =
        tokio::try_join!(fetcher.list_deployments(), fetcher.list_routes())?;
    tracing::debug!(
        deployments = deployments.len(),
        routes = routes.len(),
        "correlating listings"
    );

    let inspector = TlsInspector::new(timeouts.tls());
    Ok(enrich(correlate(deployments, routes), &inspector, limits.max_in_flight).await)
}

/// Log pipeline for one deployment: authenticate, resolve pods, fan out
/// per-pod snapshot fetches.
pub async fn environment_logs(
    cluster: &ClusterConfig,
    deployment_name: &str,
    timeouts: &Timeouts,
    limits: &Limits,
) -> Result<LogCollection, ClusterError> {
    let session = SessionManager::new(timeouts.clone())
        .authenticate(cluster)
        .await?;
    let fetcher = ResourceFetcher::new(&session, timeouts.clone());

    LogAggregator::new(limits.max_in_flight)
        .deployment_logs(&fetcher, deployment_name)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shiftscope_types::TerminationScheme;
    use std::collections::BTreeMap;

    fn snapshot(name: &str, image: &str, ready: i32, total: i32) -> DeploymentSnapshot {
        DeploymentSnapshot {
            name: name.to_string(),
            container_images: vec![image.to_string()],
            ready_replicas: ready,
            total_replicas: total,
            selector: BTreeMap::new(),
        }
    }

    fn route(name: &str, host: &str, termination: TerminationScheme) -> RouteSnapshot {
        RouteSnapshot {
            name: name.to_string(),
            host: host.to_string(),
            termination,
        }
    }

    /// Probe with canned expiry dates; unknown hosts fail the handshake.
    struct StubProbe {
        expiries: HashMap<String, NaiveDate>,
    }

    impl StubProbe {
        fn new(entries: &[(&str, NaiveDate)]) -> Self {
            Self {
                expiries: entries
                    .iter()
                    .map(|(host, date)| (host.to_string(), *date))
                    .collect(),
            }
        }

        fn empty() -> Self {
            Self::new(&[])
        }
    }

    impl ExpiryProbe for StubProbe {
        fn expiry(
            &self,
            host: &str,
        ) -> impl Future<Output = Result<NaiveDate, TlsInspectError>> + Send {
            let result = self
                .expiries
                .get(host)
                .copied()
                .ok_or_else(|| TlsInspectError::NoCertificate(host.to_string()));
            async move { result }
        }
    }

    #[tokio::test]
    async fn test_secure_route_gets_probed_expiry() {
        let expiry = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        let probe = StubProbe::new(&[("svc-a.example.com", expiry)]);

        let correlated = correlate(
            vec![snapshot("svc-a", "img:1", 2, 2)],
            vec![route("svc-a", "svc-a.example.com", TerminationScheme::Edge)],
        );
        let enriched = enrich(correlated, &probe, 4).await;

        assert_eq!(
            serde_json::to_value(&enriched).unwrap(),
            json!([{
                "name": "svc-a",
                "image": "img:1",
                "ready": "2/2",
                "route": "https://svc-a.example.com",
                "ssl_expiry": "2030-06-01",
            }])
        );
    }

    #[tokio::test]
    async fn test_deployment_without_route_gets_sentinels() {
        let correlated = correlate(vec![snapshot("svc-b", "img:2", 1, 1)], vec![]);
        let enriched = enrich(correlated, &StubProbe::empty(), 4).await;

        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value[0]["route"], "N/A");
        assert_eq!(value[0]["ssl_expiry"], "no route found");
    }

    #[tokio::test]
    async fn test_plain_route_skips_certificate_probe() {
        // The empty probe errors on any call; a "Not HTTPS" result proves
        // no probe ran for the insecure route.
        let correlated = correlate(
            vec![snapshot("web", "web:7", 1, 1)],
            vec![route("web", "web.example.com", TerminationScheme::None)],
        );
        let enriched = enrich(correlated, &StubProbe::empty(), 4).await;

        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value[0]["route"], "http://web.example.com");
        assert_eq!(value[0]["ssl_expiry"], "Not HTTPS");
    }

    #[tokio::test]
    async fn test_probe_failure_degrades_only_that_record() {
        let expiry = NaiveDate::from_ymd_opt(2029, 1, 15).unwrap();
        let probe = StubProbe::new(&[("svc-a.example.com", expiry)]);

        let correlated = correlate(
            vec![
                snapshot("svc-a", "img:1", 2, 2),
                snapshot("svc-c", "img:3", 1, 1),
            ],
            vec![
                route("svc-a", "svc-a.example.com", TerminationScheme::Edge),
                route("svc-c", "svc-c.example.com", TerminationScheme::Reencrypt),
            ],
        );
        let enriched = enrich(correlated, &probe, 4).await;

        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value[0]["ssl_expiry"], "2029-01-15");
        assert_eq!(
            value[1]["ssl_expiry"],
            "no peer certificate presented by svc-c.example.com"
        );
        // The failed probe must not leak into the healthy record
        assert_eq!(value[0]["route"], "https://svc-a.example.com");
    }

    #[tokio::test]
    async fn test_listing_order_is_preserved() {
        let correlated = correlate(
            vec![
                snapshot("zeta", "z:1", 1, 1),
                snapshot("alpha", "a:1", 1, 1),
                snapshot("mid", "m:1", 1, 1),
            ],
            vec![],
        );
        let enriched = enrich(correlated, &StubProbe::empty(), 2).await;

        let names: Vec<_> = enriched.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_correlate_matches_by_exact_name() {
        let correlated = correlate(
            vec![snapshot("svc-a", "img:1", 1, 1), snapshot("svc-b", "img:2", 1, 1)],
            vec![route("svc-a", "svc-a.example.com", TerminationScheme::Edge)],
        );

        assert!(correlated[0].route.is_some());
        assert!(correlated[1].route.is_none());
    }
}
