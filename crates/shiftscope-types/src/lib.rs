//! Shared types for shiftscope
//!
//! This crate contains the data structures passed between the cluster,
//! TLS, log, and gateway layers, together with their wire serialization.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

// ============================================================================
// Configuration
// ============================================================================

/// Connection descriptor for one cluster environment.
///
/// Loaded once at startup from the injected configuration file and never
/// mutated afterwards. The environment id is the key under which the
/// descriptor is registered, not a field of the descriptor itself.
#[derive(Clone, Deserialize)]
pub struct ClusterConfig {
    /// API server endpoint, e.g. `https://api.dev.example.com:6443`
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// Namespace all queries for this environment are scoped to
    pub namespace: String,
    /// Skip certificate verification toward the cluster endpoint.
    ///
    /// Some cluster API servers present self-signed certificates; opting
    /// out of verification is a per-environment decision that must be
    /// visible in the configuration file, never an implicit default.
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

/// Upper bounds for each class of external call.
///
/// Every call that leaves the process carries one of these deadlines; an
/// unbounded external call would let a single stuck cluster hang a request
/// forever.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub authenticate_secs: u64,
    pub list_secs: u64,
    pub pod_log_secs: u64,
    pub tls_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            authenticate_secs: 15,
            list_secs: 10,
            pod_log_secs: 30,
            tls_secs: 5,
        }
    }
}

impl Timeouts {
    pub fn authenticate(&self) -> Duration {
        Duration::from_secs(self.authenticate_secs)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs)
    }

    pub fn pod_log(&self) -> Duration {
        Duration::from_secs(self.pod_log_secs)
    }

    pub fn tls(&self) -> Duration {
        Duration::from_secs(self.tls_secs)
    }
}

/// Fan-out bounds for concurrent external calls within one request.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum simultaneous in-flight calls (pod log fetches, TLS probes)
    pub max_in_flight: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_in_flight: 8 }
    }
}

// ============================================================================
// Cluster resource snapshots
// ============================================================================

/// One deployment as observed at request time.
///
/// Produced fresh per request and never mutated afterwards; enrichment
/// builds a new record instead of editing this one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentSnapshot {
    pub name: String,
    /// Container images in pod-template order, one per container
    pub container_images: Vec<String>,
    pub ready_replicas: i32,
    pub total_replicas: i32,
    /// Match labels of the deployment's pod selector
    pub selector: BTreeMap<String, String>,
}

impl DeploymentSnapshot {
    /// Format replica status as "ready/total"
    pub fn replica_status(&self) -> String {
        format!("{}/{}", self.ready_replicas, self.total_replicas)
    }

    /// All container images joined into one display string.
    ///
    /// Multi-container pod templates list every image, in template order,
    /// separated by ", ". The policy is uniform across all records in a
    /// response.
    pub fn image_summary(&self) -> String {
        self.container_images.join(", ")
    }
}

/// How TLS is terminated for a route. Absent TLS configuration maps to
/// `None`; all three termination modes count as secure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationScheme {
    None,
    Edge,
    Passthrough,
    Reencrypt,
}

impl TerminationScheme {
    /// Parse the raw termination string from a route's TLS block.
    ///
    /// `None` or an empty string means the route carries no TLS
    /// configuration. Anything outside the three known modes is rejected
    /// so a malformed route surfaces as a parse failure instead of being
    /// silently treated as secure.
    pub fn from_raw(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::None),
            Some(s) if s.eq_ignore_ascii_case("edge") => Ok(Self::Edge),
            Some(s) if s.eq_ignore_ascii_case("passthrough") => Ok(Self::Passthrough),
            Some(s) if s.eq_ignore_ascii_case("reencrypt") => Ok(Self::Reencrypt),
            Some(other) => Err(other.to_string()),
        }
    }

    pub fn is_secure(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// One route as observed at request time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteSnapshot {
    pub name: String,
    pub host: String,
    pub termination: TerminationScheme,
}

impl RouteSnapshot {
    /// External URL for the route, scheme chosen by termination mode.
    pub fn url(&self) -> String {
        let scheme = if self.termination.is_secure() {
            "https"
        } else {
            "http"
        };
        format!("{}://{}", scheme, self.host)
    }
}

// ============================================================================
// Enriched records
// ============================================================================

/// Certificate expiry as attached to a deployment's route.
///
/// Only `Date` is a real expiry; the other variants are semantic states
/// that serialize to their sentinel strings on the wire. A failed TLS
/// probe is recorded per record and never fails the surrounding listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertExpiry {
    Date(NaiveDate),
    NotHttps,
    NoRoute,
    Unavailable(String),
}

impl fmt::Display for CertExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::NotHttps => f.write_str("Not HTTPS"),
            Self::NoRoute => f.write_str("no route found"),
            Self::Unavailable(reason) => f.write_str(reason),
        }
    }
}

impl Serialize for CertExpiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A deployment joined with its route and certificate data; the
/// externally visible unit of a listing response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichedDeployment {
    pub name: String,
    pub container_images: Vec<String>,
    pub ready_replicas: i32,
    pub total_replicas: i32,
    /// `None` when no route shares the deployment's name
    pub route_url: Option<String>,
    pub cert_expiry: CertExpiry,
}

impl EnrichedDeployment {
    pub fn new(
        snapshot: DeploymentSnapshot,
        route_url: Option<String>,
        cert_expiry: CertExpiry,
    ) -> Self {
        Self {
            name: snapshot.name,
            container_images: snapshot.container_images,
            ready_replicas: snapshot.ready_replicas,
            total_replicas: snapshot.total_replicas,
            route_url,
            cert_expiry,
        }
    }
}

// Wire shape: {name, image, ready, route, ssl_expiry}. `image` joins the
// ordered container images, `ready` renders "ready/total", a missing
// route renders "N/A".
impl Serialize for EnrichedDeployment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EnrichedDeployment", 5)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("image", &self.container_images.join(", "))?;
        state.serialize_field(
            "ready",
            &format!("{}/{}", self.ready_replicas, self.total_replicas),
        )?;
        state.serialize_field("route", self.route_url.as_deref().unwrap_or("N/A"))?;
        state.serialize_field("ssl_expiry", &self.cert_expiry)?;
        state.end()
    }
}

// ============================================================================
// Log results
// ============================================================================

/// Outcome of one pod's log fetch: the snapshot text, or the reason it
/// could not be retrieved. One pod failing never affects the others.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PodLogResult {
    Log(String),
    Unavailable(String),
}

impl PodLogResult {
    /// Wire rendering: log text as-is, failures as a marked placeholder
    /// so the response keeps its `pod -> string` mapping shape.
    pub fn as_wire_str(&self) -> String {
        match self {
            Self::Log(text) => text.clone(),
            Self::Unavailable(reason) => format!("<unavailable: {}>", reason),
        }
    }
}

impl Serialize for PodLogResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire_str())
    }
}

/// Result of aggregating logs for one deployment.
///
/// `NoPods` is a distinct success state: the deployment exists but its
/// selector currently matches nothing. It must not be conflated with a
/// lookup failure or an empty map produced by some other path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogCollection {
    /// One entry per resolved pod; order is deterministic but carries no
    /// meaning.
    Collected(BTreeMap<String, PodLogResult>),
    NoPods,
}
