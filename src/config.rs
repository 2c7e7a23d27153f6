//! Service configuration
//!
//! All environment descriptors, timeouts, and fan-out limits come from
//! one TOML file injected at startup; nothing is hard-coded in source.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use shiftscope_types::{ClusterConfig, Limits, Timeouts};

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Address the gateway binds to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// Environment id -> cluster descriptor
    pub clusters: BTreeMap<String, ClusterConfig>,
}

fn default_listen() -> SocketAddr {
    ([0, 0, 0, 0], 5000).into()
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if settings.clusters.is_empty() {
            anyhow::bail!("config file {} defines no clusters", path.display());
        }
        Ok(settings)
    }

    pub fn cluster(&self, env: &str) -> Option<&ClusterConfig> {
        self.clusters.get(env)
    }

    pub fn environments(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        listen = "127.0.0.1:5000"

        [limits]
        max_in_flight = 4

        [timeouts]
        tls_secs = 3

        [clusters.dev]
        api_url = "https://api.dev.example.com:6443"
        username = "dev-user"
        password = "dev-pass"
        namespace = "dev-apps"
        insecure_skip_tls_verify = true

        [clusters.uat]
        api_url = "https://api.uat.example.com:6443"
        username = "uat-user"
        password = "uat-pass"
        namespace = "uat-apps"
    "#;

    #[test]
    fn test_sample_config_parses() {
        let settings: Settings = toml::from_str(SAMPLE).unwrap();
        assert_eq!(settings.listen.port(), 5000);
        assert_eq!(settings.limits.max_in_flight, 4);
        assert_eq!(settings.timeouts.tls_secs, 3);
        // Unspecified timeouts keep their defaults
        assert_eq!(settings.timeouts.pod_log_secs, 30);

        let dev = settings.cluster("dev").unwrap();
        assert!(dev.insecure_skip_tls_verify);
        let uat = settings.cluster("uat").unwrap();
        assert!(!uat.insecure_skip_tls_verify);

        assert_eq!(settings.environments(), vec!["dev", "uat"]);
        assert!(settings.cluster("prod").is_none());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [clusters.dev]
            api_url = "https://api.dev.example.com:6443"
            username = "u"
            password = "p"
            namespace = "ns"
        "#,
        )
        .unwrap();
        assert_eq!(settings.listen.port(), 5000);
        assert_eq!(settings.limits.max_in_flight, 8);
        assert_eq!(settings.timeouts.tls_secs, 5);
    }
}
