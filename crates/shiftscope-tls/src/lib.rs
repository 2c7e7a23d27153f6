//! Route certificate inspection for shiftscope
//!
//! Performs a bounded-time TLS handshake against a route host and
//! extracts the peer certificate's expiry date. Every failure mode maps
//! to one error type carrying a human-readable cause; callers treat any
//! failure as "expiry unknown" for that one record.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

/// Failures while inspecting a route host's certificate.
#[derive(Debug, Error)]
pub enum TlsInspectError {
    #[error("invalid host name '{0}'")]
    InvalidHost(String),

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no peer certificate presented by {0}")]
    NoCertificate(String),

    #[error("certificate from {host} could not be parsed: {reason}")]
    Parse { host: String, reason: String },

    #[error("certificate inspection of {host} timed out after {limit:?}")]
    Timeout { host: String, limit: Duration },
}

/// Inspects route hosts over TLS on port 443.
///
/// The connector verifies peers against the webpki trust roots, so an
/// expired or untrusted certificate reports as a handshake failure with
/// its cause rather than a date.
pub struct TlsInspector {
    config: Arc<rustls::ClientConfig>,
    timeout: Duration,
}

impl TlsInspector {
    pub fn new(timeout: Duration) -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self {
            config: Arc::new(config),
            timeout,
        }
    }

    /// Connect to `host:443`, complete a handshake, and return the peer
    /// certificate's "not valid after" timestamp as a calendar date.
    ///
    /// The connect, handshake, and extraction share one deadline.
    pub async fn inspect_expiry(&self, host: &str) -> Result<NaiveDate, TlsInspectError> {
        match tokio::time::timeout(self.timeout, self.probe(host)).await {
            Err(_) => Err(TlsInspectError::Timeout {
                host: host.to_string(),
                limit: self.timeout,
            }),
            Ok(result) => result,
        }
    }

    async fn probe(&self, host: &str) -> Result<NaiveDate, TlsInspectError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| TlsInspectError::InvalidHost(host.to_string()))?;

        let addr = format!("{}:443", host);
        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|source| TlsInspectError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let connector = TlsConnector::from(self.config.clone());
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|source| TlsInspectError::Handshake {
                host: host.to_string(),
                source,
            })?;

        let (_, connection) = stream.get_ref();
        let cert = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| TlsInspectError::NoCertificate(host.to_string()))?;

        let expiry = expiry_from_der(cert.as_ref()).map_err(|reason| TlsInspectError::Parse {
            host: host.to_string(),
            reason,
        })?;

        tracing::debug!(host = %host, expiry = %expiry, "certificate inspected");
        Ok(expiry)
    }
}

/// Extract the notAfter validity bound from a DER-encoded certificate.
fn expiry_from_der(der: &[u8]) -> Result<NaiveDate, String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;
    let not_after = cert.validity().not_after.to_datetime();
    NaiveDate::from_ymd_opt(
        not_after.year(),
        u8::from(not_after.month()) as u32,
        not_after.day() as u32,
    )
    .ok_or_else(|| "notAfter timestamp is out of calendar range".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_extracted_from_generated_certificate() {
        let mut params =
            rcgen::CertificateParams::new(vec!["svc-a.example.com".to_string()]).unwrap();
        params.not_before = rcgen::date_time_ymd(2024, 1, 1);
        params.not_after = rcgen::date_time_ymd(2031, 3, 9);
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        let expiry = expiry_from_der(cert.der().as_ref()).unwrap();
        assert_eq!(expiry, NaiveDate::from_ymd_opt(2031, 3, 9).unwrap());
    }

    #[test]
    fn test_garbage_der_is_rejected() {
        assert!(expiry_from_der(&[0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn test_error_messages_carry_the_cause() {
        let err = TlsInspectError::Timeout {
            host: "svc-a.example.com".to_string(),
            limit: Duration::from_secs(5),
        };
        assert_eq!(
            err.to_string(),
            "certificate inspection of svc-a.example.com timed out after 5s"
        );

        let err = TlsInspectError::InvalidHost("bad host".to_string());
        assert!(err.to_string().contains("bad host"));
    }
}
