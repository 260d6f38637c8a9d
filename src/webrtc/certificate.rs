//! Transport certificate trust decisions
//!
//! A verifier is handed to every peer connection at creation time and is the
//! only place where a remote transport certificate is accepted or rejected.
//! Verification never fails loudly: every problem becomes
//! [`CertificateVerification::Untrusted`] plus an error log line naming the
//! stage that failed.

use std::sync::Arc;

use base64::Engine as _;
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::RootCertStore;
use tracing::{error, info, warn};
use x509_parser::prelude::*;

use super::LOG_PEER_CHANNEL;

/// Outcome of a trust evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateVerification {
    Trusted,
    Untrusted(String),
}

impl CertificateVerification {
    pub fn is_trusted(&self) -> bool {
        matches!(self, CertificateVerification::Trusted)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CertificateVerification::Trusted => None,
            CertificateVerification::Untrusted(reason) => Some(reason),
        }
    }
}

/// Pluggable trust decision for a leaf-first certificate chain
pub trait CertificateVerifier: Send + Sync {
    fn verify(&self, chain: &[CertificateDer<'_>]) -> CertificateVerification;
}

/// Verifier evaluating chains against a root store under the basic X.509
/// policy: the chain must lead to a trust anchor, host names are not checked.
pub struct SystemCertificateVerifier {
    roots: Arc<RootCertStore>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl SystemCertificateVerifier {
    /// Verifier backed by the platform trust store
    pub fn new() -> Self {
        let loaded = rustls_native_certs::load_native_certs();
        for err in &loaded.errors {
            warn!(target: LOG_PEER_CHANNEL, "failed to load system certificate: {}", err);
        }

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
        info!(
            target: LOG_PEER_CHANNEL,
            "loaded {} system trust anchors ({} ignored)", added, ignored
        );
        Self::with_roots(roots)
    }

    /// Verifier backed by an explicit root store
    pub fn with_roots(roots: RootCertStore) -> Self {
        Self {
            roots: Arc::new(roots),
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }

    pub fn trust_anchor_count(&self) -> usize {
        self.roots.len()
    }

    fn evaluate(&self, chain: &[CertificateDer<'_>]) -> CertificateVerification {
        let Some(leaf) = chain.first() else {
            error!(target: LOG_PEER_CHANNEL, "verify: empty certificate chain");
            return CertificateVerification::Untrusted("empty certificate chain".to_string());
        };

        // parse
        let subject = match X509Certificate::from_der(leaf.as_ref()) {
            Ok((_, cert)) => cert.subject().to_string(),
            Err(e) => {
                error!(
                    target: LOG_PEER_CHANNEL,
                    "verify: certificate parse failed: {} certificate={}",
                    e,
                    base64::engine::general_purpose::STANDARD.encode(leaf.as_ref())
                );
                return CertificateVerification::Untrusted(format!(
                    "certificate parse failed: {}",
                    e
                ));
            }
        };
        info!(target: LOG_PEER_CHANNEL, "verify: cert subject={}", subject);

        // trust object
        let parsed = match ParsedCertificate::try_from(leaf) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(target: LOG_PEER_CHANNEL, "verify: trust creation failed: {}", e);
                return CertificateVerification::Untrusted(format!("trust creation failed: {}", e));
            }
        };

        // evaluation
        let result = verify_server_cert_signed_by_trust_anchor(
            &parsed,
            &self.roots,
            &chain[1..],
            UnixTime::now(),
            self.algorithms.all,
        );
        match result {
            Ok(()) => {
                info!(target: LOG_PEER_CHANNEL, "verify: result => true");
                CertificateVerification::Trusted
            }
            Err(e) => {
                error!(target: LOG_PEER_CHANNEL, "verify: trust evaluation failed: {}", e);
                CertificateVerification::Untrusted(format!("trust evaluation failed: {}", e))
            }
        }
    }
}

impl Default for SystemCertificateVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateVerifier for SystemCertificateVerifier {
    fn verify(&self, chain: &[CertificateDer<'_>]) -> CertificateVerification {
        self.evaluate(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{
        BasicConstraints, CertificateParams, DnType, IsCa, KeyPair,
    };

    fn empty_store_verifier() -> SystemCertificateVerifier {
        SystemCertificateVerifier::with_roots(RootCertStore::empty())
    }

    #[test]
    fn test_empty_chain_is_untrusted() {
        let result = empty_store_verifier().verify(&[]);
        assert_eq!(
            result,
            CertificateVerification::Untrusted("empty certificate chain".to_string())
        );
    }

    #[test]
    fn test_empty_bytes_are_untrusted() {
        let result = empty_store_verifier().verify(&[CertificateDer::from(Vec::new())]);
        assert!(!result.is_trusted());
        assert!(result.reason().unwrap().starts_with("certificate parse failed"));
    }

    #[test]
    fn test_malformed_bytes_are_untrusted() {
        let garbage = CertificateDer::from(vec![0x30, 0x82, 0x01, 0x00, 0xde, 0xad, 0xbe, 0xef]);
        let result = empty_store_verifier().verify(&[garbage]);
        assert!(!result.is_trusted());
    }

    #[test]
    fn test_self_signed_leaf_is_untrusted() {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let leaf = certified.cert.der().clone();

        let result = empty_store_verifier().verify(&[leaf]);
        assert!(!result.is_trusted());
        assert!(result.reason().unwrap().starts_with("trust evaluation failed"));
    }

    #[test]
    fn test_leaf_signed_by_trusted_root() {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "peer-factory test root");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let mut leaf_params = CertificateParams::new(vec!["media.example.com".to_string()]).unwrap();
        leaf_params
            .distinguished_name
            .push(DnType::CommonName, "media.example.com");
        let leaf = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        let mut roots = RootCertStore::empty();
        roots.add(ca_cert.der().clone()).unwrap();
        let verifier = SystemCertificateVerifier::with_roots(roots);
        assert_eq!(verifier.trust_anchor_count(), 1);

        let result = verifier.verify(&[leaf.der().clone()]);
        assert_eq!(result, CertificateVerification::Trusted);
        assert!(result.reason().is_none());
    }
}
