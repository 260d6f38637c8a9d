//! Transport-level configuration passed to peer connection creation

use serde::{Deserialize, Serialize};
use webrtc::ice::url::{SchemeType, Url};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;

use crate::config::MediaConstraints;
use crate::error::{FactoryError, Result};

/// ICE server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs (e.g., ["stun:stun.example.com:3478", "turn:turn.example.com:3478?transport=tcp"])
    pub urls: Vec<String>,
    /// Username for TURN authentication
    #[serde(default)]
    pub username: String,
    /// Credential for TURN authentication
    #[serde(default)]
    pub credential: String,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: String::new(),
            credential: String::new(),
        }
    }

    pub fn turn(url: impl Into<String>, username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: username.into(),
            credential: credential.into(),
        }
    }

    /// Parse every URL and require credentials for TURN entries
    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(FactoryError::Config("ICE server without URLs".to_string()));
        }
        for raw in &self.urls {
            let url = Url::parse_url(raw)
                .map_err(|e| FactoryError::Config(format!("invalid ICE server URL {}: {}", raw, e)))?;
            if matches!(url.scheme, SchemeType::Turn | SchemeType::Turns)
                && (self.username.is_empty() || self.credential.is_empty())
            {
                return Err(FactoryError::Config(format!(
                    "TURN server {} requires username and credential",
                    raw
                )));
            }
        }
        Ok(())
    }
}

/// ICE transport policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    #[default]
    All,
    Relay,
}

/// Bundle policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlePolicy {
    #[default]
    Balanced,
    MaxCompat,
    MaxBundle,
}

/// RTCP mux policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcpMuxPolicy {
    Negotiate,
    #[default]
    Require,
}

/// WebRTC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfiguration {
    /// ICE servers
    pub ice_servers: Vec<IceServer>,
    /// ICE transport policy
    pub ice_transport_policy: IceTransportPolicy,
    /// Bundle policy
    pub bundle_policy: BundlePolicy,
    /// RTCP mux policy
    pub rtcp_mux_policy: RtcpMuxPolicy,
    /// Default media constraints for connections built from this configuration
    pub constraints: MediaConstraints,
}

impl Default for WebRtcConfiguration {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::stun("stun:stun.l.google.com:19302")],
            ice_transport_policy: IceTransportPolicy::All,
            bundle_policy: BundlePolicy::Balanced,
            rtcp_mux_policy: RtcpMuxPolicy::Require,
            constraints: MediaConstraints::default(),
        }
    }
}

impl WebRtcConfiguration {
    /// Configuration without any ICE server (host candidates only)
    pub fn host_only() -> Self {
        Self {
            ice_servers: vec![],
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for server in &self.ice_servers {
            server.validate()?;
        }
        Ok(())
    }

    /// Convert into the engine's configuration record
    pub fn to_rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = self
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone(),
                credential: server.credential.clone(),
                ..Default::default()
            })
            .collect();

        RTCConfiguration {
            ice_servers,
            ice_transport_policy: match self.ice_transport_policy {
                IceTransportPolicy::All => RTCIceTransportPolicy::All,
                IceTransportPolicy::Relay => RTCIceTransportPolicy::Relay,
            },
            bundle_policy: match self.bundle_policy {
                BundlePolicy::Balanced => RTCBundlePolicy::Balanced,
                BundlePolicy::MaxCompat => RTCBundlePolicy::MaxCompat,
                BundlePolicy::MaxBundle => RTCBundlePolicy::MaxBundle,
            },
            rtcp_mux_policy: match self.rtcp_mux_policy {
                RtcpMuxPolicy::Negotiate => RTCRtcpMuxPolicy::Negotiate,
                RtcpMuxPolicy::Require => RTCRtcpMuxPolicy::Require,
            },
            ..Default::default()
        }
    }
}
