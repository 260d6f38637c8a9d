//! Capability probe: generate a throwaway local offer
//!
//! A disposable peer connection is created with the canonical sender stream
//! (`offer` / `video` / `audio`), an offer is requested and the connection is
//! closed again whatever happened. The resulting SDP shows which codecs and
//! extensions this factory would negotiate.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::certificate::CertificateVerifier;
use super::config::WebRtcConfiguration;
use super::factory::PeerConnectionFactory;
use super::peer::PeerConnection;
use super::track::{AudioSlot, LocalTrack, VideoSlot};
use super::LOG_PEER_CHANNEL;
use crate::config::MediaConstraints;
use crate::error::{FactoryError, Result};

pub const PROBE_STREAM_ID: &str = "offer";
pub const PROBE_VIDEO_TRACK_ID: &str = "video";
pub const PROBE_AUDIO_TRACK_ID: &str = "audio";

/// Generate a local offer SDP on a disposable connection
///
/// Cancelling `cancel` abandons the probe with [`FactoryError::Cancelled`];
/// the connection is closed on every path once it exists.
pub async fn create_client_offer_sdp(
    factory: &PeerConnectionFactory,
    config: &WebRtcConfiguration,
    constraints: &MediaConstraints,
    verifier: Arc<dyn CertificateVerifier>,
    cancel: CancellationToken,
) -> Result<String> {
    run_probe(factory, config, constraints, verifier, cancel).await.0
}

/// Probe body; the connection, closed, is returned next to the outcome
/// whenever it was created
///
/// Creation is not raced against `cancel`: a connection the engine already
/// built is always closed.
async fn run_probe(
    factory: &PeerConnectionFactory,
    config: &WebRtcConfiguration,
    constraints: &MediaConstraints,
    verifier: Arc<dyn CertificateVerifier>,
    cancel: CancellationToken,
) -> (Result<String>, Option<PeerConnection>) {
    let peer = match factory
        .create_peer_connection(config, constraints.clone(), verifier, None)
        .await
    {
        Ok(peer) => peer,
        Err(e) => {
            error!(target: LOG_PEER_CHANNEL, "offer probe: {}", e);
            return (Err(e), None);
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FactoryError::Cancelled),
        offer = generate_offer(factory, &peer, constraints) => offer,
    };

    if let Err(e) = peer.close().await {
        error!(target: LOG_PEER_CHANNEL, "offer probe: {}", e);
    }

    match &outcome {
        Ok(sdp) => debug!(target: LOG_PEER_CHANNEL, "offer probe: {} bytes of SDP", sdp.len()),
        Err(e) => info!(target: LOG_PEER_CHANNEL, "offer probe failed: {}", e),
    }
    (outcome, Some(peer))
}

async fn generate_offer(
    factory: &PeerConnectionFactory,
    peer: &PeerConnection,
    constraints: &MediaConstraints,
) -> Result<String> {
    let stream = factory.create_sender_stream(
        PROBE_STREAM_ID,
        VideoSlot::video(PROBE_VIDEO_TRACK_ID),
        AudioSlot::audio(PROBE_AUDIO_TRACK_ID),
        constraints.clone(),
    );
    let stream_ids = [stream.stream_id().to_string()];

    if let Some(video) = stream.video_track() {
        peer.add_track(video as &dyn LocalTrack, &stream_ids).await?;
    }
    if let Some(audio) = stream.audio_track() {
        peer.add_track(audio as &dyn LocalTrack, &stream_ids).await?;
    }

    peer.create_offer(constraints).await
}

/// Handle to a probe running on its own task
pub struct OfferProbeHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl OfferProbeHandle {
    /// Abandon the probe; the completion receives [`FactoryError::Cancelled`]
    /// unless it already ran
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the completion to have run
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(target: LOG_PEER_CHANNEL, "offer probe task failed: {}", e);
        }
    }
}

/// Spawn the probe and hand its outcome to `on_complete` exactly once
///
/// Returns immediately; must be called inside a tokio runtime.
pub fn spawn_offer_probe<F>(
    factory: Arc<PeerConnectionFactory>,
    config: WebRtcConfiguration,
    constraints: MediaConstraints,
    verifier: Arc<dyn CertificateVerifier>,
    on_complete: F,
) -> OfferProbeHandle
where
    F: FnOnce(Result<String>) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let result = create_client_offer_sdp(&factory, &config, &constraints, verifier, token).await;
        on_complete(result);
    });
    OfferProbeHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webrtc::certificate::SystemCertificateVerifier;
    use crate::webrtc::config::IceServer;
    use crate::webrtc::encoder_selector::EncoderFactorySelector;
    use rustls::RootCertStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn factory() -> PeerConnectionFactory {
        PeerConnectionFactory::new(Arc::new(EncoderFactorySelector::new(false)))
    }

    fn verifier() -> Arc<dyn CertificateVerifier> {
        Arc::new(SystemCertificateVerifier::with_roots(RootCertStore::empty()))
    }

    fn bad_config() -> WebRtcConfiguration {
        let mut config = WebRtcConfiguration::host_only();
        config.ice_servers.push(IceServer::stun("bogus://nowhere"));
        config
    }

    #[tokio::test]
    async fn test_offer_contains_both_media_sections() {
        let sdp = create_client_offer_sdp(
            &factory(),
            &WebRtcConfiguration::host_only(),
            &MediaConstraints::new(),
            verifier(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!sdp.is_empty());
        assert!(sdp.contains("m=video"));
        assert!(sdp.contains("m=audio"));
        assert!(sdp.contains("msid:offer"));
    }

    #[tokio::test]
    async fn test_connection_closed_after_probe() {
        let (outcome, peer) = run_probe(
            &factory(),
            &WebRtcConfiguration::host_only(),
            &MediaConstraints::new(),
            verifier(),
            CancellationToken::new(),
        )
        .await;

        assert!(!outcome.unwrap().is_empty());
        let peer = peer.unwrap();
        assert!(peer.is_closed());
        assert_eq!(peer.local_track_count(), 2);
        // a second close is a no-op
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_creation_failure() {
        let result = create_client_offer_sdp(
            &factory(),
            &bad_config(),
            &MediaConstraints::new(),
            verifier(),
            CancellationToken::new(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_creation_failure());
        assert!(err.to_string().starts_with("peer connection creation failed"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = create_client_offer_sdp(
            &factory(),
            &WebRtcConfiguration::host_only(),
            &MediaConstraints::new(),
            verifier(),
            cancel,
        )
        .await;
        assert!(matches!(result, Err(FactoryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_probe_closes_created_connection() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (outcome, peer) = run_probe(
            &factory(),
            &WebRtcConfiguration::host_only(),
            &MediaConstraints::new(),
            verifier(),
            cancel,
        )
        .await;

        assert!(matches!(outcome, Err(FactoryError::Cancelled)));
        let peer = peer.unwrap();
        assert!(peer.is_closed());
        assert_eq!(peer.local_track_count(), 0);
    }

    #[tokio::test]
    async fn test_creation_failure_leaves_no_connection() {
        let (outcome, peer) = run_probe(
            &factory(),
            &bad_config(),
            &MediaConstraints::new(),
            verifier(),
            CancellationToken::new(),
        )
        .await;
        assert!(outcome.unwrap_err().is_creation_failure());
        assert!(peer.is_none());
    }

    #[tokio::test]
    async fn test_spawned_probe_completes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let counter = calls.clone();
        let handle = spawn_offer_probe(
            Arc::new(factory()),
            WebRtcConfiguration::host_only(),
            MediaConstraints::new(),
            verifier(),
            move |result| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(result);
            },
        );
        handle.join().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let sdp = rx.await.unwrap().unwrap();
        assert!(sdp.contains("m=video"));
    }

    #[tokio::test]
    async fn test_spawned_probe_reports_creation_failure() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = spawn_offer_probe(
            Arc::new(factory()),
            bad_config(),
            MediaConstraints::new(),
            verifier(),
            move |result| {
                let _ = tx.send(result);
            },
        );
        handle.join().await;

        let result = rx.await.unwrap();
        assert!(result.unwrap_err().is_creation_failure());
    }

    #[tokio::test]
    async fn test_spawned_probe_cancel() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = spawn_offer_probe(
            Arc::new(factory()),
            WebRtcConfiguration::host_only(),
            MediaConstraints::new(),
            verifier(),
            move |result| {
                let _ = tx.send(result);
            },
        );
        handle.cancel();
        handle.join().await;

        // either the cancellation won or the probe had already finished
        match rx.await.unwrap() {
            Ok(sdp) => assert!(!sdp.is_empty()),
            Err(e) => assert!(matches!(e, FactoryError::Cancelled)),
        }
    }
}
