//! Active video encoder factory selection
//!
//! Holds the single-layer and the simulcast encoder factories and routes
//! every capability query and encoder instantiation to whichever is current.
//! Mode changes and encoder creation are serialized by a lock.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::codec::{
    CodecInfo, DefaultVideoEncoderFactory, SimulcastVideoEncoderFactory, VideoEncoder,
    VideoEncoderFactory,
};
use super::LOG_PEER_CHANNEL;

/// Selects between the default and the simulcast encoder factory
pub struct EncoderFactorySelector {
    default_factory: Arc<dyn VideoEncoderFactory>,
    simulcast_factory: Arc<dyn VideoEncoderFactory>,
    simulcast_enabled: RwLock<bool>,
}

impl EncoderFactorySelector {
    /// Default factory plus a simulcast factory using it as primary and fallback
    pub fn new(simulcast_enabled: bool) -> Self {
        let default_factory: Arc<dyn VideoEncoderFactory> =
            Arc::new(DefaultVideoEncoderFactory::new());
        let simulcast_factory = Arc::new(SimulcastVideoEncoderFactory::new(
            default_factory.clone(),
            default_factory.clone(),
        ));
        Self::with_factories(default_factory, simulcast_factory, simulcast_enabled)
    }

    pub fn with_factories(
        default_factory: Arc<dyn VideoEncoderFactory>,
        simulcast_factory: Arc<dyn VideoEncoderFactory>,
        simulcast_enabled: bool,
    ) -> Self {
        Self {
            default_factory,
            simulcast_factory,
            simulcast_enabled: RwLock::new(simulcast_enabled),
        }
    }

    /// Switch the active factory
    ///
    /// Only encoders created afterwards are affected; connections that
    /// already exist keep the encoders they negotiated.
    pub fn set_simulcast(&self, enabled: bool) {
        let mut current = self.simulcast_enabled.write();
        if *current != enabled {
            info!(
                target: LOG_PEER_CHANNEL,
                "encoder factory switched to {}",
                if enabled { "simulcast" } else { "default" }
            );
        }
        *current = enabled;
    }

    pub fn simulcast_enabled(&self) -> bool {
        *self.simulcast_enabled.read()
    }

    pub fn current_factory(&self) -> Arc<dyn VideoEncoderFactory> {
        self.select(*self.simulcast_enabled.read())
    }

    /// Codecs of the active factory, in preference order
    pub fn supported_codecs(&self) -> Vec<CodecInfo> {
        let enabled = self.simulcast_enabled.read();
        self.select(*enabled).supported_codecs()
    }

    /// Instantiate an encoder through the active factory
    pub fn create_encoder(&self, codec: &CodecInfo) -> Option<VideoEncoder> {
        let enabled = self.simulcast_enabled.read();
        let encoder = self.select(*enabled).create_encoder(codec);
        match &encoder {
            Some(e) => debug!(
                target: LOG_PEER_CHANNEL,
                "created {} encoder for {} ({} layers)",
                e.implementation,
                e.codec.name,
                e.layers.len()
            ),
            None => debug!(target: LOG_PEER_CHANNEL, "no encoder for {}", codec.name),
        }
        encoder
    }

    fn select(&self, simulcast: bool) -> Arc<dyn VideoEncoderFactory> {
        if simulcast {
            self.simulcast_factory.clone()
        } else {
            self.default_factory.clone()
        }
    }
}

impl Default for EncoderFactorySelector {
    fn default() -> Self {
        Self::new(false)
    }
}

impl VideoEncoderFactory for EncoderFactorySelector {
    fn name(&self) -> &'static str {
        self.current_factory().name()
    }

    fn supported_codecs(&self) -> Vec<CodecInfo> {
        EncoderFactorySelector::supported_codecs(self)
    }

    fn create_encoder(&self, codec: &CodecInfo) -> Option<VideoEncoder> {
        EncoderFactorySelector::create_encoder(self, codec)
    }
}
