//! peer-factory - native WebRTC peer connection factory
//!
//! This crate builds peer connections, local media streams and encoder
//! factories from a configuration snapshot, verifies transport certificates,
//! and can probe local media capabilities with a throwaway offer.

pub mod config;
pub mod error;
pub mod webrtc;

pub use error::{FactoryError, Result};
