// ABOUTME: Error types for the control channel transport
// Covers handshake failures, channel loss, probe failures and inbound frame decoding

use std::time::Duration;
use thiserror::Error;

use super::stomp::StompError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("WebSocket connect failed: {0}")]
    Socket(String),

    #[error("Handshake rejected: {0}")]
    Rejected(String),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(#[from] StompError),

    #[error("Channel closed: {0}")]
    Closed(String),

    #[error("Disconnected before the connection opened")]
    Disconnected,

    #[error("Probe failed: {0}")]
    Probe(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Frame has no type field")]
    MissingType,
}
