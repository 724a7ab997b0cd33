// ABOUTME: JSON envelope definitions for the control channel between client and gateway
// Inbound frames are tagged by a `type` field, outbound frames are identified by destination

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::FrameError;

// ============================================
// Gateway → Client
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Raw terminal output with ANSI codes
    Output { data: String },
    /// Remote session established
    Connected {
        #[serde(default)]
        message: String,
    },
    /// Remote side reported a failure
    Error {
        #[serde(default)]
        message: String,
    },
}

/// Result of decoding an inbound payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Frame(InboundFrame),
    /// Well-formed envelope with a type nobody handles
    Unknown(String),
}

impl Inbound {
    pub fn parse(body: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| FrameError::Malformed(e.to_string()))?;

        let frame_type = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(FrameError::MissingType)?;

        match frame_type {
            "output" | "connected" | "error" => serde_json::from_value(value)
                .map(Inbound::Frame)
                .map_err(|e| FrameError::Malformed(e.to_string())),
            other => Ok(Inbound::Unknown(other.to_string())),
        }
    }
}

// ============================================
// Client → Gateway
// ============================================

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeMessage {
    pub cols: u16,
    pub rows: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    ConnectRequest(ConnectRequest),
    Input(InputMessage),
    Resize(ResizeMessage),
    DisconnectRequest(DisconnectRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundKind {
    ConnectRequest,
    Input,
    Resize,
    DisconnectRequest,
}

impl OutboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundKind::ConnectRequest => "connect-request",
            OutboundKind::Input => "input",
            OutboundKind::Resize => "resize",
            OutboundKind::DisconnectRequest => "disconnect-request",
        }
    }
}

impl fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutboundFrame {
    pub fn input(data: impl Into<String>) -> Self {
        OutboundFrame::Input(InputMessage { data: data.into() })
    }

    pub fn resize(cols: u16, rows: u16) -> Self {
        OutboundFrame::Resize(ResizeMessage { cols, rows })
    }

    pub fn disconnect() -> Self {
        OutboundFrame::DisconnectRequest(DisconnectRequest {})
    }

    pub fn kind(&self) -> OutboundKind {
        match self {
            OutboundFrame::ConnectRequest(_) => OutboundKind::ConnectRequest,
            OutboundFrame::Input(_) => OutboundKind::Input,
            OutboundFrame::Resize(_) => OutboundKind::Resize,
            OutboundFrame::DisconnectRequest(_) => OutboundKind::DisconnectRequest,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Fixed logical destinations, one per outbound kind plus the inbound queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Destinations {
    pub connect: String,
    pub input: String,
    pub resize: String,
    pub disconnect: String,
    pub output: String,
}

impl Default for Destinations {
    fn default() -> Self {
        Self {
            connect: "/app/ssh/connect".to_string(),
            input: "/app/ssh/input".to_string(),
            resize: "/app/ssh/resize".to_string(),
            disconnect: "/app/ssh/disconnect".to_string(),
            output: "/user/queue/output".to_string(),
        }
    }
}

impl Destinations {
    pub fn for_kind(&self, kind: OutboundKind) -> &str {
        match kind {
            OutboundKind::ConnectRequest => &self.connect,
            OutboundKind::Input => &self.input,
            OutboundKind::Resize => &self.resize,
            OutboundKind::DisconnectRequest => &self.disconnect,
        }
    }
}

// ============================================
// Connection State
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Failed,
    Reconnecting,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Offline",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Open => "Connected",
            ConnectionState::Failed => "Connection failed",
            ConnectionState::Reconnecting => "Reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Round-trip estimate published by the latency probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Latency {
    #[default]
    Unknown,
    Millis(u64),
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Unknown => f.write_str("-- ms"),
            Latency::Millis(ms) => write!(f, "{ms} ms"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub latency: Latency,
    pub reconnect_in: Option<u32>,
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            latency: Latency::Unknown,
            reconnect_in: None,
            last_error: None,
            reconnect_attempts: 0,
        }
    }
}
