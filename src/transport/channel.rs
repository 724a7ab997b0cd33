// ABOUTME: Physical control channel between the connection state machine and the socket
// Provides the WebSocket + STOMP connector and an in-memory pair for tests and embedding

use super::error::TransportError;
use super::stomp::{StompCommand, StompFrame};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, error, info, trace, warn};

/// Instructions from the connection to the socket pump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    Subscribe { id: String, destination: String },
    Send { destination: String, body: String },
    Close,
}

/// What the socket pump reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message {
        destination: Option<String>,
        body: String,
    },
    Closed {
        reason: String,
    },
}

/// An opened physical channel. Never reused across connection attempts.
pub struct PhysicalChannel {
    commands: mpsc::UnboundedSender<ChannelCommand>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    pump: Option<AbortHandle>,
}

impl PhysicalChannel {
    pub fn new(
        commands: mpsc::UnboundedSender<ChannelCommand>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        pump: Option<AbortHandle>,
    ) -> Self {
        Self {
            commands,
            events: Some(events),
            pump,
        }
    }

    /// In-memory channel wired to a [`RemotePeer`] instead of a socket
    pub fn pair() -> (Self, RemotePeer) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self::new(command_tx, event_rx, None),
            RemotePeer {
                commands: command_rx,
                events: event_tx,
            },
        )
    }

    /// Queue a message for `destination`. False if the pump is gone.
    pub fn send(&self, destination: &str, body: String) -> bool {
        self.commands
            .send(ChannelCommand::Send {
                destination: destination.to_string(),
                body,
            })
            .is_ok()
    }

    /// Subscribe to `destination` and hand out the inbound event stream.
    ///
    /// The stream can only be taken once, so a channel carries at most one
    /// subscription for its whole lifetime.
    pub fn subscribe(
        &mut self,
        id: &str,
        destination: &str,
    ) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        let events = self.events.take()?;
        let _ = self.commands.send(ChannelCommand::Subscribe {
            id: id.to_string(),
            destination: destination.to_string(),
        });
        Some(events)
    }

    pub fn is_subscribed(&self) -> bool {
        self.events.is_none()
    }

    /// Ask the pump to say goodbye and shut the socket.
    ///
    /// The pump is detached rather than aborted so it can flush what is
    /// already queued, the DISCONNECT frame included.
    pub fn close(mut self) {
        let _ = self.commands.send(ChannelCommand::Close);
        self.pump.take();
    }
}

impl Drop for PhysicalChannel {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl fmt::Debug for PhysicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalChannel")
            .field("subscribed", &self.is_subscribed())
            .field("has_pump", &self.pump.is_some())
            .finish_non_exhaustive()
    }
}

/// The far end of an in-memory [`PhysicalChannel`]
#[derive(Debug)]
pub struct RemotePeer {
    commands: mpsc::UnboundedReceiver<ChannelCommand>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl RemotePeer {
    /// Deliver a message body to the client. False once the client stopped listening.
    pub fn deliver(&self, body: impl Into<String>) -> bool {
        self.events
            .send(ChannelEvent::Message {
                destination: None,
                body: body.into(),
            })
            .is_ok()
    }

    pub fn close(&self, reason: impl Into<String>) -> bool {
        self.events
            .send(ChannelEvent::Closed {
                reason: reason.into(),
            })
            .is_ok()
    }

    pub async fn next_command(&mut self) -> Option<ChannelCommand> {
        self.commands.recv().await
    }

    pub fn try_next_command(&mut self) -> Option<ChannelCommand> {
        self.commands.try_recv().ok()
    }

    /// Everything the client has queued so far
    pub fn drain_commands(&mut self) -> Vec<ChannelCommand> {
        let mut drained = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            drained.push(command);
        }
        drained
    }
}

/// Opens fresh physical channels
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<PhysicalChannel, TransportError>;
}

/// WebSocket connector speaking STOMP 1.2
#[derive(Debug, Clone)]
pub struct StompConnector {
    /// WebSocket URL of the gateway's STOMP endpoint
    url: String,

    /// Value of the STOMP `host` header
    host: String,

    /// How long to wait for CONNECTED after the socket opens
    handshake_timeout: Duration,
}

impl StompConnector {
    pub fn new(url: impl Into<String>, host: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            host: host.into(),
            handshake_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the server's answer to CONNECT
    async fn await_connected<S>(stream: &mut S) -> Result<StompFrame, TransportError>
    where
        S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        while let Some(message) = stream.next().await {
            match message {
                Ok(tungstenite::Message::Text(text)) => {
                    let Some(frame) = StompFrame::decode(&text)? else {
                        continue;
                    };
                    return match frame.command {
                        StompCommand::Connected => Ok(frame),
                        StompCommand::Error => {
                            let reason = frame
                                .get("message")
                                .map(str::to_string)
                                .unwrap_or_else(|| frame.body.clone());
                            Err(TransportError::Rejected(reason))
                        }
                        other => Err(TransportError::Rejected(format!(
                            "unexpected {other} frame during handshake"
                        ))),
                    };
                }
                Ok(tungstenite::Message::Close(_)) => {
                    return Err(TransportError::Closed(
                        "server closed the socket during handshake".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => return Err(TransportError::Socket(e.to_string())),
            }
        }
        Err(TransportError::Closed("stream ended during handshake".to_string()))
    }

    /// Move frames between the command queue and the socket until either side closes
    async fn pump<W, R>(
        mut sink: W,
        mut stream: R,
        mut commands: mpsc::UnboundedReceiver<ChannelCommand>,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) where
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
        R: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let frame = match command {
                        Some(ChannelCommand::Subscribe { id, destination }) => {
                            StompFrame::subscribe(&id, &destination)
                        }
                        Some(ChannelCommand::Send { destination, body }) => {
                            StompFrame::send(&destination, body)
                        }
                        Some(ChannelCommand::Close) | None => {
                            debug!("Closing control channel");
                            let goodbye = async {
                                let _ = sink
                                    .send(tungstenite::Message::Text(StompFrame::disconnect().encode()))
                                    .await;
                                let _ = sink.close().await;
                            };
                            if tokio::time::timeout(Duration::from_secs(2), goodbye).await.is_err() {
                                warn!("Timed out closing control channel");
                            }
                            let _ = events.send(ChannelEvent::Closed {
                                reason: "closed by client".to_string(),
                            });
                            break;
                        }
                    };

                    trace!("Sending {} frame", frame.command);
                    if let Err(e) = sink.send(tungstenite::Message::Text(frame.encode())).await {
                        error!("Failed to send STOMP frame: {}", e);
                        let _ = events.send(ChannelEvent::Closed { reason: e.to_string() });
                        break;
                    }
                }

                message = stream.next() => {
                    match message {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            match StompFrame::decode(&text) {
                                Ok(Some(frame)) => match frame.command {
                                    StompCommand::Message => {
                                        let destination = frame.get("destination").map(str::to_string);
                                        if events
                                            .send(ChannelEvent::Message { destination, body: frame.body })
                                            .is_err()
                                        {
                                            debug!("Nobody listening for inbound frames, stopping pump");
                                            break;
                                        }
                                    }
                                    StompCommand::Error => {
                                        let reason = frame
                                            .get("message")
                                            .map(str::to_string)
                                            .unwrap_or_else(|| frame.body.clone());
                                        error!("Gateway sent STOMP ERROR: {}", reason);
                                        let _ = events.send(ChannelEvent::Closed { reason });
                                        break;
                                    }
                                    other => debug!("Ignoring {} frame", other),
                                },
                                Ok(None) => trace!("Heart-beat received"),
                                Err(e) => warn!("Dropping undecodable STOMP frame: {}", e),
                            }
                        }
                        Some(Ok(tungstenite::Message::Close(_))) => {
                            info!("Control channel closed by server");
                            let _ = events.send(ChannelEvent::Closed {
                                reason: "closed by server".to_string(),
                            });
                            break;
                        }
                        Some(Ok(_)) => {
                            // Binary, Ping and Pong carry nothing for us
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            let _ = events.send(ChannelEvent::Closed { reason: e.to_string() });
                            break;
                        }
                        None => {
                            let _ = events.send(ChannelEvent::Closed {
                                reason: "stream ended".to_string(),
                            });
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Connector for StompConnector {
    /// Socket connect, WebSocket upgrade and STOMP handshake share one deadline
    async fn open(&self) -> Result<PhysicalChannel, TransportError> {
        info!("Opening control channel to {}", self.url);

        let timeout = self.handshake_timeout;
        tokio::time::timeout(timeout, self.handshake())
            .await
            .map_err(|_| {
                warn!("Control channel handshake timed out after {:?}", timeout);
                TransportError::HandshakeTimeout(timeout)
            })?
    }
}

impl StompConnector {
    async fn handshake(&self) -> Result<PhysicalChannel, TransportError> {
        let (ws_stream, response) = connect_async(self.url.as_str()).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("refused") {
                error!("Connection refused - is the gateway running at {}?", self.url);
            }
            TransportError::Socket(message)
        })?;
        debug!("WebSocket response status: {:?}", response.status());

        let (mut sink, mut stream) = ws_stream.split();

        sink.send(tungstenite::Message::Text(
            StompFrame::connect(&self.host).encode(),
        ))
        .await
        .map_err(|e| TransportError::Socket(e.to_string()))?;

        let connected = Self::await_connected(&mut stream).await?;
        info!(
            "STOMP session established (version {})",
            connected.get("version").unwrap_or("unknown")
        );

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(Self::pump(sink, stream, command_rx, event_tx));

        Ok(PhysicalChannel::new(command_tx, event_rx, Some(pump.abort_handle())))
    }
}
