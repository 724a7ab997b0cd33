// ABOUTME: Routes inbound gateway frames to the terminal session that currently has focus
// Owns the single inbound subscription of an open control channel

use super::channel::{ChannelEvent, PhysicalChannel};
use super::protocol::{Inbound, InboundFrame};
use super::TransportEvent;
use crate::session::{SessionId, SessionRegistry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const SUBSCRIPTION_ID: &str = "sub-0";

/// What happened to one inbound body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Output written to this session's sink
    Delivered(SessionId),
    /// Output arrived while no session was active
    NoActiveSession,
    /// The gateway confirmed the remote session
    Connected(String),
    /// The gateway reported an error
    RemoteError(String),
    /// Well-formed frame of a type nobody handles
    Ignored(String),
    /// Undecodable body
    Dropped,
}

#[derive(Debug)]
struct Subscription {
    epoch: u64,
    forwarder: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

#[derive(Debug)]
pub struct InboundRouter {
    destination: String,
    subscription: Option<Subscription>,
}

impl InboundRouter {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            subscription: None,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Subscribe to the inbound queue on a freshly opened channel.
    ///
    /// Returns false when this epoch is already subscribed, so a repeated
    /// open notification never yields a second subscription.
    pub fn subscribe(
        &mut self,
        channel: &mut PhysicalChannel,
        epoch: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> bool {
        if self
            .subscription
            .as_ref()
            .is_some_and(|subscription| subscription.epoch == epoch)
        {
            debug!("Inbound queue already subscribed for epoch {}", epoch);
            return false;
        }

        let Some(mut inbound) = channel.subscribe(SUBSCRIPTION_ID, &self.destination) else {
            warn!("Channel for epoch {} was already subscribed", epoch);
            return false;
        };

        let forwarder = tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                let closed = matches!(event, ChannelEvent::Closed { .. });
                if events.send(TransportEvent::Channel { epoch, event }).is_err() || closed {
                    return;
                }
            }
            let _ = events.send(TransportEvent::Channel {
                epoch,
                event: ChannelEvent::Closed {
                    reason: "channel dropped".to_string(),
                },
            });
        });

        info!("Subscribed to {} (epoch {})", self.destination, epoch);
        self.subscription = Some(Subscription { epoch, forwarder });
        true
    }

    /// Drop the subscription of the current channel
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!("Unsubscribed inbound queue (epoch {})", subscription.epoch);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn subscribed_epoch(&self) -> Option<u64> {
        self.subscription.as_ref().map(|subscription| subscription.epoch)
    }

    /// Decode one inbound body and hand terminal output to the active session
    pub fn route(&self, body: &str, sessions: &mut SessionRegistry) -> RouteOutcome {
        match Inbound::parse(body) {
            Ok(Inbound::Frame(InboundFrame::Output { data })) => {
                match sessions.write_to_active(data.as_bytes()) {
                    Some(id) => RouteOutcome::Delivered(id),
                    None => {
                        debug!("Dropping {} bytes of output, no active session", data.len());
                        RouteOutcome::NoActiveSession
                    }
                }
            }
            Ok(Inbound::Frame(InboundFrame::Connected { message })) => {
                info!("Remote session connected: {}", message);
                RouteOutcome::Connected(message)
            }
            Ok(Inbound::Frame(InboundFrame::Error { message })) => {
                error!("Gateway reported an error: {}", message);
                RouteOutcome::RemoteError(message)
            }
            Ok(Inbound::Unknown(frame_type)) => {
                debug!("Ignoring inbound frame of type {}", frame_type);
                RouteOutcome::Ignored(frame_type)
            }
            Err(e) => {
                warn!("Dropping inbound frame: {}", e);
                RouteOutcome::Dropped
            }
        }
    }
}
