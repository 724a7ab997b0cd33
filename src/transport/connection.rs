// ABOUTME: Connection state machine owning the single physical control channel
// Drives connect, teardown, failure handling, probe lifecycle and the reconnect countdown

use super::channel::{ChannelEvent, Connector, PhysicalChannel};
use super::error::TransportError;
use super::latency::LatencyProbe;
use super::protocol::{ConnectionState, ConnectionStatus, Destinations, Latency, OutboundFrame};
use super::reconnect::{Countdown, PendingReconnect, ReconnectScheduler, DEFAULT_RECONNECT_DELAY_SECS};
use super::router::InboundRouter;
use super::TransportEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Completion of a `connect()` call
pub type ConnectOutcome = Result<(), TransportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub delay_secs: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
        }
    }
}

/// What handling one transport event amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportUpdate {
    Opened,
    ConnectFailed(TransportError),
    ConnectionLost(String),
    /// Inbound body for the router
    Frame(String),
    Countdown(u32),
    /// The countdown reached zero and a new attempt started
    Reconnecting,
    LatencyChanged(Latency),
    /// Stale or irrelevant event
    Ignored,
}

pub struct TransportConnection {
    connector: Arc<dyn Connector>,
    state: ConnectionState,

    /// Bumped for every attempt so late results of abandoned attempts can be told apart
    epoch: u64,
    channel: Option<PhysicalChannel>,
    attempt: Option<JoinHandle<()>>,
    waiters: Vec<oneshot::Sender<ConnectOutcome>>,

    router: InboundRouter,
    probe: LatencyProbe,
    reconnect: ReconnectScheduler,
    policy: ReconnectPolicy,
    destinations: Destinations,

    events: mpsc::UnboundedSender<TransportEvent>,
    status: watch::Sender<ConnectionStatus>,
    last_error: Option<String>,
    reconnect_attempts: u32,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .field("channel", &self.channel)
            .field("waiters", &self.waiters.len())
            .field("router", &self.router)
            .field("probe", &self.probe)
            .field("reconnect", &self.reconnect)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TransportConnection {
    pub fn new(
        connector: Arc<dyn Connector>,
        probe: LatencyProbe,
        policy: ReconnectPolicy,
        destinations: Destinations,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            connector,
            state: ConnectionState::Idle,
            epoch: 0,
            channel: None,
            attempt: None,
            waiters: Vec::new(),
            router: InboundRouter::new(destinations.output.clone()),
            probe,
            reconnect: ReconnectScheduler::new(),
            policy,
            destinations,
            events,
            status,
            last_error: None,
            reconnect_attempts: 0,
        }
    }

    /// Bring the channel up, or join the attempt already in flight.
    ///
    /// The returned receiver resolves once the connection is Open or the
    /// attempt fails. An already open connection resolves immediately.
    pub fn connect(&mut self) -> oneshot::Receiver<ConnectOutcome> {
        let (tx, rx) = oneshot::channel();
        match self.state {
            ConnectionState::Open => {
                let _ = tx.send(Ok(()));
            }
            ConnectionState::Connecting => {
                debug!("Connect requested while an attempt is in flight, deferring");
                self.waiters.push(tx);
            }
            ConnectionState::Idle | ConnectionState::Failed | ConnectionState::Reconnecting => {
                self.waiters.push(tx);
                self.begin_attempt();
            }
        }
        rx
    }

    /// Skip the countdown and try again right away
    pub fn reconnect_now(&mut self) -> oneshot::Receiver<ConnectOutcome> {
        if self.reconnect.cancel() {
            info!("Manual reconnect, countdown cancelled");
        }
        self.connect()
    }

    fn begin_attempt(&mut self) {
        self.reconnect.cancel();
        self.teardown_channel();
        self.epoch += 1;
        self.state = ConnectionState::Connecting;

        let epoch = self.epoch;
        let connector = Arc::clone(&self.connector);
        let events = self.events.clone();
        info!("Connecting control channel (attempt epoch {})", epoch);
        self.attempt = Some(tokio::spawn(async move {
            let result = connector.open().await;
            let _ = events.send(TransportEvent::Handshake { epoch, result });
        }));
        self.publish();
    }

    /// Send one outbound frame. Dropped unless the connection is open.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        let kind = frame.kind();
        let Some(channel) = self.channel.as_ref().filter(|_| self.state == ConnectionState::Open)
        else {
            info!("Dropping {} frame, connection is {}", kind, self.state);
            return false;
        };

        let body = match frame.to_json() {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to encode {} frame: {}", kind, e);
                return false;
            }
        };
        channel.send(self.destinations.for_kind(kind), body)
    }

    /// Orderly shutdown: countdown, probe, goodbye frame, channel, then Idle
    pub fn disconnect(&mut self) {
        info!("Disconnecting control channel");
        self.reconnect.cancel();
        self.probe.stop();
        if self.state == ConnectionState::Open {
            self.send(&OutboundFrame::disconnect());
        }
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.teardown_channel();
        self.state = ConnectionState::Idle;
        self.reconnect_attempts = 0;
        self.resolve_waiters(Err(TransportError::Disconnected));
        self.publish();
    }

    /// Apply one event produced by the transport's background tasks
    pub fn handle(&mut self, event: TransportEvent) -> TransportUpdate {
        match event {
            TransportEvent::Handshake { epoch, result } => self.on_handshake(epoch, result),
            TransportEvent::Channel { epoch, event } => self.on_channel_event(epoch, event),
            TransportEvent::ReconnectTick { generation } => match self.reconnect.on_tick(generation) {
                Countdown::Stale => TransportUpdate::Ignored,
                Countdown::Ticking(remaining) => {
                    self.publish();
                    TransportUpdate::Countdown(remaining)
                }
                Countdown::Due => {
                    self.reconnect_attempts += 1;
                    info!("Reconnect attempt {}", self.reconnect_attempts);
                    // Nobody awaits a countdown-initiated attempt
                    drop(self.connect());
                    TransportUpdate::Reconnecting
                }
            },
            TransportEvent::Latency { generation, latency } => {
                if self.state != ConnectionState::Open || !self.probe.record(generation, latency) {
                    return TransportUpdate::Ignored;
                }
                self.publish();
                TransportUpdate::LatencyChanged(latency)
            }
        }
    }

    fn on_handshake(
        &mut self,
        epoch: u64,
        result: Result<PhysicalChannel, TransportError>,
    ) -> TransportUpdate {
        if epoch != self.epoch || self.state != ConnectionState::Connecting {
            debug!("Discarding handshake result of superseded attempt {}", epoch);
            if let Ok(channel) = result {
                channel.close();
            }
            return TransportUpdate::Ignored;
        }
        self.attempt = None;

        match result {
            Ok(mut channel) => {
                info!("Control channel open");
                self.state = ConnectionState::Open;
                self.reconnect.cancel();
                self.last_error = None;
                self.reconnect_attempts = 0;
                self.probe.start(self.events.clone());
                self.router.subscribe(&mut channel, epoch, self.events.clone());
                self.channel = Some(channel);
                self.resolve_waiters(Ok(()));
                self.publish();
                TransportUpdate::Opened
            }
            Err(e) => {
                error!("Failed to open control channel: {}", e);
                self.resolve_waiters(Err(e.clone()));
                self.fail(e.to_string());
                TransportUpdate::ConnectFailed(e)
            }
        }
    }

    fn on_channel_event(&mut self, epoch: u64, event: ChannelEvent) -> TransportUpdate {
        if epoch != self.epoch || self.state != ConnectionState::Open {
            return TransportUpdate::Ignored;
        }
        match event {
            ChannelEvent::Message { body, .. } => TransportUpdate::Frame(body),
            ChannelEvent::Closed { reason } => {
                warn!("Control channel lost: {}", reason);
                self.fail(format!("connection lost: {reason}"));
                TransportUpdate::ConnectionLost(reason)
            }
        }
    }

    /// Common failure path for rejected handshakes and lost channels
    fn fail(&mut self, reason: String) {
        self.probe.stop();
        self.teardown_channel();
        self.last_error = Some(reason);
        self.state = ConnectionState::Failed;
        if self.policy.enabled {
            self.reconnect.start(self.policy.delay_secs, self.events.clone());
            self.state = ConnectionState::Reconnecting;
        }
        self.publish();
    }

    fn teardown_channel(&mut self) {
        self.router.unsubscribe();
        if let Some(channel) = self.channel.take() {
            debug!("Tearing down control channel (epoch {})", self.epoch);
            channel.close();
        }
    }

    fn resolve_waiters(&mut self, outcome: ConnectOutcome) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn publish(&self) {
        self.status.send_replace(ConnectionStatus {
            state: self.state,
            latency: self.probe.latency(),
            reconnect_in: self.reconnect.remaining(),
            last_error: self.last_error.clone(),
            reconnect_attempts: self.reconnect_attempts,
        });
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn router(&self) -> &InboundRouter {
        &self.router
    }

    pub fn latency(&self) -> Latency {
        self.probe.latency()
    }

    pub fn is_probing(&self) -> bool {
        self.probe.is_running()
    }

    pub fn pending_reconnect(&self) -> Option<PendingReconnect> {
        self.reconnect.pending()
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }
}

impl Drop for TransportConnection {
    fn drop(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
    }
}
