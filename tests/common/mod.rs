// ABOUTME: Shared fakes for integration tests
// Scripted connector, scripted probe client, recording render sink and event pump helpers

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;
use webssh_client::app::App;
use webssh_client::config::ClientConfig;
use webssh_client::session::{DataCallback, RenderSink, Viewport};
use webssh_client::transport::{
    ChannelCommand, Connector, LatencyProbe, PhysicalChannel, ProbeCandidate, ProbeClient,
    ReconnectPolicy, RemotePeer, TransportConnection, TransportError, TransportEvent,
    TransportUpdate, Destinations,
};

/// What the next `open()` call does
#[derive(Debug, Clone)]
pub enum Step {
    Accept,
    Reject(String),
    /// Accept after a delay
    AcceptAfter(Duration),
}

/// Connector that follows a script and hands the remote ends to the test
pub struct ScriptedConnector {
    steps: Mutex<VecDeque<Step>>,
    opened: AtomicUsize,
    peers: mpsc::UnboundedSender<RemotePeer>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<Step>) -> (Arc<Self>, mpsc::UnboundedReceiver<RemotePeer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                opened: AtomicUsize::new(0),
                peers,
            }),
            peer_rx,
        )
    }

    /// Number of `open()` calls so far
    pub fn attempts(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self) -> Result<PhysicalChannel, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Reject("script exhausted".to_string()));

        match step {
            Step::Reject(reason) => Err(TransportError::Rejected(reason)),
            Step::Accept => Ok(self.accept()),
            Step::AcceptAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.accept())
            }
        }
    }
}

impl ScriptedConnector {
    fn accept(&self) -> PhysicalChannel {
        let (channel, peer) = PhysicalChannel::pair();
        let _ = self.peers.send(peer);
        channel
    }
}

/// Probe client answering each URL after a fixed delay. Unknown URLs never answer.
#[derive(Default)]
pub struct ScriptedProbe {
    delays: HashMap<String, Result<Duration, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn answers(mut self, url: &str, after: Duration) -> Self {
        self.delays.insert(url.to_string(), Ok(after));
        self
    }

    pub fn fails(mut self, url: &str, reason: &str) -> Self {
        self.delays.insert(url.to_string(), Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProbeClient for ScriptedProbe {
    async fn probe(&self, candidate: &ProbeCandidate) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(candidate.url.clone());
        match self.delays.get(&candidate.url) {
            Some(Ok(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            Some(Err(reason)) => Err(TransportError::Probe(reason.clone())),
            None => std::future::pending().await,
        }
    }
}

/// Probe client that always answers immediately
pub struct InstantProbe;

#[async_trait]
impl ProbeClient for InstantProbe {
    async fn probe(&self, _: &ProbeCandidate) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Render sink that records everything written to it
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub written: Arc<Mutex<Vec<u8>>>,
    viewport: Viewport,
    callback: Arc<Mutex<Option<DataCallback>>>,
    disposed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }
}

impl RenderSink for RecordingSink {
    fn open(&mut self, container: Viewport) {
        self.fit(container);
    }

    fn write(&mut self, bytes: &[u8]) {
        if !self.is_disposed() {
            self.written.lock().unwrap().extend_from_slice(bytes);
        }
    }

    fn on_data(&mut self, callback: DataCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn input(&mut self, data: &str) {
        if let Some(callback) = self.callback.lock().unwrap().as_mut() {
            callback(data);
        }
    }

    fn size(&self) -> Viewport {
        self.viewport
    }

    fn fit(&mut self, container: Viewport) -> Viewport {
        self.viewport = Viewport::new(container.rows.max(1), container.cols.max(2));
        self.viewport
    }

    fn contents(&self) -> String {
        self.output()
    }

    fn clear(&mut self) {
        self.written.lock().unwrap().clear();
    }

    fn dispose(&mut self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.server.url = "ws://gateway.test:8080/ssh-ws/websocket".to_string();
    config
}

pub fn connection(
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
) -> (TransportConnection, mpsc::UnboundedReceiver<TransportEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let probe = LatencyProbe::new(
        Arc::new(InstantProbe),
        vec![ProbeCandidate::get("http://gateway.test:8080/api/ping")],
        Duration::from_secs(10),
        Duration::from_millis(3000),
    );
    (
        TransportConnection::new(connector, probe, policy, Destinations::default(), tx),
        rx,
    )
}

/// Handle transport events until `done` accepts an update
pub async fn drive_until(
    connection: &mut TransportConnection,
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    mut done: impl FnMut(&TransportUpdate) -> bool,
) -> Vec<TransportUpdate> {
    let mut seen = Vec::new();
    for _ in 0..500 {
        let event = events.recv().await.expect("transport event channel closed");
        let update = connection.handle(event);
        let finished = done(&update);
        seen.push(update);
        if finished {
            return seen;
        }
    }
    panic!("condition not reached, saw {seen:?}");
}

pub fn app_with(connector: Arc<dyn Connector>, window: Viewport) -> App {
    App::new(&test_config(), connector, Arc::new(InstantProbe), window).unwrap()
}

/// Run the app's event loop until `done` holds
pub async fn pump_until(app: &mut App, mut done: impl FnMut(&App) -> bool) {
    for _ in 0..500 {
        if done(app) {
            return;
        }
        let message = app.next_event().await.expect("app channels closed");
        app.handle(message);
    }
    panic!("condition not reached");
}

/// Every (destination, body) the client has sent so far
pub fn sent_frames(peer: &mut RemotePeer) -> Vec<(String, String)> {
    peer.drain_commands()
        .into_iter()
        .filter_map(|command| match command {
            ChannelCommand::Send { destination, body } => Some((destination, body)),
            _ => None,
        })
        .collect()
}
