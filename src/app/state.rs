// ABOUTME: Application root owning the transport, the session registry and the resize notifier
// Runs every state transition synchronously from the single event loop

use super::notification::{Notice, Notices};
use crate::config::{ClientConfig, ConfigError};
use crate::session::{
    CycleDirection, EmulatorSink, RenderSink, ResizeEvent, ResizeNotifier, SearchDirection,
    SearchMatch, SessionId, SessionInput, SessionRegistry, SinkFactory, Viewport,
};
use crate::transport::{
    ConnectOutcome, ConnectRequest, ConnectionStatus, Connector, LatencyProbe, OutboundFrame,
    ProbeClient, RouteOutcome, TransportConnection, TransportEvent, TransportUpdate,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// The search bar's query and the outcome of the last step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    pub found: Option<SearchMatch>,
    /// The last step found nothing
    pub missed: bool,
}

/// Which keys belong to the app rather than the remote shell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyContext {
    pub fullscreen: bool,
    pub searching: bool,
}

/// Work delivered to the event loop
#[derive(Debug)]
pub enum AppMessage {
    Transport(TransportEvent),
    Resize(ResizeEvent),
    Input(SessionInput),
}

pub struct App {
    pub transport: TransportConnection,
    pub sessions: SessionRegistry,
    pub resize: ResizeNotifier,
    pub notices: Notices,
    pub should_quit: bool,

    search: Option<SearchState>,
    /// Query restored when the search bar reopens
    last_query: String,
    show_log: bool,

    /// Login to send as soon as the channel opens
    pending_login: Option<ConnectRequest>,
    /// Login to repeat after the channel was lost
    last_login: Option<ConnectRequest>,

    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    resize_rx: mpsc::UnboundedReceiver<ResizeEvent>,
    input_rx: mpsc::UnboundedReceiver<SessionInput>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("transport", &self.transport)
            .field("sessions", &self.sessions)
            .field("resize", &self.resize)
            .field("should_quit", &self.should_quit)
            .field("pending_login", &self.pending_login)
            .field("search", &self.search)
            .field("show_log", &self.show_log)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn new(
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
        probe_client: Arc<dyn ProbeClient>,
        window: Viewport,
    ) -> Result<Self, ConfigError> {
        let scrollback = config.terminal.scrollback;
        Self::with_sinks(
            config,
            connector,
            probe_client,
            window,
            Box::new(move || Box::new(EmulatorSink::new(scrollback)) as Box<dyn RenderSink>),
        )
    }

    /// Like [`App::new`] with a custom render sink for every session
    pub fn with_sinks(
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
        probe_client: Arc<dyn ProbeClient>,
        window: Viewport,
        sinks: SinkFactory,
    ) -> Result<Self, ConfigError> {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (resize_tx, resize_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let probe = LatencyProbe::new(
            probe_client,
            config.resolved_candidates()?,
            config.probe_interval(),
            config.probe_timeout(),
        );
        let transport = TransportConnection::new(
            connector,
            probe,
            config.reconnect_policy(),
            config.server.destinations.clone(),
            transport_tx,
        );

        let resize = ResizeNotifier::new(window, config.settle_delay(), resize_tx);
        let mut sessions = SessionRegistry::new(sinks, input_tx);
        sessions.set_container(resize.container());

        Ok(Self {
            transport,
            sessions,
            resize,
            notices: Notices::default(),
            should_quit: false,
            search: None,
            last_query: String::new(),
            show_log: false,
            pending_login: None,
            last_login: None,
            transport_rx,
            resize_rx,
            input_rx,
        })
    }

    pub fn connect(&mut self) -> oneshot::Receiver<ConnectOutcome> {
        self.transport.connect()
    }

    /// Log into a remote host, connecting first when needed
    pub fn login(&mut self, request: ConnectRequest) -> oneshot::Receiver<ConnectOutcome> {
        info!(
            "Login requested for {}@{}:{}",
            request.username, request.host, request.port
        );
        self.last_login = Some(request.clone());
        if self.transport.is_open() {
            self.send_login(request);
        } else {
            self.pending_login = Some(request);
        }
        self.transport.connect()
    }

    fn send_login(&mut self, request: ConnectRequest) {
        self.transport.send(&OutboundFrame::ConnectRequest(request));
        if self.sessions.is_empty() {
            self.new_session(None);
        }
    }

    pub fn disconnect(&mut self) {
        self.pending_login = None;
        self.last_login = None;
        self.transport.disconnect();
        self.notices.push(Notice::info("Disconnected"));
    }

    pub fn reconnect_now(&mut self) -> oneshot::Receiver<ConnectOutcome> {
        self.transport.reconnect_now()
    }

    pub fn new_session(&mut self, label: Option<&str>) -> SessionId {
        self.close_search();
        let id = self.sessions.create(label);
        self.resize.session_activated(&mut self.sessions, &self.transport);
        id
    }

    pub fn activate_session(&mut self, id: SessionId) -> bool {
        if self.sessions.active_id() != Some(id) {
            self.close_search();
        }
        if !self.sessions.activate(id) {
            return false;
        }
        self.resize.session_activated(&mut self.sessions, &self.transport);
        true
    }

    pub fn close_session(&mut self, id: SessionId) -> bool {
        let was_active = self.sessions.active_id() == Some(id);
        if was_active {
            self.close_search();
        }
        if !self.sessions.close(id) {
            return false;
        }
        if was_active {
            self.resize.session_activated(&mut self.sessions, &self.transport);
        }
        true
    }

    pub fn close_active_session(&mut self) -> bool {
        match self.sessions.active_id() {
            Some(id) => self.close_session(id),
            None => false,
        }
    }

    pub fn cycle_sessions(&mut self, direction: CycleDirection) -> Option<SessionId> {
        self.close_search();
        let id = self.sessions.cycle(direction)?;
        self.resize.session_activated(&mut self.sessions, &self.transport);
        Some(id)
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.resize.toggle_fullscreen()
    }

    pub fn exit_fullscreen(&mut self) -> bool {
        self.resize.exit_fullscreen()
    }

    pub fn window_resized(&mut self, window: Viewport) -> Option<Viewport> {
        self.resize
            .environment_resized(window, &mut self.sessions, &self.transport)
    }

    /// Type into the active session
    pub fn type_input(&mut self, data: &str) -> bool {
        self.sessions.input_to_active(data).is_some()
    }

    pub fn clear_active(&mut self) -> bool {
        self.sessions.clear_active()
    }

    /// Show the search bar for the active session
    pub fn open_search(&mut self) {
        if self.search.is_none() {
            self.search = Some(SearchState {
                query: self.last_query.clone(),
                ..SearchState::default()
            });
        }
    }

    /// Hide the search bar and return the active session to its live screen
    pub fn close_search(&mut self) {
        if let Some(search) = self.search.take() {
            self.last_query = search.query;
            self.sessions.clear_search_active();
        }
    }

    pub fn search_push(&mut self, c: char) {
        if let Some(search) = self.search.as_mut() {
            search.query.push(c);
            search.missed = false;
        }
    }

    pub fn search_pop(&mut self) {
        if let Some(search) = self.search.as_mut() {
            search.query.pop();
            search.missed = false;
        }
    }

    /// Jump to the next or previous match. An empty query does nothing.
    pub fn search_step(&mut self, direction: SearchDirection) -> Option<SearchMatch> {
        let search = self.search.as_mut()?;
        if search.query.is_empty() {
            return None;
        }
        let found = self.sessions.search_active(&search.query, direction);
        search.found = found;
        search.missed = found.is_none();
        found
    }

    pub fn search(&self) -> Option<&SearchState> {
        self.search.as_ref()
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    pub fn toggle_log(&mut self) -> bool {
        self.show_log = !self.show_log;
        self.show_log
    }

    pub fn is_log_visible(&self) -> bool {
        self.show_log
    }

    pub fn key_context(&self) -> KeyContext {
        KeyContext {
            fullscreen: self.is_fullscreen(),
            searching: self.is_searching(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.resize.is_fullscreen()
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Expire old notices
    pub fn tick(&mut self) {
        self.notices.prune();
    }

    /// Wait for the next piece of work from timers, the channel or the sessions
    pub async fn next_event(&mut self) -> Option<AppMessage> {
        tokio::select! {
            Some(event) = self.transport_rx.recv() => Some(AppMessage::Transport(event)),
            Some(event) = self.resize_rx.recv() => Some(AppMessage::Resize(event)),
            Some(input) = self.input_rx.recv() => Some(AppMessage::Input(input)),
            else => None,
        }
    }

    pub fn handle(&mut self, message: AppMessage) {
        match message {
            AppMessage::Transport(event) => {
                let update = self.transport.handle(event);
                self.on_transport_update(update);
            }
            AppMessage::Resize(event) => {
                self.resize.handle(event, &mut self.sessions, &self.transport);
            }
            AppMessage::Input(SessionInput { session, data }) => {
                if !self.sessions.contains(session) {
                    debug!("Dropping input for closed session {}", session);
                    return;
                }
                self.transport.send(&OutboundFrame::input(data));
            }
        }
    }

    fn on_transport_update(&mut self, update: TransportUpdate) {
        match update {
            TransportUpdate::Opened => {
                self.notices.push(Notice::info("Connected to gateway"));
                if let Some(login) = self.pending_login.take() {
                    self.send_login(login);
                }
            }
            TransportUpdate::ConnectFailed(e) => {
                self.notices.push(Notice::error(format!("Connection failed: {e}")));
            }
            TransportUpdate::ConnectionLost(reason) => {
                self.notices
                    .push(Notice::warning(format!("Connection lost: {reason}")));
                if self.pending_login.is_none() {
                    self.pending_login = self.last_login.clone();
                }
            }
            TransportUpdate::Frame(body) => {
                match self.transport.router().route(&body, &mut self.sessions) {
                    RouteOutcome::Connected(message) => {
                        let message = if message.is_empty() {
                            "SSH session connected".to_string()
                        } else {
                            message
                        };
                        self.notices.push(Notice::success(message));
                        self.resize
                            .session_activated(&mut self.sessions, &self.transport);
                    }
                    RouteOutcome::RemoteError(message) => {
                        self.notices.push(Notice::error(message));
                    }
                    RouteOutcome::Delivered(_)
                    | RouteOutcome::NoActiveSession
                    | RouteOutcome::Ignored(_)
                    | RouteOutcome::Dropped => {}
                }
            }
            TransportUpdate::Reconnecting => {
                self.notices.push(Notice::info("Reconnecting..."));
            }
            TransportUpdate::Countdown(remaining) => {
                debug!("Reconnecting in {}s", remaining);
            }
            TransportUpdate::LatencyChanged(_) | TransportUpdate::Ignored => {}
        }
    }

    pub fn has_pending_login(&self) -> bool {
        self.pending_login.is_some()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if self.transport.is_open() {
            warn!("Dropping app with an open connection, disconnecting");
            self.transport.disconnect();
        }
    }
}
