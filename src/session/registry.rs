// ABOUTME: Registry of terminal sessions (tabs) and the active-session selection
// Sessions are kept in creation order; at most one is active at any time

use super::search::{SearchDirection, SearchMatch};
use super::sink::{EmulatorSink, RenderSink, Viewport};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const DEFAULT_LABEL: &str = "SSH";

/// Opaque, creation-ordered session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Input typed into a session's sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInput {
    pub session: SessionId,
    pub data: String,
}

pub struct Session {
    pub id: SessionId,
    pub label: String,
    pub viewport: Viewport,
    pub sink: Box<dyn RenderSink>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

pub type SinkFactory = Box<dyn FnMut() -> Box<dyn RenderSink> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    Next,
    Previous,
}

pub struct SessionRegistry {
    sessions: Vec<Session>,
    active: Option<SessionId>,
    next_id: u64,
    factory: SinkFactory,
    input: mpsc::UnboundedSender<SessionInput>,

    /// Geometry new sinks are opened against
    container: Viewport,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions)
            .field("active", &self.active)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(factory: SinkFactory, input: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self {
            sessions: Vec::new(),
            active: None,
            next_id: 0,
            factory,
            input,
            container: Viewport::default(),
        }
    }

    /// Registry whose sessions render through [`EmulatorSink`]
    pub fn with_emulator(scrollback: usize, input: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self::new(
            Box::new(move || Box::new(EmulatorSink::new(scrollback)) as Box<dyn RenderSink>),
            input,
        )
    }

    pub fn set_container(&mut self, container: Viewport) {
        self.container = container;
    }

    pub fn container(&self) -> Viewport {
        self.container
    }

    /// Open a new session and make it active
    pub fn create(&mut self, label: Option<&str>) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let label = label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(DEFAULT_LABEL)
            .to_string();

        let mut sink = (self.factory)();
        let input = self.input.clone();
        sink.on_data(Box::new(move |data| {
            let _ = input.send(SessionInput {
                session: id,
                data: data.to_string(),
            });
        }));
        sink.open(self.container);
        let viewport = sink.size();

        info!("Opened session {} ({}) at {}", id, label, viewport);
        self.sessions.push(Session {
            id,
            label,
            viewport,
            sink,
        });
        self.active = Some(id);
        id
    }

    /// Mark `id` active. Unknown ids change nothing.
    pub fn activate(&mut self, id: SessionId) -> bool {
        if !self.contains(id) {
            debug!("Ignoring activation of unknown session {}", id);
            return false;
        }
        self.active = Some(id);
        true
    }

    /// Dispose and remove a session.
    ///
    /// Closing the active session hands focus to the most recently created
    /// remaining one.
    pub fn close(&mut self, id: SessionId) -> bool {
        let Some(index) = self.sessions.iter().position(|session| session.id == id) else {
            return false;
        };
        let mut session = self.sessions.remove(index);
        session.sink.dispose();
        info!("Closed session {} ({})", id, session.label);

        if self.active == Some(id) {
            self.active = self.sessions.last().map(|session| session.id);
        }
        true
    }

    /// Move focus along creation order, wrapping at either end
    pub fn cycle(&mut self, direction: CycleDirection) -> Option<SessionId> {
        if self.sessions.len() < 2 {
            return None;
        }
        let current = self
            .active
            .and_then(|id| self.sessions.iter().position(|session| session.id == id))
            .unwrap_or(0);
        let len = self.sessions.len();
        let next = match direction {
            CycleDirection::Next => (current + 1) % len,
            CycleDirection::Previous => (current + len - 1) % len,
        };
        let id = self.sessions[next].id;
        self.active = Some(id);
        Some(id)
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Session> {
        let id = self.active?;
        self.get_mut(id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Write output to the active session's sink
    pub fn write_to_active(&mut self, bytes: &[u8]) -> Option<SessionId> {
        let session = self.active_mut()?;
        session.sink.write(bytes);
        Some(session.id)
    }

    /// Type into the active session's sink
    pub fn input_to_active(&mut self, data: &str) -> Option<SessionId> {
        let session = self.active_mut()?;
        session.sink.input(data);
        Some(session.id)
    }

    pub fn clear_active(&mut self) -> bool {
        match self.active_mut() {
            Some(session) => {
                session.sink.clear();
                true
            }
            None => false,
        }
    }

    /// Search the active session's buffer
    pub fn search_active(&mut self, query: &str, direction: SearchDirection) -> Option<SearchMatch> {
        let session = self.active_mut()?;
        let found = session.sink.search(query, direction);
        debug!(
            "Search for {:?} in {}: {}",
            query,
            session.id,
            if found.is_some() { "found" } else { "no match" }
        );
        found
    }

    pub fn clear_search_active(&mut self) {
        if let Some(session) = self.active_mut() {
            session.sink.clear_search();
        }
    }
}
