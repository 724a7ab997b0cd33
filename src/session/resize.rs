// ABOUTME: Keeps the active session's geometry in sync with the window and the remote side
// Refits on window resize, fullscreen toggle (after a settle delay) and session activation

use super::registry::SessionRegistry;
use super::sink::Viewport;
use crate::timer::{Generation, TimerSlot};
use crate::transport::{OutboundFrame, TransportConnection};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Rows taken by the tab bar, the status bar and the terminal border
pub const CHROME_ROWS: u16 = 4;
/// Columns taken by the terminal border
pub const CHROME_COLS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEvent {
    /// The layout had time to settle after a fullscreen toggle
    Settled { generation: Generation },
}

/// Space left for the terminal once the chrome is laid out
pub fn container_for(window: Viewport, fullscreen: bool) -> Viewport {
    if fullscreen {
        window
    } else {
        Viewport::new(
            window.rows.saturating_sub(CHROME_ROWS),
            window.cols.saturating_sub(CHROME_COLS),
        )
    }
}

#[derive(Debug)]
pub struct ResizeNotifier {
    window: Viewport,
    fullscreen: bool,
    settle_delay: Duration,
    settle: TimerSlot,
    events: mpsc::UnboundedSender<ResizeEvent>,
}

impl ResizeNotifier {
    pub fn new(
        window: Viewport,
        settle_delay: Duration,
        events: mpsc::UnboundedSender<ResizeEvent>,
    ) -> Self {
        Self {
            window,
            fullscreen: false,
            settle_delay,
            settle: TimerSlot::new("resize-settle"),
            events,
        }
    }

    pub fn window(&self) -> Viewport {
        self.window
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn container(&self) -> Viewport {
        container_for(self.window, self.fullscreen)
    }

    pub fn is_settling(&self) -> bool {
        self.settle.is_armed()
    }

    /// The host window changed size
    pub fn environment_resized(
        &mut self,
        window: Viewport,
        sessions: &mut SessionRegistry,
        transport: &TransportConnection,
    ) -> Option<Viewport> {
        debug!("Window resized to {}", window);
        self.window = window;
        self.refit(sessions, transport)
    }

    /// Flip fullscreen and schedule a refit once the layout settles
    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen = !self.fullscreen;
        debug!("Fullscreen {}", if self.fullscreen { "on" } else { "off" });

        let delay = self.settle_delay;
        let events = self.events.clone();
        self.settle.arm(move |generation| async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ResizeEvent::Settled { generation });
        });
        self.fullscreen
    }

    /// Leave fullscreen. Does nothing in normal mode.
    pub fn exit_fullscreen(&mut self) -> bool {
        if !self.fullscreen {
            return false;
        }
        self.toggle_fullscreen();
        true
    }

    pub fn handle(
        &mut self,
        event: ResizeEvent,
        sessions: &mut SessionRegistry,
        transport: &TransportConnection,
    ) -> Option<Viewport> {
        match event {
            ResizeEvent::Settled { generation } => {
                if !self.settle.is_current(generation) {
                    trace!("Discarding stale settle event {}", generation);
                    return None;
                }
                self.settle.cancel();
                self.refit(sessions, transport)
            }
        }
    }

    /// A different session took focus
    pub fn session_activated(
        &mut self,
        sessions: &mut SessionRegistry,
        transport: &TransportConnection,
    ) -> Option<Viewport> {
        self.refit(sessions, transport)
    }

    /// Fit the active session to the current container and tell the remote side
    pub fn refit(
        &mut self,
        sessions: &mut SessionRegistry,
        transport: &TransportConnection,
    ) -> Option<Viewport> {
        let container = self.container();
        sessions.set_container(container);

        let session = sessions.active_mut()?;
        let viewport = session.sink.fit(container);
        session.viewport = viewport;
        debug!("Session {} fitted to {}", session.id, viewport);

        if transport.is_open() {
            transport.send(&OutboundFrame::resize(viewport.cols, viewport.rows));
        }
        Some(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_mode_reserves_chrome() {
        let window = Viewport::new(30, 100);
        assert_eq!(container_for(window, false), Viewport::new(26, 98));
        assert_eq!(container_for(window, true), window);
        assert_eq!(container_for(Viewport::new(2, 1), false), Viewport::new(0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn exit_fullscreen_only_acts_in_fullscreen() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut notifier = ResizeNotifier::new(Viewport::new(30, 100), DEFAULT_SETTLE_DELAY, tx);

        assert!(!notifier.exit_fullscreen());
        assert!(!notifier.is_settling());

        assert!(notifier.toggle_fullscreen());
        assert!(notifier.exit_fullscreen());
        assert!(!notifier.is_fullscreen());

        // The second toggle superseded the first settle timer
        let ResizeEvent::Settled { generation } = rx.recv().await.unwrap();
        assert!(notifier.settle.is_current(generation));
        assert!(rx.try_recv().is_err());
    }
}
