// ABOUTME: One-second countdown that schedules a reconnect attempt after channel loss
// At most one countdown is pending; stale ticks from a cancelled countdown are ignored

use super::TransportEvent;
use crate::timer::{Generation, TimerSlot};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_RECONNECT_DELAY_SECS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReconnect {
    pub deadline: Instant,
    pub seconds_remaining: u32,
}

/// Result of feeding one tick into the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// Tick from a countdown that no longer exists
    Stale,
    /// Seconds left before the attempt
    Ticking(u32),
    /// Countdown reached zero. Fires once per countdown.
    Due,
}

#[derive(Debug)]
pub struct ReconnectScheduler {
    slot: TimerSlot,
    pending: Option<PendingReconnect>,
}

impl Default for ReconnectScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectScheduler {
    pub fn new() -> Self {
        Self {
            slot: TimerSlot::new("reconnect"),
            pending: None,
        }
    }

    /// Start a countdown of `seconds`, replacing any pending one
    pub fn start(&mut self, seconds: u32, events: mpsc::UnboundedSender<TransportEvent>) {
        let seconds = seconds.max(1);
        let tick = Duration::from_secs(1);
        let deadline = Instant::now() + Duration::from_secs(u64::from(seconds));

        self.slot.arm(move |generation| async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            loop {
                interval.tick().await;
                if events.send(TransportEvent::ReconnectTick { generation }).is_err() {
                    return;
                }
            }
        });
        self.pending = Some(PendingReconnect {
            deadline,
            seconds_remaining: seconds,
        });
        info!("Reconnecting in {}s", seconds);
    }

    pub fn on_tick(&mut self, generation: Generation) -> Countdown {
        if !self.slot.is_current(generation) {
            return Countdown::Stale;
        }
        let Some(pending) = self.pending.as_mut() else {
            return Countdown::Stale;
        };

        pending.seconds_remaining = pending.seconds_remaining.saturating_sub(1);
        if pending.seconds_remaining == 0 {
            self.pending = None;
            self.slot.cancel();
            debug!("Reconnect countdown elapsed");
            Countdown::Due
        } else {
            Countdown::Ticking(pending.seconds_remaining)
        }
    }

    /// Abandon the pending countdown. Returns true if one was pending.
    pub fn cancel(&mut self) -> bool {
        self.slot.cancel();
        let was_pending = self.pending.take().is_some();
        if was_pending {
            debug!("Reconnect countdown cancelled");
        }
        was_pending
    }

    pub fn pending(&self) -> Option<PendingReconnect> {
        self.pending
    }

    pub fn remaining(&self) -> Option<u32> {
        self.pending.map(|pending| pending.seconds_remaining)
    }
}
