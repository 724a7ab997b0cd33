// ABOUTME: Periodic HTTP round-trip probe that estimates latency to the gateway
// Tries an ordered list of candidate endpoints and stops at the first one that answers

use super::error::TransportError;
use super::protocol::Latency;
use super::TransportEvent;
use crate::timer::{Generation, TimerSlot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, trace};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    #[default]
    Get,
    Head,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCandidate {
    pub url: String,
    #[serde(default)]
    pub method: ProbeMethod,
}

impl ProbeCandidate {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: ProbeMethod::Get,
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: ProbeMethod::Head,
        }
    }

    /// The gateway's usual health endpoints, relative to `origin`
    pub fn defaults_for(origin: &str) -> Vec<Self> {
        let origin = origin.trim_end_matches('/');
        vec![
            Self::get(format!("{origin}/api/ping")),
            Self::head(format!("{origin}/actuator/health")),
            Self::head(format!("{origin}/")),
        ]
    }
}

/// Issues a single probe request
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn probe(&self, candidate: &ProbeCandidate) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpProbeClient {
    client: reqwest::Client,
}

impl HttpProbeClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProbeClient for HttpProbeClient {
    async fn probe(&self, candidate: &ProbeCandidate) -> Result<(), TransportError> {
        let request = match candidate.method {
            ProbeMethod::Get => self.client.get(&candidate.url),
            ProbeMethod::Head => self.client.head(&candidate.url),
        };

        let response = request
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| TransportError::Probe(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Probe(format!(
                "{} returned {}",
                candidate.url,
                response.status()
            )))
        }
    }
}

/// Time candidates in order and report the first successful round trip.
///
/// Each candidate gets its own `timeout`. A measurement is never reported
/// below one millisecond.
pub async fn measure(
    client: &dyn ProbeClient,
    candidates: &[ProbeCandidate],
    timeout: Duration,
) -> Latency {
    for candidate in candidates {
        let started = Instant::now();
        match tokio::time::timeout(timeout, client.probe(candidate)).await {
            Ok(Ok(())) => {
                let ms = started.elapsed().as_secs_f64() * 1000.0;
                let ms = (ms.round() as u64).max(1);
                trace!("Probe {} answered in {}ms", candidate.url, ms);
                return Latency::Millis(ms);
            }
            Ok(Err(e)) => trace!("Probe {} failed: {}", candidate.url, e),
            Err(_) => trace!("Probe {} timed out after {:?}", candidate.url, timeout),
        }
    }
    debug!("No probe candidate answered");
    Latency::Unknown
}

/// Runs [`measure`] on an interval while the connection is open
pub struct LatencyProbe {
    client: Arc<dyn ProbeClient>,
    candidates: Arc<[ProbeCandidate]>,
    interval: Duration,
    timeout: Duration,
    slot: TimerSlot,
    latency: Latency,
}

impl std::fmt::Debug for LatencyProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyProbe")
            .field("candidates", &self.candidates)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("running", &self.is_running())
            .field("latency", &self.latency)
            .finish()
    }
}

impl LatencyProbe {
    pub fn new(
        client: Arc<dyn ProbeClient>,
        candidates: Vec<ProbeCandidate>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            candidates: candidates.into(),
            interval,
            timeout,
            slot: TimerSlot::new("latency"),
            latency: Latency::Unknown,
        }
    }

    /// Measure now and then every interval. Restarting replaces the running loop.
    pub fn start(&mut self, events: mpsc::UnboundedSender<TransportEvent>) {
        let client = Arc::clone(&self.client);
        let candidates = Arc::clone(&self.candidates);
        let period = self.interval;
        let timeout = self.timeout;

        self.slot.arm(move |generation| async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let latency = measure(client.as_ref(), &candidates, timeout).await;
                if events
                    .send(TransportEvent::Latency { generation, latency })
                    .is_err()
                {
                    return;
                }
            }
        });
        debug!("Latency probe started ({:?} interval)", self.interval);
    }

    /// Stop probing and forget the last estimate
    pub fn stop(&mut self) {
        if self.slot.cancel() {
            debug!("Latency probe stopped");
        }
        self.latency = Latency::Unknown;
    }

    /// Accept a measurement from the running loop. Stale generations are ignored.
    pub fn record(&mut self, generation: Generation, latency: Latency) -> bool {
        if !self.slot.is_current(generation) {
            return false;
        }
        self.latency = latency;
        true
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_armed()
    }
}
