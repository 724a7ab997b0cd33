// ABOUTME: Resilient control channel to the SSH gateway
// Connection state machine, inbound routing, latency probing and reconnect countdown

pub mod channel;
pub mod connection;
pub mod error;
pub mod latency;
pub mod protocol;
pub mod reconnect;
pub mod router;
pub mod stomp;

pub use channel::{ChannelCommand, ChannelEvent, Connector, PhysicalChannel, RemotePeer, StompConnector};
pub use connection::{ConnectOutcome, ReconnectPolicy, TransportConnection, TransportUpdate};
pub use error::{FrameError, TransportError};
pub use latency::{HttpProbeClient, LatencyProbe, ProbeCandidate, ProbeClient, ProbeMethod};
pub use protocol::{
    ConnectRequest, ConnectionState, ConnectionStatus, Destinations, Inbound, InboundFrame,
    Latency, OutboundFrame, OutboundKind,
};
pub use reconnect::{Countdown, ReconnectScheduler};
pub use router::{InboundRouter, RouteOutcome};

use crate::timer::Generation;

/// Everything the transport's background tasks report to the event loop.
///
/// Events carry the epoch or timer generation they were produced under so
/// the connection can discard anything that outlived its origin.
#[derive(Debug)]
pub enum TransportEvent {
    /// A connection attempt finished
    Handshake {
        epoch: u64,
        result: Result<PhysicalChannel, TransportError>,
    },
    /// Something arrived on the subscribed inbound queue
    Channel { epoch: u64, event: ChannelEvent },
    /// One second of the reconnect countdown elapsed
    ReconnectTick { generation: Generation },
    /// The latency probe finished a measurement round
    Latency {
        generation: Generation,
        latency: Latency,
    },
}
