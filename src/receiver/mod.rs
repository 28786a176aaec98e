//! Receiver role: parse incoming datagrams, reassemble frames regardless of
//! fragment arrival order, expire stale partial frames and hand completed
//! payloads to the decoder and the display sink.

pub mod decode;
mod pipeline;
pub mod reassembly;
pub mod render;

pub use pipeline::ReceiverPipeline;

use std::net::SocketAddr;
use std::time::Duration;

/// Receiver-side tunables. The defaults match a local loopback deployment.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Local address to listen on.
    pub bind_address: SocketAddr,
    /// Largest datagram accepted from the transport.
    pub max_datagram_bytes: usize,
    /// Largest reassembled frame accepted; partial frames growing beyond
    /// this are discarded.
    pub max_frame_bytes: usize,
    /// How long an incomplete frame may wait for its missing fragments.
    pub reassembly_timeout: Duration,
    /// Cadence of the expiry sweep over pending frames.
    pub sweep_interval: Duration,
    /// Upper bound on concurrently pending partial frames.
    pub max_pending_frames: usize,
    /// Capacity of the completed-frame queue feeding the decoder. Kept
    /// small so a slow decoder drops frames instead of accumulating latency.
    pub queue_capacity: usize,
    /// OS receive buffer size requested for the datagram socket.
    pub recv_buffer_bytes: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8081)),
            max_datagram_bytes: 1400,
            max_frame_bytes: 60_000,
            reassembly_timeout: Duration::from_millis(100),
            sweep_interval: Duration::from_millis(20),
            max_pending_frames: 32,
            queue_capacity: 2,
            recv_buffer_bytes: 8 << 20,
        }
    }
}
