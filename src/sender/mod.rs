//! Sender role: capture frames at a fixed pace, encode them, fragment the
//! encoded payloads and transmit the fragments as datagrams.

pub mod capture;
pub mod encode;
mod pipeline;
mod transmit;

pub use pipeline::SenderPipeline;
pub use transmit::FrameTransmitter;

use std::net::SocketAddr;
use std::time::Duration;

/// Sender-side tunables. The defaults match a local loopback deployment.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Address the receiver listens on.
    pub destination: SocketAddr,
    /// Frames captured per second.
    pub frame_rate: u32,
    /// Encoder quality hint, 0-100.
    pub quality: u8,
    /// Largest datagram handed to the transport, header included.
    pub max_datagram_bytes: usize,
    /// Largest encoded frame accepted for transmission.
    pub max_frame_bytes: usize,
    /// Probability of transmitting each fragment a second time.
    pub redundancy: f32,
    /// Capacity of the capture-to-transmit queue. Kept small so a slow
    /// transmit stage drops frames instead of accumulating latency.
    pub queue_capacity: usize,
    /// OS send buffer size requested for the datagram socket.
    pub send_buffer_bytes: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            destination: SocketAddr::from(([127, 0, 0, 1], 8081)),
            frame_rate: 30,
            quality: 50,
            max_datagram_bytes: 1400,
            max_frame_bytes: 60_000,
            redundancy: 0.0,
            queue_capacity: 2,
            send_buffer_bytes: 1 << 20,
        }
    }
}

impl SenderConfig {
    /// Pacing period of the capture stage. Never zero, whatever the
    /// configured rate, so it is always a valid timer period.
    pub(crate) fn frame_interval(&self) -> Duration {
        // Sub-nanosecond periods truncate to zero; keep the timer legal.
        (Duration::from_secs(1) / self.frame_rate.max(1)).max(Duration::from_nanos(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_interval_is_never_zero() {
        for frame_rate in [0, 1, 30, 1000, 1001, 10_000, u32::MAX] {
            let config = SenderConfig {
                frame_rate,
                ..SenderConfig::default()
            };
            assert!(
                !config.frame_interval().is_zero(),
                "rate {} produced a zero pacing period",
                frame_rate
            );
        }
    }

    #[test]
    fn frame_interval_matches_the_configured_rate() {
        let config = SenderConfig {
            frame_rate: 40,
            ..SenderConfig::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(25));
    }
}
