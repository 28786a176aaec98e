//! Fragmenting frame transmission over a connected datagram socket.

use std::io;

use log::{debug, warn};
use rand::Rng;
use tokio::net::UdpSocket;

use crate::common::network::fragment::{split_into_fragments, FrameFragment, HEADER_SIZE};
use crate::common::network::socket::connect_datagram_socket;
use crate::error::{DropReason, SetupError};
use crate::sender::SenderConfig;
use crate::types::EncodedFrame;

/// Splits encoded frames into datagram-sized fragments and hands them to the
/// transport. Transmission is fire-and-forget: a full send buffer or an
/// unreachable destination costs fragments, never time.
pub struct FrameTransmitter {
    socket: UdpSocket,
    fragment_payload: usize,
    max_frame_bytes: usize,
    redundancy: f32,
}

impl FrameTransmitter {
    pub async fn connect(config: &SenderConfig) -> Result<Self, SetupError> {
        if config.max_datagram_bytes <= HEADER_SIZE {
            return Err(SetupError::InvalidConfig(
                "max_datagram_bytes must exceed the fragment header size",
            ));
        }
        if !(0.0..=1.0).contains(&config.redundancy) {
            return Err(SetupError::InvalidConfig(
                "redundancy must be a probability between 0.0 and 1.0",
            ));
        }

        let socket = connect_datagram_socket(config.destination, config.send_buffer_bytes).await?;

        Ok(Self {
            socket,
            fragment_payload: config.max_datagram_bytes - HEADER_SIZE,
            max_frame_bytes: config.max_frame_bytes,
            redundancy: config.redundancy,
        })
    }

    /// Fragment and transmit one encoded frame, returning the bytes handed
    /// to the transport. Individual fragments lost to a full send buffer or
    /// an unreachable destination are dropped silently; only an unusable
    /// socket yields [`DropReason::TransmissionFailed`].
    pub fn send_frame(&mut self, frame: &EncodedFrame) -> Result<usize, DropReason> {
        if frame.payload.len() > self.max_frame_bytes
            || frame.payload.len().div_ceil(self.fragment_payload) > u16::MAX as usize
        {
            return Err(DropReason::OversizedFrame);
        }

        let fragments = split_into_fragments(frame.sequence, &frame.payload, self.fragment_payload);

        let mut transmitted = 0;
        let mut repeats = Vec::new();
        let mut rng = rand::thread_rng();

        for fragment in &fragments {
            transmitted += self.send_fragment(fragment)?;
            if self.redundancy > 0.0 && rng.gen::<f32>() < self.redundancy {
                repeats.push(fragment);
            }
        }

        // Repeats go out only after the first pass over the frame.
        for fragment in repeats {
            transmitted += self.send_fragment(fragment)?;
        }

        debug!(
            "frame #{} transmitted in {} fragment(s), {} bytes",
            frame.sequence,
            fragments.len(),
            transmitted
        );

        Ok(transmitted)
    }

    fn send_fragment(&self, fragment: &FrameFragment) -> Result<usize, DropReason> {
        let datagram = fragment.encode();

        match self.socket.try_send(&datagram) {
            Ok(sent) => Ok(sent),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                debug!(
                    "send buffer full, dropping fragment {}/{} of frame #{}",
                    fragment.header.fragment_index,
                    fragment.header.fragment_count,
                    fragment.header.sequence
                );
                Ok(0)
            }
            Err(error) if is_fatal_send_error(&error) => {
                warn!("datagram socket unusable: {}", error);
                Err(DropReason::TransmissionFailed)
            }
            Err(error) => {
                debug!(
                    "failed to transmit fragment {}/{} of frame #{}: {}",
                    fragment.header.fragment_index,
                    fragment.header.fragment_count,
                    fragment.header.sequence,
                    error
                );
                Ok(0)
            }
        }
    }
}

/// A refused or unreachable destination is routine on a lossy link; only a
/// socket that can no longer send at all is fatal.
fn is_fatal_send_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe
    )
}
