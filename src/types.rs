use std::time::Instant;

use bytes::{Bytes, BytesMut};

/// A captured frame before encoding.
///
/// The sequence number is assigned at capture time and identifies the frame
/// for the rest of its life, on both ends of the link.
#[derive(Debug)]
pub struct RawFrame {
    pub sequence: u32,
    /// Capture instant in milliseconds since the Unix epoch.
    pub capture_timestamp: u128,
    pub buffer: BytesMut,
}

/// A compressed frame ready for fragmentation and transmission.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub sequence: u32,
    pub capture_timestamp: u128,
    pub payload: Bytes,
}

/// A frame whose fragments have all arrived, reassembled into the original
/// encoded payload and ready for decoding.
#[derive(Debug, Clone)]
pub struct ReassembledFrame {
    pub sequence: u32,
    pub payload: Bytes,
    /// Arrival instant of the frame's first fragment, kept for latency
    /// reporting.
    pub first_arrival: Instant,
}
