//! Wire format shared by the sender and the receiver.
//!
//! Every datagram carries exactly one fragment: a fixed header in network
//! byte order followed by one chunk of a frame's encoded payload.
//!
//! ```text
//!  0               4       6       8       10
//!  +---------------+-------+-------+-------+------------------+
//!  | sequence      | index | count | len   | payload ...      |
//!  +---------------+-------+-------+-------+------------------+
//!       u32           u16     u16     u16
//! ```
//!
//! All fragments of one frame share `sequence` and `count`. `len` must match
//! the number of payload bytes actually present in the datagram.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DropReason;

/// Size of the fixed fragment header in bytes.
pub const HEADER_SIZE: usize = 10;

/// Header prepended to every transmitted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub sequence: u32,
    pub fragment_index: u16,
    pub fragment_count: u16,
    pub payload_length: u16,
}

impl FragmentHeader {
    pub fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u32(self.sequence);
        buffer.put_u16(self.fragment_index);
        buffer.put_u16(self.fragment_count);
        buffer.put_u16(self.payload_length);
    }

    /// Parse a header from the front of `buffer`, advancing it past the
    /// consumed bytes. A truncated header, a zero fragment count or an index
    /// outside `0..count` is rejected.
    pub fn decode(buffer: &mut impl Buf) -> Result<Self, DropReason> {
        if buffer.remaining() < HEADER_SIZE {
            return Err(DropReason::InvalidPacketHeader);
        }

        let header = Self {
            sequence: buffer.get_u32(),
            fragment_index: buffer.get_u16(),
            fragment_count: buffer.get_u16(),
            payload_length: buffer.get_u16(),
        };

        if header.fragment_count == 0 || header.fragment_index >= header.fragment_count {
            return Err(DropReason::InvalidPacketHeader);
        }

        Ok(header)
    }
}

/// A single transmission unit: one chunk of a frame's encoded payload plus
/// the header needed to put it back in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFragment {
    pub header: FragmentHeader,
    pub payload: Bytes,
}

impl FrameFragment {
    /// Serialize the fragment into a datagram-ready buffer.
    pub fn encode(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        self.header.encode(&mut buffer);
        buffer.put_slice(&self.payload);
        buffer.freeze()
    }

    /// Parse a received datagram into a fragment. The payload length declared
    /// in the header must match the bytes actually present.
    pub fn decode(mut datagram: &[u8]) -> Result<Self, DropReason> {
        let header = FragmentHeader::decode(&mut datagram)?;

        if datagram.len() != header.payload_length as usize {
            return Err(DropReason::InvalidPacket);
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(datagram),
        })
    }
}

/// Split an encoded frame payload into fragments of at most
/// `max_fragment_payload` bytes each, in index order. An empty payload still
/// yields a single empty fragment so the receiver observes the sequence.
pub fn split_into_fragments(
    sequence: u32,
    payload: &[u8],
    max_fragment_payload: usize,
) -> Vec<FrameFragment> {
    debug_assert!(max_fragment_payload > 0);
    debug_assert!(max_fragment_payload <= u16::MAX as usize);
    debug_assert!(payload.len().div_ceil(max_fragment_payload.max(1)) <= u16::MAX as usize);

    if payload.is_empty() {
        return vec![FrameFragment {
            header: FragmentHeader {
                sequence,
                fragment_index: 0,
                fragment_count: 1,
                payload_length: 0,
            },
            payload: Bytes::new(),
        }];
    }

    let fragment_count = payload.len().div_ceil(max_fragment_payload) as u16;

    payload
        .chunks(max_fragment_payload)
        .enumerate()
        .map(|(index, chunk)| FrameFragment {
            header: FragmentHeader {
                sequence,
                fragment_index: index as u16,
                fragment_count,
                payload_length: chunk.len() as u16,
            },
            payload: Bytes::copy_from_slice(chunk),
        })
        .collect()
}
