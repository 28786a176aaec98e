//! Best-effort delivery of compressed video frames over unreliable datagram
//! transports. The sender captures, encodes and fragments frames into
//! MTU-sized datagrams; the receiver reassembles them in any arrival order,
//! expires stale partial frames and hands completed payloads to a decoder
//! and a display sink.

pub mod common;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod types;
