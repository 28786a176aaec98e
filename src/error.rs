use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Reason why a single frame, fragment or datagram was discarded.
///
/// Drops are part of normal operation on a lossy transport. They are
/// reported to the stage that observed them and never abort the pipeline,
/// with the sole exception of [`TransmissionFailed`], which marks the
/// transport itself as unusable.
///
/// [`TransmissionFailed`]: DropReason::TransmissionFailed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    #[error("frame capture failed")]
    CaptureFailed,

    #[error("frame encoding failed")]
    EncodeFailed,

    #[error("frame decoding failed")]
    DecodeFailed,

    #[error("frame rendering failed")]
    RenderFailed,

    #[error("encoded frame exceeds the configured size bound")]
    OversizedFrame,

    #[error("datagram too short or header fields malformed")]
    InvalidPacketHeader,

    #[error("payload length disagrees with datagram size")]
    InvalidPacket,

    #[error("sequence already completed, expired or superseded")]
    StaleSequence,

    #[error("fragment index already received")]
    DuplicateFragment,

    #[error("fragment count disagrees with earlier fragments of the frame")]
    FragmentMismatch,

    #[error("datagram transport is no longer usable")]
    TransmissionFailed,
}

/// Fatal startup failure. Raised while opening or configuring sockets,
/// before any frame has flowed; an unusable transport at startup is an
/// error, not a drop.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to configure datagram socket: {0}")]
    Socket(#[from] io::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: io::Error,
    },

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: SocketAddr,
        source: io::Error,
    },
}
