pub mod identity;

use async_trait::async_trait;
use bytes::BytesMut;

use crate::error::DropReason;

/// External image decoder collaborator.
#[async_trait]
pub trait Decoder {
    /// Decompress `payload` into `output`, replacing its contents, and
    /// return the decoded size. A malformed payload is reported as a drop,
    /// not a crash; the next frame decodes independently.
    async fn decode(&mut self, payload: &[u8], output: &mut BytesMut)
        -> Result<usize, DropReason>;
}
