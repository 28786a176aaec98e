pub mod identity;

use async_trait::async_trait;
use bytes::BytesMut;

use crate::error::DropReason;

/// External image encoder collaborator.
#[async_trait]
pub trait Encoder {
    /// Compress `raw` into `output`, replacing its contents, and return the
    /// encoded size. `quality` ranges 0-100; passthrough or lossless
    /// encoders may ignore it.
    async fn encode(
        &mut self,
        raw: &[u8],
        quality: u8,
        output: &mut BytesMut,
    ) -> Result<usize, DropReason>;
}
