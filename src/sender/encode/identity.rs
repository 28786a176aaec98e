use async_trait::async_trait;
use bytes::BytesMut;

use crate::error::DropReason;

use super::Encoder;

/// Passthrough encoder: the raw frame is its own payload.
pub struct IdentityEncoder;

impl IdentityEncoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Encoder for IdentityEncoder {
    async fn encode(
        &mut self,
        raw: &[u8],
        _quality: u8,
        output: &mut BytesMut,
    ) -> Result<usize, DropReason> {
        output.clear();
        output.extend_from_slice(raw);
        Ok(raw.len())
    }
}
