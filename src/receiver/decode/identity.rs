use async_trait::async_trait;
use bytes::BytesMut;

use crate::error::DropReason;

use super::Decoder;

/// Passthrough decoder: the payload already is the raw frame.
pub struct IdentityDecoder;

impl IdentityDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Decoder for IdentityDecoder {
    async fn decode(
        &mut self,
        payload: &[u8],
        output: &mut BytesMut,
    ) -> Result<usize, DropReason> {
        output.clear();
        output.extend_from_slice(payload);
        Ok(payload.len())
    }
}
