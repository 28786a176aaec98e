pub mod synthetic;

use async_trait::async_trait;
use bytes::BytesMut;

use crate::error::DropReason;

/// External frame source. Implementations wrap a camera, a screen grabber or
/// a synthetic generator; the pipeline paces the calls.
#[async_trait]
pub trait FrameCapturer {
    /// Fill `buffer` with the next raw frame, replacing its contents.
    async fn capture(&mut self, buffer: &mut BytesMut) -> Result<(), DropReason>;
}
