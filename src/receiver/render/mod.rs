pub mod console;

use async_trait::async_trait;

use crate::error::DropReason;

/// External display sink. Implementations wrap a window, a framebuffer or a
/// plain log line; the pipeline hands over each decoded frame exactly once.
#[async_trait]
pub trait FrameRenderer {
    async fn render(&mut self, sequence: u32, raw: &[u8]) -> Result<(), DropReason>;
}
