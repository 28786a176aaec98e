use async_trait::async_trait;
use log::debug;

use crate::error::DropReason;

use super::FrameRenderer;

/// Headless display sink: reports each frame instead of drawing it. Stands
/// in for a real window on deployments without one.
pub struct ConsoleRenderer {
    rendered: u64,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self { rendered: 0 }
    }
}

#[async_trait]
impl FrameRenderer for ConsoleRenderer {
    async fn render(&mut self, sequence: u32, raw: &[u8]) -> Result<(), DropReason> {
        self.rendered += 1;
        debug!(
            "frame #{} rendered ({} bytes, {} total)",
            sequence,
            raw.len(),
            self.rendered
        );
        Ok(())
    }
}
