use async_trait::async_trait;
use bytes::BytesMut;

use crate::error::DropReason;

use super::FrameCapturer;

/// Deterministic frame source for loopback runs and tests. Every frame is
/// filled with a rolling byte pattern seeded by the capture counter, so
/// frames are cheap to produce and easy to tell apart on the far end.
pub struct SyntheticFrameCapturer {
    frame_size: usize,
    counter: u64,
}

impl SyntheticFrameCapturer {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            counter: 0,
        }
    }
}

#[async_trait]
impl FrameCapturer for SyntheticFrameCapturer {
    async fn capture(&mut self, buffer: &mut BytesMut) -> Result<(), DropReason> {
        buffer.clear();
        buffer.resize(self.frame_size, 0);

        let seed = self.counter;
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = (seed.wrapping_add(offset as u64) & 0xff) as u8;
        }

        self.counter = self.counter.wrapping_add(1);
        Ok(())
    }
}
