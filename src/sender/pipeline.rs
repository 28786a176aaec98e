//! Staged sender pipeline. A capture task paces the frame source and feeds a
//! bounded queue; a transmit task encodes, fragments and sends. When the
//! queue is full the new frame is dropped so capture never stalls.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::common::helpers::time::epoch_millis;
use crate::error::{DropReason, SetupError};
use crate::sender::capture::FrameCapturer;
use crate::sender::encode::Encoder;
use crate::sender::transmit::FrameTransmitter;
use crate::sender::SenderConfig;
use crate::types::{EncodedFrame, RawFrame};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct TransmitStats {
    frames: u64,
    bytes: u64,
    dropped: u64,
}

/// Capture, encode and transmit frames until shutdown is signalled.
pub struct SenderPipeline {
    config: SenderConfig,
    capturer: Box<dyn FrameCapturer + Send>,
    encoder: Box<dyn Encoder + Send>,
    transmitter: FrameTransmitter,
    shutdown: watch::Receiver<bool>,
}

impl SenderPipeline {
    /// Connect the transport and assemble the pipeline. Fails fast when the
    /// socket cannot be opened.
    pub async fn new(
        config: SenderConfig,
        capturer: Box<dyn FrameCapturer + Send>,
        encoder: Box<dyn Encoder + Send>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, SetupError> {
        let transmitter = FrameTransmitter::connect(&config).await?;

        Ok(Self {
            config,
            capturer,
            encoder,
            transmitter,
            shutdown,
        })
    }

    /// Run both stages to completion. Returns once shutdown is signalled or
    /// the transport becomes unusable.
    pub async fn run(self) {
        let (frame_queue, frame_source) = mpsc::channel(self.config.queue_capacity.max(1));

        let capture_handle = launch_capture_task(
            self.config.clone(),
            self.capturer,
            frame_queue,
            self.shutdown.clone(),
        );
        let transmit_handle = launch_transmit_task(
            self.config,
            self.encoder,
            self.transmitter,
            frame_source,
            self.shutdown,
        );

        if let Err(error) = capture_handle.await {
            error!("capture stage terminated abnormally: {}", error);
        }
        if let Err(error) = transmit_handle.await {
            error!("transmit stage terminated abnormally: {}", error);
        }
    }
}

fn launch_capture_task(
    config: SenderConfig,
    mut capturer: Box<dyn FrameCapturer + Send>,
    frame_queue: mpsc::Sender<RawFrame>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pacer = tokio::time::interval(config.frame_interval());
        let mut sequence: u32 = 0;
        let mut dropped_busy: u64 = 0;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = pacer.tick() => {}
            }

            let mut buffer = BytesMut::new();
            if let Err(reason) = capturer.capture(&mut buffer).await {
                warn!("capture failed: {}", reason);
                continue;
            }

            let frame = RawFrame {
                sequence,
                capture_timestamp: epoch_millis(),
                buffer,
            };

            match frame_queue.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    dropped_busy += 1;
                    debug!("transmit stage busy, dropping frame #{}", frame.sequence);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("frame queue closed, stopping capture");
                    break;
                }
            }

            sequence = sequence.wrapping_add(1);
        }

        info!(
            "capture stopped, {} frame(s) dropped while the transmit stage was busy",
            dropped_busy
        );
    })
}

fn launch_transmit_task(
    config: SenderConfig,
    mut encoder: Box<dyn Encoder + Send>,
    mut transmitter: FrameTransmitter,
    mut frame_source: mpsc::Receiver<RawFrame>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stats = TransmitStats::default();
        let mut last_report = Instant::now();

        loop {
            let raw = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                received = frame_source.recv() => match received {
                    Some(frame) => frame,
                    None => break,
                }
            };

            let mut encoded = BytesMut::with_capacity(config.max_frame_bytes);
            let size = match encoder.encode(&raw.buffer, config.quality, &mut encoded).await {
                Ok(size) => size,
                Err(reason) => {
                    warn!("dropping frame #{}: {}", raw.sequence, reason);
                    stats.dropped += 1;
                    continue;
                }
            };
            encoded.truncate(size);

            let frame = EncodedFrame {
                sequence: raw.sequence,
                capture_timestamp: raw.capture_timestamp,
                payload: encoded.freeze(),
            };

            match transmitter.send_frame(&frame) {
                Ok(bytes) => {
                    stats.frames += 1;
                    stats.bytes += bytes as u64;
                    debug!(
                        "frame #{} sent {} ms after capture",
                        frame.sequence,
                        epoch_millis().saturating_sub(frame.capture_timestamp)
                    );
                }
                Err(DropReason::TransmissionFailed) => {
                    error!("transport unusable, stopping the transmit stage");
                    break;
                }
                Err(reason) => {
                    warn!("dropping frame #{}: {}", frame.sequence, reason);
                    stats.dropped += 1;
                }
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                info!(
                    "transmitted {} frame(s), {} bytes, {} dropped",
                    stats.frames, stats.bytes, stats.dropped
                );
                stats = TransmitStats::default();
                last_report = Instant::now();
            }
        }

        info!("transmit stopped");
    })
}
