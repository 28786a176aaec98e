//! Staged receiver pipeline. A reception task parses datagrams and folds
//! them into the shared reassembly buffer, a sweep task expires stale
//! partial frames, and the delivery loop decodes and renders completed
//! frames outside the buffer lock.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::common::network::fragment::{FrameFragment, HEADER_SIZE};
use crate::common::network::socket::bind_datagram_socket;
use crate::error::{DropReason, SetupError};
use crate::receiver::decode::Decoder;
use crate::receiver::reassembly::ReassemblyBuffer;
use crate::receiver::render::FrameRenderer;
use crate::receiver::ReceiverConfig;
use crate::types::ReassembledFrame;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);
const DATAGRAM_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Default)]
struct DeliveryStats {
    rendered: u64,
    bytes: u64,
    dropped: u64,
}

/// Receive, reassemble, decode and render frames until shutdown is
/// signalled.
pub struct ReceiverPipeline {
    config: ReceiverConfig,
    socket: UdpSocket,
    decoder: Box<dyn Decoder + Send>,
    renderer: Box<dyn FrameRenderer + Send>,
    shutdown: watch::Receiver<bool>,
}

impl ReceiverPipeline {
    /// Bind the configured local endpoint and assemble the pipeline. Fails
    /// fast when the socket cannot be opened.
    pub fn bind(
        config: ReceiverConfig,
        decoder: Box<dyn Decoder + Send>,
        renderer: Box<dyn FrameRenderer + Send>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, SetupError> {
        if config.max_datagram_bytes <= HEADER_SIZE {
            return Err(SetupError::InvalidConfig(
                "max_datagram_bytes must exceed the fragment header size",
            ));
        }

        let socket = bind_datagram_socket(config.bind_address, config.recv_buffer_bytes)?;

        Ok(Self {
            config,
            socket,
            decoder,
            renderer,
            shutdown,
        })
    }

    /// Address the pipeline actually listens on. Useful when binding to an
    /// ephemeral port.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run all stages to completion. Returns once shutdown is signalled or
    /// the transport becomes unusable.
    pub async fn run(self) {
        let buffer = Arc::new(Mutex::new(ReassemblyBuffer::new(
            self.config.max_frame_bytes,
            self.config.max_pending_frames,
        )));
        let (completed_queue, completed_source) =
            mpsc::channel(self.config.queue_capacity.max(1));

        let reception_handle = launch_reception_task(
            self.config.clone(),
            self.socket,
            buffer.clone(),
            completed_queue,
            self.shutdown.clone(),
        );
        let sweep_handle = launch_sweep_task(self.config, buffer, self.shutdown.clone());

        run_delivery_loop(self.decoder, self.renderer, completed_source, self.shutdown).await;

        // Delivery returning means shutdown or a dead reception task; stop
        // the helpers either way.
        reception_handle.abort();
        sweep_handle.abort();
        let _ = reception_handle.await;
        let _ = sweep_handle.await;
    }
}

fn launch_reception_task(
    config: ReceiverConfig,
    socket: UdpSocket,
    buffer: Arc<Mutex<ReassemblyBuffer>>,
    completed_queue: mpsc::Sender<ReassembledFrame>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut datagram = vec![0u8; DATAGRAM_BUFFER_SIZE];
        let mut ignored: u64 = 0;

        loop {
            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                received = socket.recv_from(&mut datagram) => received,
            };

            let length = match received {
                Ok((length, _source)) => length,
                Err(error) => {
                    warn!("datagram receive failed: {}", error);
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    continue;
                }
            };

            if length > config.max_datagram_bytes {
                debug!("ignoring {}-byte datagram above the configured bound", length);
                ignored += 1;
                continue;
            }

            let fragment = match FrameFragment::decode(&datagram[..length]) {
                Ok(fragment) => fragment,
                Err(reason) => {
                    debug!("ignoring malformed datagram: {}", reason);
                    ignored += 1;
                    continue;
                }
            };

            let sequence = fragment.header.sequence;
            let frame = {
                let mut buffer = buffer.lock().await;
                match buffer.on_fragment_received(fragment, Instant::now()) {
                    Ok(()) => buffer.try_complete(sequence),
                    Err(reason) => {
                        debug!("ignoring fragment for frame #{}: {}", sequence, reason);
                        ignored += 1;
                        None
                    }
                }
            };

            let Some(frame) = frame else {
                continue;
            };

            match completed_queue.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    debug!("delivery stage busy, dropping frame #{}", frame.sequence);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("delivery queue closed, stopping reception");
                    break;
                }
            }
        }

        info!("reception stopped, {} datagram(s) ignored", ignored);
    })
}

fn launch_sweep_task(
    config: ReceiverConfig,
    buffer: Arc<Mutex<ReassemblyBuffer>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.sweep_interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let expired = buffer
                        .lock()
                        .await
                        .expire_stale(Instant::now(), config.reassembly_timeout);
                    if expired > 0 {
                        debug!("expired {} stale partial frame(s)", expired);
                    }
                }
            }
        }

        debug!("expiry sweep stopped");
    })
}

async fn run_delivery_loop(
    mut decoder: Box<dyn Decoder + Send>,
    mut renderer: Box<dyn FrameRenderer + Send>,
    mut completed_source: mpsc::Receiver<ReassembledFrame>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut stats = DeliveryStats::default();
    let mut last_report = Instant::now();
    let mut raw = BytesMut::new();

    loop {
        let frame = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            received = completed_source.recv() => match received {
                Some(frame) => frame,
                None => break,
            }
        };

        match deliver_frame(decoder.as_mut(), renderer.as_mut(), &frame, &mut raw).await {
            Ok(size) => {
                stats.rendered += 1;
                stats.bytes += size as u64;
                debug!(
                    "frame #{} delivered {:?} after its first fragment",
                    frame.sequence,
                    frame.first_arrival.elapsed()
                );
            }
            Err(reason) => {
                warn!("dropping frame #{}: {}", frame.sequence, reason);
                stats.dropped += 1;
            }
        }

        if last_report.elapsed() >= REPORT_INTERVAL {
            info!(
                "rendered {} frame(s), {} raw bytes, {} dropped",
                stats.rendered, stats.bytes, stats.dropped
            );
            stats = DeliveryStats::default();
            last_report = Instant::now();
        }
    }

    info!("delivery stopped");
}

/// Decode one completed frame and hand it to the display sink. A failure
/// affects this frame only.
async fn deliver_frame(
    decoder: &mut (dyn Decoder + Send),
    renderer: &mut (dyn FrameRenderer + Send),
    frame: &ReassembledFrame,
    raw: &mut BytesMut,
) -> Result<usize, DropReason> {
    let size = decoder.decode(&frame.payload, raw).await?;
    renderer.render(frame.sequence, &raw[..size]).await?;
    Ok(size)
}
