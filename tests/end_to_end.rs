use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, timeout};

use framecast::common::network::fragment::split_into_fragments;
use framecast::error::DropReason;
use framecast::receiver::decode::identity::IdentityDecoder;
use framecast::receiver::render::FrameRenderer;
use framecast::receiver::{ReceiverConfig, ReceiverPipeline};
use framecast::sender::capture::synthetic::SyntheticFrameCapturer;
use framecast::sender::encode::identity::IdentityEncoder;
use framecast::sender::{SenderConfig, SenderPipeline};

const FRAME_SIZE: usize = 4000;

/// Display sink that records every delivered frame for inspection.
struct CollectingRenderer {
    frames: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
}

#[async_trait]
impl FrameRenderer for CollectingRenderer {
    async fn render(&mut self, sequence: u32, raw: &[u8]) -> Result<(), DropReason> {
        self.frames.lock().await.push((sequence, raw.to_vec()));
        Ok(())
    }
}

struct TestReceiver {
    destination: SocketAddr,
    frames: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
    handle: tokio::task::JoinHandle<()>,
}

fn spawn_receiver(shutdown: watch::Receiver<bool>) -> TestReceiver {
    let config = ReceiverConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        reassembly_timeout: Duration::from_millis(50),
        sweep_interval: Duration::from_millis(10),
        ..ReceiverConfig::default()
    };

    let frames = Arc::new(Mutex::new(Vec::new()));
    let pipeline = ReceiverPipeline::bind(
        config,
        Box::new(IdentityDecoder::new()),
        Box::new(CollectingRenderer {
            frames: frames.clone(),
        }),
        shutdown,
    )
    .expect("receiver should bind an ephemeral port");
    let destination = pipeline.local_addr().expect("bound socket has an address");

    TestReceiver {
        destination,
        frames,
        handle: tokio::spawn(pipeline.run()),
    }
}

async fn wait_for_frames(
    frames: &Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
    minimum: usize,
) -> Vec<(u32, Vec<u8>)> {
    timeout(Duration::from_secs(5), async {
        loop {
            let delivered = frames.lock().await;
            if delivered.len() >= minimum {
                return delivered.clone();
            }
            drop(delivered);
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("frames should be delivered before the timeout")
}

#[tokio::test]
async fn frames_flow_from_sender_to_receiver() {
    let (shutdown_sender, shutdown) = watch::channel(false);
    let receiver = spawn_receiver(shutdown.clone());

    let sender_config = SenderConfig {
        destination: receiver.destination,
        frame_rate: 120,
        ..SenderConfig::default()
    };
    let sender = SenderPipeline::new(
        sender_config,
        Box::new(SyntheticFrameCapturer::new(FRAME_SIZE)),
        Box::new(IdentityEncoder::new()),
        shutdown,
    )
    .await
    .expect("sender should connect over loopback");
    let sender_handle = tokio::spawn(sender.run());

    let delivered = wait_for_frames(&receiver.frames, 5).await;

    shutdown_sender.send(true).expect("pipelines listen for shutdown");
    timeout(Duration::from_secs(5), async {
        let _ = sender_handle.await;
        let _ = receiver.handle.await;
    })
    .await
    .expect("pipelines should stop on shutdown");

    // Sequences come out strictly increasing even if frames were skipped.
    for window in delivered.windows(2) {
        assert!(window[0].0 < window[1].0);
    }

    // Payloads survive fragmentation and reassembly byte for byte.
    for (sequence, payload) in &delivered {
        assert_eq!(payload.len(), FRAME_SIZE);
        for (offset, byte) in payload.iter().enumerate() {
            let expected = ((u64::from(*sequence)).wrapping_add(offset as u64) & 0xff) as u8;
            assert_eq!(*byte, expected, "frame #{} corrupt at offset {}", sequence, offset);
        }
    }
}

#[tokio::test]
async fn out_of_order_fragments_still_deliver_the_frame() {
    let (shutdown_sender, shutdown) = watch::channel(false);
    let receiver = spawn_receiver(shutdown);

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let payload: Vec<u8> = (0..3000u32).map(|value| value as u8).collect();

    let mut fragments = split_into_fragments(1, &payload, 1000);
    fragments.reverse();
    for fragment in &fragments {
        socket
            .send_to(&fragment.encode(), receiver.destination)
            .await
            .unwrap();
    }

    let delivered = wait_for_frames(&receiver.frames, 1).await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, 1);
    assert_eq!(delivered[0].1, payload);

    shutdown_sender.send(true).unwrap();
    let _ = timeout(Duration::from_secs(5), receiver.handle).await;
}

#[tokio::test]
async fn incomplete_frames_are_skipped_without_blocking_later_ones() {
    let (shutdown_sender, shutdown) = watch::channel(false);
    let receiver = spawn_receiver(shutdown);

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // Frame 1 loses its second fragment; frame 2 arrives whole.
    let crippled_payload = vec![0x11u8; 2000];
    let crippled = split_into_fragments(1, &crippled_payload, 1000);
    socket
        .send_to(&crippled[0].encode(), receiver.destination)
        .await
        .unwrap();

    let whole_payload = vec![0x22u8; 2000];
    for fragment in split_into_fragments(2, &whole_payload, 1000) {
        socket
            .send_to(&fragment.encode(), receiver.destination)
            .await
            .unwrap();
    }

    let delivered = wait_for_frames(&receiver.frames, 1).await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, 2);
    assert_eq!(delivered[0].1, whole_payload);

    // The straggler arriving now must not resurrect frame 1.
    socket
        .send_to(&crippled[1].encode(), receiver.destination)
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    let delivered = receiver.frames.lock().await.clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, 2);

    shutdown_sender.send(true).unwrap();
    let _ = timeout(Duration::from_secs(5), receiver.handle).await;
}
