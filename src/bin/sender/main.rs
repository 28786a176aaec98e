use std::net::SocketAddr;

use clap::Parser;
use log::info;
use tokio::sync::watch;

use framecast::sender::capture::synthetic::SyntheticFrameCapturer;
use framecast::sender::encode::identity::IdentityEncoder;
use framecast::sender::{SenderConfig, SenderPipeline};

#[derive(Parser, Debug)]
#[clap(version, about = "Capture, encode and stream frames as datagram fragments")]
struct Options {
    /// Address the receiver listens on.
    #[clap(short, long, default_value = "127.0.0.1:8081")]
    destination: SocketAddr,

    /// Frames captured per second.
    #[clap(short, long, default_value = "30")]
    frame_rate: u32,

    /// Encoder quality hint, 0-100.
    #[clap(short, long, default_value = "50")]
    quality: u8,

    /// Largest datagram handed to the transport, header included.
    #[clap(long, default_value = "1400")]
    max_datagram_bytes: usize,

    /// Largest encoded frame accepted for transmission.
    #[clap(long, default_value = "60000")]
    max_frame_bytes: usize,

    /// Probability of transmitting each fragment a second time.
    #[clap(long, default_value = "0.0")]
    redundancy: f32,

    /// Raw size of the synthetic test frames, in bytes.
    #[clap(long, default_value = "30000")]
    frame_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let options = Options::parse();

    let config = SenderConfig {
        destination: options.destination,
        frame_rate: options.frame_rate,
        quality: options.quality,
        max_datagram_bytes: options.max_datagram_bytes,
        max_frame_bytes: options.max_frame_bytes,
        redundancy: options.redundancy,
        ..SenderConfig::default()
    };

    let (shutdown_sender, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        let _ = shutdown_sender.send(true);
    });

    let pipeline = SenderPipeline::new(
        config,
        Box::new(SyntheticFrameCapturer::new(options.frame_size)),
        Box::new(IdentityEncoder::new()),
        shutdown,
    )
    .await?;

    info!("streaming to {}", options.destination);
    pipeline.run().await;

    Ok(())
}
