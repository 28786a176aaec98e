use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use log::info;
use tokio::sync::watch;

use framecast::receiver::decode::identity::IdentityDecoder;
use framecast::receiver::render::console::ConsoleRenderer;
use framecast::receiver::{ReceiverConfig, ReceiverPipeline};

#[derive(Parser, Debug)]
#[clap(version, about = "Receive, reassemble and display streamed frames")]
struct Options {
    /// Local address to listen on.
    #[clap(short, long, default_value = "0.0.0.0:8081")]
    bind_address: SocketAddr,

    /// Largest datagram accepted from the transport.
    #[clap(long, default_value = "1400")]
    max_datagram_bytes: usize,

    /// Largest reassembled frame accepted.
    #[clap(long, default_value = "60000")]
    max_frame_bytes: usize,

    /// Milliseconds an incomplete frame may wait for missing fragments.
    #[clap(short, long, default_value = "100")]
    reassembly_timeout: u64,

    /// Upper bound on concurrently pending partial frames.
    #[clap(long, default_value = "32")]
    max_pending_frames: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let options = Options::parse();

    let config = ReceiverConfig {
        bind_address: options.bind_address,
        max_datagram_bytes: options.max_datagram_bytes,
        max_frame_bytes: options.max_frame_bytes,
        reassembly_timeout: Duration::from_millis(options.reassembly_timeout),
        max_pending_frames: options.max_pending_frames,
        ..ReceiverConfig::default()
    };

    let (shutdown_sender, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        let _ = shutdown_sender.send(true);
    });

    let pipeline = ReceiverPipeline::bind(
        config,
        Box::new(IdentityDecoder::new()),
        Box::new(ConsoleRenderer::new()),
        shutdown,
    )?;

    info!("listening on {}", pipeline.local_addr()?);
    pipeline.run().await;

    Ok(())
}
