//! Headless bot that plays against a running server.
//!
//! Sends one input frame per interval with a random press count and a
//! position wandering across the court, and logs every status it receives.

use clap::Parser;
use log::{info, warn};
use rand::Rng;
use shared::{
    decode_status_frame, encode_client_message, ClientMessage, Position, StatusSnapshot,
    COURT_HALF_HEIGHT, COURT_HALF_WIDTH,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:15000")]
    server: String,

    /// Milliseconds between input frames
    #[arg(short, long, default_value = "100")]
    interval_ms: u64,

    /// Number of frames to send before exiting, 0 to run forever
    #[arg(short, long, default_value = "0")]
    count: u64,

    /// Decode status payloads as bincode instead of text
    #[arg(long)]
    binary: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {} from {}", args.server, stream.local_addr()?);
    let (mut reader, mut writer) = stream.into_split();

    let binary = args.binary;
    let receiver = tokio::spawn(async move {
        let mut pending = Vec::new();
        let mut buffer = [0u8; 4096];

        loop {
            let len = match reader.read(&mut buffer).await {
                Ok(0) => {
                    info!("Server closed the connection");
                    return;
                }
                Ok(len) => len,
                Err(e) => {
                    warn!("Read error: {}", e);
                    return;
                }
            };
            pending.extend_from_slice(&buffer[..len]);

            loop {
                let used = match decode_status_frame(&pending) {
                    Ok(Some((payload, used))) => {
                        log_status(payload, binary);
                        used
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Unexpected data from server: {}", e);
                        return;
                    }
                };
                pending.drain(..used);
            }
        }
    });

    let mut ticker = interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut position = Position::default();
    let mut sent = 0u64;

    while args.count == 0 || sent < args.count {
        ticker.tick().await;

        let (presses, step_x, step_y) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(0..=3u8),
                rng.gen_range(-1.0..=1.0f32),
                rng.gen_range(-0.5..=0.5f32),
            )
        };
        position.x = (position.x + step_x).clamp(-COURT_HALF_WIDTH, COURT_HALF_WIDTH);
        position.y = (position.y + step_y).clamp(-COURT_HALF_HEIGHT, COURT_HALF_HEIGHT);

        let frame = encode_client_message(&ClientMessage { presses, position });
        writer.write_all(&frame).await?;
        sent += 1;
    }

    // Give the server one more tick to report the last frame
    tokio::time::sleep(Duration::from_millis(args.interval_ms.max(1) * 2)).await;
    receiver.abort();
    Ok(())
}

fn log_status(payload: &[u8], binary: bool) {
    if binary {
        match StatusSnapshot::from_bincode(payload) {
            Ok(snapshot) => info!("Status: {}", snapshot.to_text()),
            Err(e) => warn!("Undecodable status payload: {}", e),
        }
    } else {
        info!("Status: {}", String::from_utf8_lossy(payload));
    }
}
