use clap::error::ErrorKind;
use clap::Parser;
use log::info;
use server::config::{parse_inbound_limit, PayloadFormat, ServerConfig};
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Ticks per second
    #[arg(short, long, default_value = "10")]
    tick_rate: u32,

    /// Unconsumed bytes a client may leave buffered before it is disconnected
    #[arg(long, default_value = "4096", value_parser = parse_inbound_limit)]
    max_inbound_bytes: usize,

    /// Serialization of the per-tick status payload
    #[arg(long, value_enum, default_value_t = PayloadFormat::Text)]
    payload_format: PayloadFormat,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprintln!("Usage:\n\tserver <port>\n");
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging, RUST_LOG=debug for every tick's status");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig {
        address: format!("{}:{}", args.host, args.port),
        tick_rate: args.tick_rate,
        max_inbound_bytes: args.max_inbound_bytes,
        payload_format: args.payload_format,
    };
    info!(
        "Starting server on {} at {}Hz ({:?} payloads)",
        config.address, config.tick_rate, config.payload_format
    );

    let mut server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
