use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peer_factory::config::{Configuration, VideoCodec};
use peer_factory::webrtc::{
    create_client_offer_sdp, EncoderFactorySelector, IceServer, PeerConnectionFactory,
    SystemCertificateVerifier,
};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Offer probe command line arguments
#[derive(Parser, Debug)]
#[command(name = "peer-factory-probe")]
#[command(version, about = "Print the local offer this peer connection factory would send", long_about = None)]
struct CliArgs {
    /// Configuration file (JSON)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the simulcast encoder factory (overrides config)
    #[arg(long)]
    simulcast: bool,

    /// Preferred video codec (overrides config)
    #[arg(long, value_name = "CODEC")]
    video_codec: Option<String>,

    /// STUN server URL, repeatable (replaces configured ICE servers)
    #[arg(long = "stun", value_name = "URL")]
    stun_servers: Vec<String>,

    /// Give up after this many seconds
    #[arg(short = 't', long, value_name = "SECONDS", default_value_t = 10)]
    timeout: u64,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting peer-factory-probe v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            Configuration::load(path)?
        }
        None => Configuration::default(),
    };
    if args.simulcast {
        config.simulcast_enabled = true;
    }
    if let Some(codec) = &args.video_codec {
        config.video_codec = parse_video_codec(codec)?;
    }
    if !args.stun_servers.is_empty() {
        config.webrtc.ice_servers = args.stun_servers.iter().map(IceServer::stun).collect();
    }

    let selector = Arc::new(EncoderFactorySelector::default());
    let factory = PeerConnectionFactory::from_configuration(selector, &config);
    let verifier = Arc::new(SystemCertificateVerifier::new());

    let cancel = CancellationToken::new();
    let watchdog = cancel.clone();
    let timeout = Duration::from_secs(args.timeout);
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!("Offer probe timed out after {}s", timeout.as_secs());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
            }
        }
        watchdog.cancel();
    });

    let sdp = create_client_offer_sdp(
        &factory,
        &config.webrtc,
        &config.webrtc.constraints,
        verifier,
        cancel.clone(),
    )
    .await?;
    cancel.cancel();

    println!("{}", sdp);
    Ok(())
}

fn parse_video_codec(raw: &str) -> anyhow::Result<VideoCodec> {
    let quoted = serde_json::Value::String(raw.to_ascii_lowercase());
    serde_json::from_value(quoted)
        .map_err(|_| anyhow::anyhow!("unknown video codec: {} (default, vp8, vp9, h264, av1)", raw))
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    // Factory diagnostics are logged under their own targets
    let filter = match effective_level {
        LogLevel::Error => "peer_factory=error,peer_channel=error,native_peer_channel=error,webrtc=error",
        LogLevel::Warn => "peer_factory=warn,peer_channel=warn,native_peer_channel=warn,webrtc=warn",
        LogLevel::Info => "peer_factory=info,peer_channel=info,native_peer_channel=info,webrtc=warn",
        LogLevel::Verbose => "peer_factory=debug,peer_channel=debug,native_peer_channel=debug,webrtc=warn",
        LogLevel::Debug => "peer_factory=debug,peer_channel=debug,native_peer_channel=debug,webrtc=info",
        LogLevel::Trace => "peer_factory=trace,peer_channel=trace,native_peer_channel=trace,webrtc=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
