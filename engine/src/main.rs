//! AirGlyph engine — air-writing gesture recognition daemon.
//!
//! Consumes 2D pointer streams over a Unix-socket IPC protocol and
//! classifies them into alphabetic characters.

pub mod ipc;
pub mod recognizer;
mod runtime;
mod state;

use clap::Parser;
use tracing::info;

use recognizer::SessionConfig;

#[derive(Parser, Debug)]
#[command(name = "airglyph-engine", about = "Air-writing gesture recognition engine")]
struct Cli {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/airglyph-ipc.sock)
    #[arg(long)]
    socket: Option<String>,

    /// Recognition tick interval in milliseconds (100-1000)
    #[arg(long, default_value_t = 400)]
    tick_ms: u64,

    /// Pause threshold before finalizing a gesture, in milliseconds (400-2000)
    #[arg(long, default_value_t = 800)]
    pause_ms: u64,

    /// Exit after N seconds (CI testing)
    #[arg(long)]
    exit_after: Option<u64>,

    /// Log all IPC messages to stderr
    #[arg(long)]
    ipc_trace: bool,

    /// Attach the stub neural classifier (fixed ranking, no model)
    #[arg(long)]
    neural_stub: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("airglyph-engine {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airglyph_engine=info".into()),
        )
        .init();

    info!("airglyph-engine v{} starting", env!("CARGO_PKG_VERSION"));

    if !(100..=1000).contains(&cli.tick_ms) {
        eprintln!("Invalid --tick-ms: {}. Range: 100-1000", cli.tick_ms);
        std::process::exit(1);
    }
    if !(400..=2000).contains(&cli.pause_ms) {
        eprintln!("Invalid --pause-ms: {}. Range: 400-2000", cli.pause_ms);
        std::process::exit(1);
    }

    let session = SessionConfig {
        tick_interval_ms: cli.tick_ms,
        pause_threshold_ms: cli.pause_ms,
        ..SessionConfig::default()
    };

    let socket_path = cli.socket.map(std::path::PathBuf::from);

    runtime::run(runtime::RuntimeConfig {
        socket_path,
        exit_after: cli.exit_after,
        ipc_trace: cli.ipc_trace,
        neural_stub: cli.neural_stub,
        session,
    })
}
