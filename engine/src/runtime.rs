//! Daemon runtime — event loop assembly, signal handling, shutdown.
//!
//! Wires the recognizer, gesture session and IPC server into a calloop
//! event loop.  The recognition tick runs as a recurring timer that
//! re-arms itself from the session config, so `config-set-tick` takes
//! effect on the next fire without re-registration.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use calloop::{
    timer::{TimeoutAction, Timer},
    EventLoop,
};
use tracing::info;

use crate::ipc::IpcServer;
use crate::recognizer::{Recognizer, SessionConfig, StubNeural};
use crate::state::EngineState;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Interval between event loop wakeups when no sources fire.
const POLL_INTERVAL_MS: u64 = 25;

/// Runtime configuration assembled from the CLI.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// IPC socket path override (default: `$XDG_RUNTIME_DIR/airglyph-ipc.sock`).
    pub socket_path: Option<PathBuf>,
    /// Exit after N seconds (for CI).
    pub exit_after: Option<u64>,
    /// Log all IPC messages to stderr.
    pub ipc_trace: bool,
    /// Attach the stub neural classifier.
    pub neural_stub: bool,
    /// Session timing parameters.
    pub session: SessionConfig,
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Run the engine daemon until shutdown.
pub fn run(config: RuntimeConfig) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<EngineState>::try_new()?;

    let recognizer = if config.neural_stub {
        Recognizer::new().with_neural(Box::new(StubNeural::new()))
    } else {
        Recognizer::new()
    };

    let ipc_path = config
        .socket_path
        .unwrap_or_else(IpcServer::default_socket_path);
    let mut state = EngineState::new(
        event_loop.handle(),
        ipc_path.clone(),
        config.session,
        recognizer,
    );
    state.ipc_server.ipc_trace = config.ipc_trace;
    IpcServer::bind(&ipc_path, &event_loop.handle())?;

    // Recognition tick.  Reads the interval back from config on every
    // fire so IPC changes apply without re-registration.
    let tick_interval = Duration::from_millis(state.session.config.tick_interval_ms);
    event_loop
        .handle()
        .insert_source(Timer::from_duration(tick_interval), |_, _, state| {
            state.run_tick();
            TimeoutAction::ToDuration(Duration::from_millis(
                state.session.config.tick_interval_ms,
            ))
        })
        .map_err(|e| anyhow::anyhow!("failed to insert tick timer: {:?}", e))?;

    // Signal handling via libc (keeps the loop free of signal sources)
    install_signal_handlers();

    let start_time = Instant::now();
    let exit_duration = config.exit_after.map(Duration::from_secs);
    let mut last_status_log = Instant::now();
    let status_interval = Duration::from_secs(60);

    let poll_interval = Duration::from_millis(POLL_INTERVAL_MS);
    info!(
        "engine initialized (socket {}), entering event loop",
        ipc_path.display()
    );

    while state.running {
        // Check global shutdown flag (set by signal handler)
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("shutdown signal received, exiting");
            state.running = false;
            break;
        }

        // Exit timer for CI
        if let Some(dur) = exit_duration {
            if start_time.elapsed() >= dur {
                info!("exit timer fired after {}s", dur.as_secs());
                state.running = false;
                break;
            }
        }

        // Periodic status logging
        if last_status_log.elapsed() >= status_interval {
            let stats = state.session.stats();
            info!(
                "engine status: mode {} ({} points, busy {}), {} live / {} final predictions, {} IPC client(s)",
                state.session.mode().as_str(),
                state.session.point_count(),
                state.session.is_busy(),
                stats.live_predictions,
                stats.finalizations,
                state.ipc_server.client_count()
            );
            last_status_log = Instant::now();
        }

        // Poll IPC clients
        IpcServer::poll_clients(&mut state);

        event_loop.dispatch(Some(poll_interval), &mut state)?;
    }

    // Clean up IPC socket
    let _ = std::fs::remove_file(&state.ipc_server.socket_path);

    info!(
        "engine shutting down ({} tick(s), {} IPC client(s))",
        state.stats.ticks,
        state.ipc_server.client_count()
    );
    Ok(())
}
