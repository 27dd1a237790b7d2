//! Engine state — the central struct owning every subsystem.
//!
//! Single-owner pattern: one `EngineState` holds the recognizer, the
//! active gesture session, deferred timer registrations and the IPC
//! server, and is passed as `&mut self` through all event loop
//! callbacks.  Deferred work (finalize debounce, auto-clear) lives in
//! calloop one-shot timers whose tokens are tracked here so appends and
//! clears can cancel them deterministically.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use calloop::{
    timer::{TimeoutAction, Timer},
    LoopHandle, RegistrationToken,
};
use tracing::{debug, info, warn};

use crate::ipc::dispatch::format_event;
use crate::ipc::IpcServer;
use crate::recognizer::{
    AppendOutcome, GestureSession, Point, Prediction, RecognitionOutcome, Recognizer, ResultMode,
    SessionConfig, TickAction,
};

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cumulative counters for status reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct EngineStats {
    pub ticks: u64,
    pub degraded_recognitions: u64,
    pub auto_clears: u64,
    pub manual_clears: u64,
}

/// Central engine state.
pub struct EngineState {
    pub loop_handle: LoopHandle<'static, Self>,

    // Recognition
    pub recognizer: Recognizer,
    pub session: GestureSession,

    // IPC
    pub ipc_server: IpcServer,

    // Deferred work
    finalize_timer: Option<RegistrationToken>,
    auto_clear_timer: Option<RegistrationToken>,

    pub stats: EngineStats,
    pub started_at_ms: u64,

    // Shutdown flag
    pub running: bool,
}

impl EngineState {
    pub fn new(
        loop_handle: LoopHandle<'static, Self>,
        socket_path: PathBuf,
        config: SessionConfig,
        recognizer: Recognizer,
    ) -> Self {
        info!(
            "EngineState initialized (tick {} ms, pause {} ms, neural {})",
            config.tick_interval_ms,
            config.pause_threshold_ms,
            if recognizer.has_neural() {
                "attached"
            } else {
                "absent"
            }
        );

        Self {
            loop_handle,
            recognizer,
            session: GestureSession::new(config),
            ipc_server: IpcServer::new(socket_path),
            finalize_timer: None,
            auto_clear_timer: None,
            stats: EngineStats::default(),
            started_at_ms: unix_millis(),
            running: true,
        }
    }

    // ── Point intake ───────────────────────────────────────

    /// Buffer points from a client.  Returns false when the session is
    /// finalized and the points were dropped.
    pub fn submit_points(&mut self, points: &[Point]) -> bool {
        match self.session.append(points) {
            AppendOutcome::Appended { canceled_finalize } => {
                if canceled_finalize {
                    debug!("fresh points canceled pending finalize");
                    self.cancel_finalize_timer();
                }
                true
            }
            AppendOutcome::Ignored => {
                debug!("points dropped, session is finalized");
                false
            }
        }
    }

    // ── Recognition scheduling ─────────────────────────────

    /// Advance the periodic recognition tick.
    pub fn run_tick(&mut self) {
        self.stats.ticks += 1;
        let now = unix_millis();
        for action in self.session.on_tick(now) {
            match action {
                TickAction::RecognizeLive => self.recognize_live(),
                TickAction::ArmFinalize {
                    generation,
                    delay_ms,
                } => self.arm_finalize_timer(generation, delay_ms),
            }
        }
    }

    fn recognize_live(&mut self) {
        let outcome = self
            .recognizer
            .recognize(self.session.points(), ResultMode::Live);
        self.track_degraded(&outcome);
        let event = result_changed_event(&outcome);
        self.session.store_live(outcome.prediction);
        IpcServer::broadcast_event(self, &event);
    }

    fn finalize_fired(&mut self, generation: u64) {
        if !self.session.should_finalize(generation) {
            debug!("finalize timer expired with nothing to do (generation {generation})");
            return;
        }
        self.session.begin_finalize();
        let outcome = self
            .recognizer
            .recognize(self.session.points(), ResultMode::Final);
        self.track_degraded(&outcome);
        info!(
            "gesture finalized as '{}' ({:.2}, {} points)",
            outcome.prediction.primary.label,
            outcome.prediction.primary.confidence,
            self.session.point_count()
        );
        let event = result_changed_event(&outcome);
        self.session.store_final(outcome.prediction);
        IpcServer::broadcast_event(self, &event);
        self.arm_auto_clear_timer(self.session.generation(), self.session.config.auto_clear_ms);
    }

    fn auto_clear_fired(&mut self, generation: u64) {
        if !self.session.should_auto_clear(generation) {
            debug!("auto-clear timer expired with nothing to do (generation {generation})");
            return;
        }
        self.session.clear();
        self.stats.auto_clears += 1;
        debug!("session auto-cleared");
        let event = session_cleared_event(self.session.generation(), "auto");
        IpcServer::broadcast_event(self, &event);
    }

    /// Explicit reset requested by a client.  Cancels all deferred work
    /// before the session generation advances.
    pub fn clear_session(&mut self) {
        self.cancel_finalize_timer();
        self.cancel_auto_clear_timer();
        self.session.clear();
        self.stats.manual_clears += 1;
        let event = session_cleared_event(self.session.generation(), "manual");
        IpcServer::broadcast_event(self, &event);
    }

    /// Current prediction, or the unknown sentinel if none stored yet.
    pub fn current_prediction(&self) -> Prediction {
        self.session
            .current()
            .cloned()
            .unwrap_or_else(|| Prediction::unknown(ResultMode::Live))
    }

    fn track_degraded(&mut self, outcome: &RecognitionOutcome) {
        if outcome.degraded {
            self.stats.degraded_recognitions += 1;
        }
    }

    // ── Timer management ───────────────────────────────────

    fn arm_finalize_timer(&mut self, generation: u64, delay_ms: u64) {
        self.cancel_finalize_timer();
        let timer = Timer::from_duration(Duration::from_millis(delay_ms));
        let registration = self
            .loop_handle
            .insert_source(timer, move |_, _, state: &mut EngineState| {
                state.finalize_timer = None;
                state.finalize_fired(generation);
                TimeoutAction::Drop
            });
        match registration {
            Ok(token) => self.finalize_timer = Some(token),
            Err(e) => warn!("failed to arm finalize timer: {e}"),
        }
    }

    fn arm_auto_clear_timer(&mut self, generation: u64, delay_ms: u64) {
        self.cancel_auto_clear_timer();
        let timer = Timer::from_duration(Duration::from_millis(delay_ms));
        let registration = self
            .loop_handle
            .insert_source(timer, move |_, _, state: &mut EngineState| {
                state.auto_clear_timer = None;
                state.auto_clear_fired(generation);
                TimeoutAction::Drop
            });
        match registration {
            Ok(token) => self.auto_clear_timer = Some(token),
            Err(e) => warn!("failed to arm auto-clear timer: {e}"),
        }
    }

    fn cancel_finalize_timer(&mut self) {
        if let Some(token) = self.finalize_timer.take() {
            self.loop_handle.remove(token);
        }
    }

    fn cancel_auto_clear_timer(&mut self) {
        if let Some(token) = self.auto_clear_timer.take() {
            self.loop_handle.remove(token);
        }
    }

    // ── Status ─────────────────────────────────────────────

    pub fn uptime_ms(&self) -> u64 {
        unix_millis().saturating_sub(self.started_at_ms)
    }

    /// Generate s-expression for the engine-status IPC reply.
    pub fn engine_status_sexp(&self) -> String {
        let strategies = self
            .recognizer
            .strategy_names()
            .iter()
            .map(|n| format!(":{}", n))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "(:uptime-ms {} :ticks {} :strategies ({}) :neural {} :degraded {} :auto-clears {} :manual-clears {} :clients {})",
            self.uptime_ms(),
            self.stats.ticks,
            strategies,
            if self.recognizer.has_neural() { "t" } else { "nil" },
            self.stats.degraded_recognitions,
            self.stats.auto_clears,
            self.stats.manual_clears,
            self.ipc_server.client_count(),
        )
    }
}

// ── Event builders ─────────────────────────────────────────

fn result_changed_event(outcome: &RecognitionOutcome) -> String {
    format_event(
        "result-changed",
        &[
            ("result", &outcome.prediction.to_sexp()),
            ("degraded", if outcome.degraded { "t" } else { "nil" }),
        ],
    )
}

fn session_cleared_event(generation: u64, reason: &str) -> String {
    format_event(
        "session-cleared",
        &[
            ("generation", &generation.to_string()),
            ("reason", &format!(":{}", reason)),
        ],
    )
}

// ── Tests ──────────────────────────────────────────────────
