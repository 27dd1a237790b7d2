//! Gesture session lifecycle and prediction scheduling.
//!
//! A session owns the points of one in-flight gesture and decides when
//! recognition runs.  Live recognition fires on a periodic tick whenever
//! the point count grew; a pause (unchanged count across a tick) arms a
//! single debounce deadline that finalizes the gesture once it expires.
//! A finalized session ignores further points until cleared, and every
//! clear bumps a generation counter so deferred work armed against an
//! older session can detect it is stale and no-op.
//!
//! The session is purely a state machine.  It never calls classifiers
//! or timers itself; [`GestureSession::on_tick`] returns the actions the
//! runtime must carry out, keeping the scheduling logic testable without
//! an event loop.

use super::points::{Point, Prediction};

// ── Modes ──────────────────────────────────────────────────

/// Lifecycle phase of the current gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// No points buffered.
    Idle,
    /// Points present and still growing.
    Live,
    /// Points present, unchanged since the previous tick.
    Paused,
    /// Finalized.  Terminal until the session is cleared.
    Final,
}

impl SessionMode {
    /// String representation for IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Live => "live",
            Self::Paused => "paused",
            Self::Final => "final",
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Timing and gating for the prediction state machine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval (ms) between live recognition ticks.
    pub tick_interval_ms: u64,
    /// Idle time (ms) after the last point before finalizing.
    pub pause_threshold_ms: u64,
    /// Finalization requires strictly more points than this.
    pub min_finalize_points: usize,
    /// Delay (ms) after finalization before the session auto-clears.
    pub auto_clear_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 400,
            pause_threshold_ms: 800,
            min_finalize_points: 5,
            auto_clear_ms: 2000,
        }
    }
}

// ── Tick protocol ──────────────────────────────────────────

/// Work the runtime must perform after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickAction {
    /// Run the recognition pipeline over the buffered points and store
    /// the result via [`GestureSession::store_live`].
    RecognizeLive,
    /// Arm a one-shot finalize timer for `delay_ms` from now, tagged
    /// with the session generation it was armed against.
    ArmFinalize { generation: u64, delay_ms: u64 },
}

/// Result of offering points to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Points buffered.  `canceled_finalize` is set when a pending
    /// finalize deadline was discarded and its timer must be removed.
    Appended { canceled_finalize: bool },
    /// Session is finalized; the points were dropped.
    Ignored,
}

// ── Session ────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub live_predictions: u64,
    pub finalizations: u64,
}

pub struct GestureSession {
    pub config: SessionConfig,
    points: Vec<Point>,
    mode: SessionMode,
    /// Point count at the last stored live recognition.
    last_processed_count: usize,
    /// Point count observed by the previous tick.
    last_tick_count: usize,
    /// Absolute deadline (ms) of the armed finalize debounce, if any.
    pending_finalize_deadline: Option<u64>,
    /// Excludes overlapping finalize computations.
    busy: bool,
    /// Bumped on every clear.  Deferred work compares generations.
    generation: u64,
    current: Option<Prediction>,
    stats: SessionStats,
}

impl GestureSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            points: Vec::new(),
            mode: SessionMode::Idle,
            last_processed_count: 0,
            last_tick_count: 0,
            pending_finalize_deadline: None,
            busy: false,
            generation: 0,
            current: None,
            stats: SessionStats::default(),
        }
    }

    /// Buffer new points.  A finalized session drops them; any armed
    /// finalize deadline is discarded so a fresh pause must elapse.
    pub fn append(&mut self, new_points: &[Point]) -> AppendOutcome {
        if self.mode == SessionMode::Final {
            return AppendOutcome::Ignored;
        }
        if new_points.is_empty() {
            return AppendOutcome::Appended {
                canceled_finalize: false,
            };
        }
        self.points.extend_from_slice(new_points);
        self.mode = SessionMode::Live;
        let canceled_finalize = self.pending_finalize_deadline.take().is_some();
        AppendOutcome::Appended { canceled_finalize }
    }

    /// Advance the periodic tick.  Emits at most one [`TickAction`] of
    /// each kind; both can fire on the same tick when the final points
    /// of a gesture arrived just before drawing stopped.
    pub fn on_tick(&mut self, now_ms: u64) -> Vec<TickAction> {
        let mut actions = Vec::new();
        let count = self.points.len();

        if self.mode != SessionMode::Final && !self.busy && count > 0 {
            if count != self.last_processed_count {
                actions.push(TickAction::RecognizeLive);
            }
            if count == self.last_tick_count && self.pending_finalize_deadline.is_none() {
                let delay_ms = self.config.pause_threshold_ms;
                self.pending_finalize_deadline = Some(now_ms + delay_ms);
                self.mode = SessionMode::Paused;
                actions.push(TickAction::ArmFinalize {
                    generation: self.generation,
                    delay_ms,
                });
            }
        }

        self.last_tick_count = count;
        actions
    }

    /// Store a live recognition result and mark the points processed.
    pub fn store_live(&mut self, prediction: Prediction) {
        self.last_processed_count = self.points.len();
        self.current = Some(prediction);
        self.stats.live_predictions += 1;
    }

    /// Whether an expired finalize timer may proceed.  False when the
    /// deadline was canceled by a fresh append, the session was cleared
    /// in the meantime, is already finalized, is mid-finalization, or
    /// the gesture stayed too short.
    pub fn should_finalize(&self, generation: u64) -> bool {
        generation == self.generation
            && self.pending_finalize_deadline.is_some()
            && self.mode != SessionMode::Final
            && !self.busy
            && self.points.len() > self.config.min_finalize_points
    }

    /// Enter the finalize computation.  Ticks are suppressed until
    /// [`GestureSession::store_final`] lands.
    pub fn begin_finalize(&mut self) {
        self.busy = true;
        self.pending_finalize_deadline = None;
    }

    /// Store the final result.  Terminal for this session generation.
    pub fn store_final(&mut self, prediction: Prediction) {
        self.current = Some(prediction);
        self.mode = SessionMode::Final;
        self.busy = false;
        self.stats.finalizations += 1;
    }

    /// Whether an expired auto-clear timer may reset the session.
    pub fn should_auto_clear(&self, generation: u64) -> bool {
        generation == self.generation && self.mode == SessionMode::Final
    }

    /// Reset to a fresh idle session.  Returns the new generation;
    /// deferred work holding the old one will no-op.
    pub fn clear(&mut self) -> u64 {
        self.points.clear();
        self.mode = SessionMode::Idle;
        self.last_processed_count = 0;
        self.last_tick_count = 0;
        self.pending_finalize_deadline = None;
        self.busy = false;
        self.current = None;
        self.generation += 1;
        self.generation
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn current(&self) -> Option<&Prediction> {
        self.current.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self, now_ms: u64) -> String {
        let finalize_in = self
            .pending_finalize_deadline
            .map(|deadline| deadline.saturating_sub(now_ms).to_string())
            .unwrap_or_else(|| "nil".to_string());
        let result = self
            .current
            .as_ref()
            .map(|p| p.to_sexp())
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:mode :{} :points {} :processed {} :finalize-in-ms {} :busy {} :generation {} :live-count {} :final-count {} :result {})",
            self.mode.as_str(),
            self.points.len(),
            self.last_processed_count,
            finalize_in,
            if self.busy { "t" } else { "nil" },
            self.generation,
            self.stats.live_predictions,
            self.stats.finalizations,
            result,
        )
    }

    /// Generate s-expression for IPC config.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:tick-interval-ms {} :pause-threshold-ms {} :min-finalize-points {} :auto-clear-ms {})",
            self.config.tick_interval_ms,
            self.config.pause_threshold_ms,
            self.config.min_finalize_points,
            self.config.auto_clear_ms,
        )
    }
}

impl Default for GestureSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
fn make_points(count: usize) -> Vec<Point> {
    (0..count)
        .map(|i| Point::new(i as f64 * 4.0, 100.0 - i as f64 * 2.0, i as u64 * 16))
        .collect()
}

#[cfg(test)]
fn live_prediction() -> Prediction {
    use super::points::{Candidate, ResultMode};
    Prediction::new(Candidate::new('I', 0.9), Vec::new(), ResultMode::Live)
}

#[cfg(test)]
fn final_prediction() -> Prediction {
    use super::points::{Candidate, ResultMode};
    Prediction::new(Candidate::new('I', 0.95), Vec::new(), ResultMode::Final)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let session = GestureSession::default();
        assert_eq!(session.mode(), SessionMode::Idle);
        assert_eq!(session.point_count(), 0);
        assert!(session.current().is_none());
    }

    #[test]
    fn test_append_enters_live() {
        let mut session = GestureSession::default();
        let outcome = session.append(&make_points(3));
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                canceled_finalize: false
            }
        );
        assert_eq!(session.mode(), SessionMode::Live);
        assert_eq!(session.point_count(), 3);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let mut session = GestureSession::default();
        session.append(&[]);
        assert_eq!(session.mode(), SessionMode::Idle);
    }

    #[test]
    fn test_tick_recognizes_on_growth_only() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));

        let actions = session.on_tick(1000);
        assert!(
            actions.contains(&TickAction::RecognizeLive),
            "Expected RecognizeLive, got {:?}",
            actions
        );
        session.store_live(live_prediction());

        // No growth since store_live: recognition stays quiet.
        let actions = session.on_tick(1400);
        assert!(!actions.contains(&TickAction::RecognizeLive));
    }

    #[test]
    fn test_idle_session_ticks_quietly() {
        let mut session = GestureSession::default();
        assert!(session.on_tick(1000).is_empty());
        assert!(session.on_tick(1400).is_empty());
        assert_eq!(session.mode(), SessionMode::Idle);
    }

    #[test]
    fn test_pause_arms_finalize_once() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.on_tick(1000);
        session.store_live(live_prediction());

        // Unchanged count across a tick arms the debounce.
        let actions = session.on_tick(1400);
        assert_eq!(
            actions,
            vec![TickAction::ArmFinalize {
                generation: 0,
                delay_ms: 800
            }]
        );
        assert_eq!(session.mode(), SessionMode::Paused);

        // Still paused on the next tick but already armed: no re-arm.
        assert!(session.on_tick(1800).is_empty());
    }

    #[test]
    fn test_append_cancels_pending_finalize() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.on_tick(1000);
        session.store_live(live_prediction());
        session.on_tick(1400);

        let outcome = session.append(&make_points(2));
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                canceled_finalize: true
            }
        );
        assert_eq!(session.mode(), SessionMode::Live);
        assert!(!session.should_finalize(0));

        // Next pause arms a fresh timer.
        session.on_tick(1800);
        session.store_live(live_prediction());
        let actions = session.on_tick(2200);
        assert!(actions
            .iter()
            .any(|a| matches!(a, TickAction::ArmFinalize { .. })));
    }

    #[test]
    fn test_short_gesture_never_finalizes() {
        let mut session = GestureSession::default();
        session.append(&make_points(4));
        session.on_tick(1000);
        session.store_live(live_prediction());
        let actions = session.on_tick(1400);
        assert!(actions
            .iter()
            .any(|a| matches!(a, TickAction::ArmFinalize { .. })));

        // The timer fires but the gate holds: 4 points is not > 5.
        assert!(!session.should_finalize(0));
        assert_eq!(session.mode(), SessionMode::Paused);
    }

    #[test]
    fn test_finalize_exactly_once() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.on_tick(1000);
        session.store_live(live_prediction());
        session.on_tick(1400);

        assert!(session.should_finalize(0));
        session.begin_finalize();
        session.store_final(final_prediction());
        assert_eq!(session.mode(), SessionMode::Final);
        assert_eq!(session.stats().finalizations, 1);

        // A stale second timer cannot finalize again.
        assert!(!session.should_finalize(0));
        // Ticks on a finalized session do nothing.
        assert!(session.on_tick(1800).is_empty());
    }

    #[test]
    fn test_final_session_ignores_appends() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.begin_finalize();
        session.store_final(final_prediction());

        assert_eq!(session.append(&make_points(3)), AppendOutcome::Ignored);
        assert_eq!(session.point_count(), 8);
        assert_eq!(session.mode(), SessionMode::Final);
    }

    #[test]
    fn test_busy_suppresses_ticks() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.begin_finalize();
        assert!(session.is_busy());
        assert!(session.on_tick(1000).is_empty());
    }

    #[test]
    fn test_clear_invalidates_pending_work() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.on_tick(1000);
        session.store_live(live_prediction());
        session.on_tick(1400);
        assert!(session.should_finalize(0));

        let new_generation = session.clear();
        assert_eq!(new_generation, 1);
        assert_eq!(session.mode(), SessionMode::Idle);
        assert_eq!(session.point_count(), 0);
        // The armed timer fires against generation 0 and must no-op.
        assert!(!session.should_finalize(0));
    }

    #[test]
    fn test_clear_cancels_auto_clear() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.begin_finalize();
        session.store_final(final_prediction());
        assert!(session.should_auto_clear(0));

        session.clear();
        assert!(!session.should_auto_clear(0));
        assert_eq!(session.mode(), SessionMode::Idle);
    }

    #[test]
    fn test_auto_clear_requires_final_mode() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        assert!(!session.should_auto_clear(0));
    }

    #[test]
    fn test_new_gesture_after_clear() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.begin_finalize();
        session.store_final(final_prediction());
        session.clear();

        let outcome = session.append(&make_points(6));
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                canceled_finalize: false
            }
        );
        assert_eq!(session.mode(), SessionMode::Live);
        let actions = session.on_tick(5000);
        assert!(actions.contains(&TickAction::RecognizeLive));
    }

    #[test]
    fn test_status_sexp() {
        let mut session = GestureSession::default();
        session.append(&make_points(8));
        session.on_tick(1000);
        session.store_live(live_prediction());
        session.on_tick(1400);

        let sexp = session.status_sexp(1500);
        assert!(sexp.contains(":mode :paused"), "got {}", sexp);
        assert!(sexp.contains(":points 8"));
        assert!(sexp.contains(":finalize-in-ms 700"));
        assert!(sexp.contains(":busy nil"));
        assert!(sexp.contains(":live-count 1"));
    }

    #[test]
    fn test_config_sexp() {
        let session = GestureSession::default();
        let sexp = session.config_sexp();
        assert!(sexp.contains(":tick-interval-ms 400"));
        assert!(sexp.contains(":pause-threshold-ms 800"));
        assert!(sexp.contains(":auto-clear-ms 2000"));
    }
}
