//! Gesture recognition pipeline.
//!
//! Provides:
//! - `points`: stroke data model and classification output types
//! - `normalize`: geometric canonicalization of raw strokes
//! - `templates`: the built-in reference shape library
//! - `matcher`: rotation-searching template matcher
//! - `heuristics`: per-letter rule-based shape detectors
//! - `neural`: interface to an externally owned neural classifier
//! - `blend`: confidence blending across classifier outputs
//! - `session`: gesture lifecycle and prediction scheduling
//!
//! The [`Recognizer`] facade composes the geometric strategies with an
//! optional neural collaborator and hands the merged result to callers.

pub mod blend;
pub mod heuristics;
pub mod matcher;
pub mod neural;
pub mod normalize;
pub mod points;
pub mod session;
pub mod templates;

pub use blend::{blend, BlendConfig};
pub use heuristics::HeuristicClassifier;
pub use matcher::TemplateMatcher;
pub use neural::{NeuralClassifier, NeuralError, NeuralOutput, StubNeural};
pub use points::{Candidate, Point, Prediction, ResultMode, MIN_RECOGNITION_POINTS};
pub use session::{
    AppendOutcome, GestureSession, SessionConfig, SessionMode, SessionStats, TickAction,
};

use tracing::warn;

// ── Strategy interface ─────────────────────────────────────

/// A candidate-producing classifier over raw stroke points.
pub trait ClassifierStrategy {
    /// Short name for logs and status reporting.
    fn name(&self) -> &'static str;

    /// Ranked candidates, best first.  Empty when the stroke is too
    /// short or no detector fired.
    fn candidates(&self, points: &[Point]) -> Vec<Candidate>;
}

// ── Facade ─────────────────────────────────────────────────

/// Outcome of one recognition pass.
#[derive(Debug, Clone)]
pub struct RecognitionOutcome {
    pub prediction: Prediction,
    /// Set when a neural classifier is attached but its inference
    /// failed and the geometric result stands alone.
    pub degraded: bool,
}

/// Composed recognition pipeline.
///
/// The two geometric strategies always run; whichever ranks its top
/// candidate higher speaks for the geometric side.  A neural classifier
/// is optional and injected by the caller that owns the model.
pub struct Recognizer {
    templates: TemplateMatcher,
    heuristics: HeuristicClassifier,
    neural: Option<Box<dyn NeuralClassifier>>,
    pub blend_config: BlendConfig,
}

impl Recognizer {
    pub fn new() -> Self {
        Self {
            templates: TemplateMatcher::new(),
            heuristics: HeuristicClassifier::new(),
            neural: None,
            blend_config: BlendConfig::default(),
        }
    }

    /// Attach a neural classifier.
    pub fn with_neural(mut self, neural: Box<dyn NeuralClassifier>) -> Self {
        self.neural = Some(neural);
        self
    }

    pub fn has_neural(&self) -> bool {
        self.neural.is_some()
    }

    pub fn templates(&self) -> &TemplateMatcher {
        &self.templates
    }

    fn strategies(&self) -> [&dyn ClassifierStrategy; 2] {
        [&self.templates, &self.heuristics]
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies().iter().map(|s| s.name()).collect()
    }

    /// Ranked candidates from whichever geometric strategy is most
    /// confident about its top guess.  First strategy wins ties.
    pub fn geometric_candidates(&self, points: &[Point]) -> Vec<Candidate> {
        let mut best: Vec<Candidate> = Vec::new();
        for strategy in self.strategies() {
            let ranked = strategy.candidates(points);
            let top = ranked.first().map(|c| c.confidence).unwrap_or(0.0);
            let best_top = best.first().map(|c| c.confidence).unwrap_or(0.0);
            if top > best_top {
                best = ranked;
            }
        }
        best
    }

    /// Run the full pipeline: geometric strategies, optional neural
    /// inference, and blending.  Neural failures degrade to the
    /// geometric result and are logged, never propagated.
    pub fn recognize(&self, points: &[Point], mode: ResultMode) -> RecognitionOutcome {
        let geometric = self.geometric_candidates(points);

        let (neural_output, degraded) = match &self.neural {
            Some(neural) => match neural.classify(points) {
                Ok(output) => (Some(output), false),
                Err(err) => {
                    warn!("neural classification failed, degrading to geometric: {err}");
                    (None, true)
                }
            },
            None => (None, false),
        };

        let prediction = blend(&geometric, neural_output.as_ref(), &self.blend_config, mode);
        RecognitionOutcome {
            prediction,
            degraded,
        }
    }
}

impl Default for Recognizer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────
