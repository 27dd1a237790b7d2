//! Confidence blending between geometric and neural classification.
//!
//! The policy is asymmetric.  Geometric judgment wins outright above a
//! high-confidence cutoff (it is reliable for simple symmetric shapes
//! like O, S or W), wins again at moderate confidence when the neural
//! side is visibly unsure, and defers to the neural result everywhere
//! else.  Whenever the geometric side wins, the neural alternatives are
//! still surfaced so callers can show runner-up guesses.

use super::neural::NeuralOutput;
use super::points::{Candidate, Prediction, ResultMode};

// ── Config ─────────────────────────────────────────────────

/// Thresholds for the blending policy.
#[derive(Debug, Clone)]
pub struct BlendConfig {
    /// Geometric confidence above which geometry overrides the neural
    /// result unconditionally.
    pub geometric_override: f64,
    /// Minimum geometric confidence to win when the neural side doubts.
    pub geometric_floor: f64,
    /// Neural confidence below which the neural side counts as unsure.
    pub neural_doubt: f64,
    /// Maximum number of alternatives carried into the result.
    pub max_alternatives: usize,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            geometric_override: 0.75,
            geometric_floor: 0.5,
            neural_doubt: 0.6,
            max_alternatives: 3,
        }
    }
}

// ── Policy ─────────────────────────────────────────────────

/// Merge the best geometric candidates with a neural result.
///
/// `geometric` is ranked best-first and may be empty (too few points or
/// nothing fired).  `neural` is `None` when no classifier is attached or
/// the inference failed; the geometric side then stands alone with its
/// own runners-up as alternatives.
pub fn blend(
    geometric: &[Candidate],
    neural: Option<&NeuralOutput>,
    config: &BlendConfig,
    mode: ResultMode,
) -> Prediction {
    let best = geometric.first();

    match (best, neural) {
        (Some(g), Some(n)) => {
            let geometry_wins = g.confidence > config.geometric_override
                || (g.confidence > config.geometric_floor
                    && n.primary.confidence < config.neural_doubt);
            if geometry_wins {
                Prediction::new(*g, clip(&n.alternatives, config), mode)
            } else {
                Prediction::new(n.primary, clip(&n.alternatives, config), mode)
            }
        }
        (Some(g), None) => Prediction::new(*g, clip(&geometric[1..], config), mode),
        (None, Some(n)) => Prediction::new(n.primary, clip(&n.alternatives, config), mode),
        (None, None) => Prediction::unknown(mode),
    }
}

fn clip(candidates: &[Candidate], config: &BlendConfig) -> Vec<Candidate> {
    candidates
        .iter()
        .take(config.max_alternatives)
        .copied()
        .collect()
}

// ── Tests ──────────────────────────────────────────────────
