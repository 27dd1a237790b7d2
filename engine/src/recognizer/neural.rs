//! External neural classifier interface.
//!
//! The engine never loads, trains or executes a model itself.  A caller
//! that owns one implements [`NeuralClassifier`] and injects it at
//! construction; rendering the stroke into whatever input form the model
//! expects is the implementor's concern.  Inference failures surface as
//! [`NeuralError`] and are absorbed at the blending boundary, never
//! propagated to IPC clients as fatal.

use thiserror::Error;
use tracing::info;

use super::points::{Candidate, Point};

#[derive(Debug, Error)]
pub enum NeuralError {
    /// The classifier ran and failed (timeout, bad tensor, model gone).
    #[error("neural inference failed: {0}")]
    Inference(String),
}

/// Ranked output of a single inference.
#[derive(Debug, Clone)]
pub struct NeuralOutput {
    pub primary: Candidate,
    /// Runner-up guesses, descending confidence.
    pub alternatives: Vec<Candidate>,
}

impl NeuralOutput {
    pub fn new(primary: Candidate, alternatives: Vec<Candidate>) -> Self {
        Self {
            primary,
            alternatives,
        }
    }
}

/// Opaque classification collaborator.
pub trait NeuralClassifier {
    fn classify(&self, points: &[Point]) -> Result<NeuralOutput, NeuralError>;
}

/// Deterministic stand-in classifier for development and CI runs
/// without a model.
///
/// Emits a fixed ranking, so every blending branch stays observable
/// from the outside: strong geometry keeps its primary over the stub,
/// weak geometry surfaces the stub's 'X'.  An empty stroke fails the
/// inference, which drives the degraded path end to end.
#[derive(Default)]
pub struct StubNeural;

impl StubNeural {
    pub fn new() -> Self {
        info!("neural classifier stubbed (fixed ranking, no model)");
        Self
    }
}

impl NeuralClassifier for StubNeural {
    fn classify(&self, points: &[Point]) -> Result<NeuralOutput, NeuralError> {
        if points.is_empty() {
            return Err(NeuralError::Inference("empty stroke".into()));
        }
        Ok(NeuralOutput::new(
            Candidate::new('X', 0.42),
            vec![Candidate::new('K', 0.21), Candidate::new('Y', 0.11)],
        ))
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_fixed_ranking() {
        let stub = StubNeural::new();
        let stroke = vec![Point::new(10.0, 10.0, 0), Point::new(20.0, 30.0, 16)];
        let output = stub.classify(&stroke).unwrap();
        assert_eq!(output.primary.label, 'X');
        assert_eq!(output.primary.confidence, 0.42);
        assert_eq!(output.alternatives.len(), 2);
        assert!(output.alternatives[0].confidence > output.alternatives[1].confidence);
    }

    #[test]
    fn test_stub_fails_on_empty_stroke() {
        let stub = StubNeural::new();
        let err = stub.classify(&[]).unwrap_err();
        assert!(err.to_string().contains("empty stroke"));
    }
}
