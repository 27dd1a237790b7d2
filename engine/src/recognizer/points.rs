//! Core data model for air-written strokes and classification output.
//!
//! A stroke is an ordered, time-stamped 2D point sequence supplied by an
//! upstream tracking layer (already smoothed and gap-bridged).  Everything
//! downstream (normalization, template matching, heuristics, blending)
//! consumes these types.

// ── Points ─────────────────────────────────────────────────

/// Minimum stroke length before any classifier produces candidates.
pub const MIN_RECOGNITION_POINTS: usize = 5;

/// A single sampled point of a stroke, in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Capture time in milliseconds.  Non-decreasing along a stroke.
    pub timestamp_ms: u64,
}

impl Point {
    pub fn new(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self { x, y, timestamp_ms }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Total polyline length through `points`.
pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Mean x/y position of `points`.  Returns the origin for an empty slice.
pub fn centroid(points: &[Point]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.x).sum();
    let sum_y: f64 = points.iter().map(|p| p.y).sum();
    (sum_x / n, sum_y / n)
}

// ── Bounding box ───────────────────────────────────────────

/// Axis-aligned bounding box of a point sequence.  Derived on demand,
/// never stored alongside the points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Compute the box over `points`.  `None` for an empty slice.
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        for p in &points[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center_x(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }
}

// ── Classification output ──────────────────────────────────

/// Whether a prediction was produced mid-gesture or at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    Live,
    Final,
}

impl ResultMode {
    /// String representation for IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Final => "final",
        }
    }
}

/// A single ranked letter guess.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub label: char,
    pub confidence: f64,
}

impl Candidate {
    pub fn new(label: char, confidence: f64) -> Self {
        Self { label, confidence }
    }

    /// Generate s-expression for IPC.
    pub fn to_sexp(&self) -> String {
        format!(
            "(:label \"{}\" :confidence {:.4})",
            self.label, self.confidence
        )
    }
}

/// One complete recognition output: best guess plus ranked runners-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub primary: Candidate,
    /// Runner-up candidates, descending confidence.
    pub alternatives: Vec<Candidate>,
    pub mode: ResultMode,
}

impl Prediction {
    pub fn new(primary: Candidate, alternatives: Vec<Candidate>, mode: ResultMode) -> Self {
        Self {
            primary,
            alternatives,
            mode,
        }
    }

    /// Sentinel prediction when no classifier produced a candidate.
    pub fn unknown(mode: ResultMode) -> Self {
        Self::new(Candidate::new('?', 0.0), Vec::new(), mode)
    }

    /// Generate s-expression for IPC.
    pub fn to_sexp(&self) -> String {
        let alternatives = if self.alternatives.is_empty() {
            "nil".to_string()
        } else {
            let mut s = String::from("(");
            for (i, alt) in self.alternatives.iter().enumerate() {
                if i > 0 {
                    s.push(' ');
                }
                s.push_str(&alt.to_sexp());
            }
            s.push(')');
            s
        };
        format!(
            "(:primary {} :alternatives {} :mode :{})",
            self.primary.to_sexp(),
            alternatives,
            self.mode.as_str()
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0, 0);
        let b = Point::new(3.0, 4.0, 16);
        assert!((a.distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_path_length_polyline() {
        let points = vec![
            Point::new(0.0, 0.0, 0),
            Point::new(10.0, 0.0, 16),
            Point::new(10.0, 10.0, 32),
        ];
        assert!((path_length(&points) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_path_length_degenerate() {
        assert_eq!(path_length(&[]), 0.0);
        assert_eq!(path_length(&[Point::new(5.0, 5.0, 0)]), 0.0);
    }

    #[test]
    fn test_centroid() {
        let points = vec![
            Point::new(0.0, 0.0, 0),
            Point::new(10.0, 0.0, 16),
            Point::new(10.0, 10.0, 32),
            Point::new(0.0, 10.0, 48),
        ];
        let (cx, cy) = centroid(&points);
        assert!((cx - 5.0).abs() < 1e-9);
        assert!((cy - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box() {
        let points = vec![
            Point::new(3.0, 7.0, 0),
            Point::new(-2.0, 11.0, 16),
            Point::new(9.0, 1.0, 32),
        ];
        let bbox = BoundingBox::of(&points).unwrap();
        assert_eq!(bbox.min_x, -2.0);
        assert_eq!(bbox.max_x, 9.0);
        assert_eq!(bbox.min_y, 1.0);
        assert_eq!(bbox.max_y, 11.0);
        assert!((bbox.width() - 11.0).abs() < 1e-9);
        assert!((bbox.height() - 10.0).abs() < 1e-9);
        assert!((bbox.center_x() - 3.5).abs() < 1e-9);
        assert!((bbox.center_y() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_empty() {
        assert_eq!(BoundingBox::of(&[]), None);
    }

    #[test]
    fn test_result_mode_str() {
        assert_eq!(ResultMode::Live.as_str(), "live");
        assert_eq!(ResultMode::Final.as_str(), "final");
    }

    #[test]
    fn test_candidate_sexp() {
        let c = Candidate::new('A', 0.92);
        let sexp = c.to_sexp();
        assert!(sexp.contains(":label \"A\""));
        assert!(sexp.contains(":confidence 0.9200"));
    }

    #[test]
    fn test_prediction_sexp() {
        let p = Prediction::new(
            Candidate::new('O', 0.88),
            vec![Candidate::new('D', 0.79), Candidate::new('Q', 0.5)],
            ResultMode::Final,
        );
        let sexp = p.to_sexp();
        assert!(sexp.contains(":primary (:label \"O\""));
        assert!(sexp.contains(":mode :final"));
        assert!(sexp.contains(":label \"D\""));
        assert!(sexp.contains(":label \"Q\""));
    }

    #[test]
    fn test_prediction_unknown_sentinel() {
        let p = Prediction::unknown(ResultMode::Live);
        assert_eq!(p.primary.label, '?');
        assert_eq!(p.primary.confidence, 0.0);
        assert!(p.alternatives.is_empty());
        assert!(p.to_sexp().contains(":alternatives nil"));
    }
}
