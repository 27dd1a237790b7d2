//! Rotation-invariant unistroke template matcher.
//!
//! Normalizes the input stroke and compares it against every template
//! variant, searching a small rotation window for the best alignment
//! with a golden-section search, then converts the minimal mean
//! pointwise distance into a confidence score.

use tracing::debug;

use super::normalize::{normalize, rotate_by, REFERENCE_SIZE};
use super::points::{Candidate, Point, MIN_RECOGNITION_POINTS};
use super::templates::{build_library, Template};
use super::ClassifierStrategy;

/// Half-width of the rotation search window (degrees).
const ANGLE_RANGE_DEG: f64 = 45.0;

/// Bracket width below which the rotation search stops (degrees).
const ANGLE_PRECISION_DEG: f64 = 2.0;

pub struct TemplateMatcher {
    templates: Vec<Template>,
}

impl TemplateMatcher {
    pub fn new() -> Self {
        let templates = build_library();
        debug!("loaded {} unistroke template variants", templates.len());
        Self { templates }
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// Rank every template label against a raw stroke, best first.
    /// Variants sharing a label keep only their best variant's score;
    /// ties keep the first-encountered variant.
    pub fn rank(&self, points: &[Point]) -> Vec<Candidate> {
        if points.len() < MIN_RECOGNITION_POINTS {
            return Vec::new();
        }
        let query = normalize(points);
        let half_diagonal = 0.5 * (2.0f64).sqrt() * REFERENCE_SIZE;
        let range = ANGLE_RANGE_DEG.to_radians();
        let precision = ANGLE_PRECISION_DEG.to_radians();

        let mut ranked: Vec<Candidate> = Vec::new();
        for template in &self.templates {
            let d = distance_at_best_angle(&query, &template.points, -range, range, precision);
            let score = (1.0 - d / half_diagonal).max(0.0);
            match ranked.iter_mut().find(|c| c.label == template.label) {
                Some(existing) => {
                    if score > existing.confidence {
                        existing.confidence = score;
                    }
                }
                None => ranked.push(Candidate::new(template.label, score)),
            }
        }
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// Generate s-expression listing templates per label.
    pub fn library_sexp(&self) -> String {
        let mut s = String::from("(");
        let mut seen: Vec<char> = Vec::new();
        for template in &self.templates {
            if seen.contains(&template.label) {
                continue;
            }
            seen.push(template.label);
            let variants = self
                .templates
                .iter()
                .filter(|t| t.label == template.label)
                .count();
            if seen.len() > 1 {
                s.push(' ');
            }
            s.push_str(&format!(
                "(:label \"{}\" :variants {})",
                template.label, variants
            ));
        }
        s.push(')');
        s
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierStrategy for TemplateMatcher {
    fn name(&self) -> &'static str {
        "template"
    }

    fn candidates(&self, points: &[Point]) -> Vec<Candidate> {
        self.rank(points)
    }
}

/// Minimize mean pointwise distance over trial rotations in `[from, to]`
/// with a golden-section search.
fn distance_at_best_angle(
    query: &[Point],
    template: &[Point],
    mut from: f64,
    mut to: f64,
    precision: f64,
) -> f64 {
    let phi = 0.5 * (5.0f64.sqrt() - 1.0);
    let mut x1 = phi * from + (1.0 - phi) * to;
    let mut f1 = distance_at_angle(query, template, x1);
    let mut x2 = (1.0 - phi) * from + phi * to;
    let mut f2 = distance_at_angle(query, template, x2);
    while (to - from).abs() > precision {
        if f1 < f2 {
            to = x2;
            x2 = x1;
            f2 = f1;
            x1 = phi * from + (1.0 - phi) * to;
            f1 = distance_at_angle(query, template, x1);
        } else {
            from = x1;
            x1 = x2;
            f1 = f2;
            x2 = (1.0 - phi) * from + phi * to;
            f2 = distance_at_angle(query, template, x2);
        }
    }
    f1.min(f2)
}

fn distance_at_angle(query: &[Point], template: &[Point], radians: f64) -> f64 {
    path_distance(&rotate_by(query, radians), template)
}

/// Mean pointwise distance between two equal-length paths.
fn path_distance(a: &[Point], b: &[Point]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let total: f64 = (0..n).map(|i| a[i].distance(&b[i])).sum();
    total / n as f64
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample `segments` as a connected polyline, `per_segment` points each.
    fn sample_path(segments: &[((f64, f64), (f64, f64))], per_segment: usize) -> Vec<Point> {
        let mut points = Vec::new();
        let mut t_ms = 0u64;
        for &((x0, y0), (x1, y1)) in segments {
            for i in 0..per_segment {
                let t = i as f64 / (per_segment - 1) as f64;
                points.push(Point::new(x0 + t * (x1 - x0), y0 + t * (y1 - y0), t_ms));
                t_ms += 16;
            }
        }
        points
    }

    fn vertical_stroke() -> Vec<Point> {
        sample_path(&[((100.0, 20.0), (100.0, 220.0))], 24)
    }

    fn zigzag_stroke() -> Vec<Point> {
        sample_path(
            &[
                ((20.0, 20.0), (120.0, 20.0)),
                ((120.0, 20.0), (20.0, 180.0)),
                ((20.0, 180.0), (120.0, 180.0)),
            ],
            16,
        )
    }

    #[test]
    fn test_rank_requires_min_points() {
        let matcher = TemplateMatcher::new();
        let short = vertical_stroke()[..4].to_vec();
        assert!(matcher.rank(&short).is_empty());
    }

    #[test]
    fn test_rank_covers_all_labels() {
        let matcher = TemplateMatcher::new();
        let ranked = matcher.rank(&vertical_stroke());
        assert_eq!(ranked.len(), 26);
        for w in ranked.windows(2) {
            assert!(
                w[0].confidence >= w[1].confidence,
                "Expected descending confidences, got {:?} before {:?}",
                w[0],
                w[1]
            );
        }
    }

    #[test]
    fn test_scores_within_unit_range() {
        let matcher = TemplateMatcher::new();
        for candidate in matcher.rank(&zigzag_stroke()) {
            assert!(
                (0.0..=1.0).contains(&candidate.confidence),
                "Expected confidence in [0,1], got {:?}",
                candidate
            );
        }
    }

    #[test]
    fn test_vertical_stroke_matches_i() {
        let matcher = TemplateMatcher::new();
        let ranked = matcher.rank(&vertical_stroke());
        assert_eq!(ranked[0].label, 'I', "Expected I, got {:?}", &ranked[..3]);
        assert!(ranked[0].confidence > 0.9);
    }

    #[test]
    fn test_zigzag_stroke_matches_z() {
        let matcher = TemplateMatcher::new();
        let ranked = matcher.rank(&zigzag_stroke());
        assert_eq!(ranked[0].label, 'Z', "Expected Z, got {:?}", &ranked[..3]);
    }

    #[test]
    fn test_rotation_invariance_within_window() {
        let matcher = TemplateMatcher::new();
        let stroke = zigzag_stroke();
        let baseline = matcher.rank(&stroke)[0].label;
        for angle_deg in [-40.0f64, -15.0, 15.0, 40.0] {
            let rotated = rotate_by(&stroke, angle_deg.to_radians());
            let ranked = matcher.rank(&rotated);
            assert_eq!(
                ranked[0].label, baseline,
                "Expected {baseline} at {angle_deg} degrees, got {:?}",
                &ranked[..3]
            );
        }
    }

    #[test]
    fn test_template_beats_distant_letters() {
        let matcher = TemplateMatcher::new();
        let ranked = matcher.rank(&vertical_stroke());
        let score = |label: char| {
            ranked
                .iter()
                .find(|c| c.label == label)
                .map(|c| c.confidence)
                .unwrap_or(0.0)
        };
        assert!(
            score('I') > score('W'),
            "Expected I above W, got {} vs {}",
            score('I'),
            score('W')
        );
    }

    #[test]
    fn test_library_sexp_lists_labels() {
        let matcher = TemplateMatcher::new();
        let sexp = matcher.library_sexp();
        assert!(sexp.contains("(:label \"A\" :variants 3)"));
        assert!(sexp.contains("(:label \"I\" :variants 1)"));
    }
}
