//! Per-letter heuristic shape detectors.
//!
//! An independent battery of detectors over raw (un-normalized) stroke
//! statistics: bounding box, regional density, direction reversals,
//! closure, loop topology, valleys and linearity.  Each detector either
//! rejects (confidence 0) or reports a hand-calibrated constant; the
//! constants are tuned against the blending thresholds and are not a
//! continuous function of shape quality.

use super::points::{BoundingBox, Candidate, Point, MIN_RECOGNITION_POINTS};
use super::ClassifierStrategy;

pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Run every detector and rank the non-zero results, best first.
    pub fn rank(&self, points: &[Point]) -> Vec<Candidate> {
        if points.len() < MIN_RECOGNITION_POINTS {
            return Vec::new();
        }
        let Some(bbox) = BoundingBox::of(points) else {
            return Vec::new();
        };
        let mut ranked: Vec<Candidate> = DETECTORS
            .iter()
            .map(|detect| detect(points, &bbox))
            .filter(|c| c.confidence > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierStrategy for HeuristicClassifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn candidates(&self, points: &[Point]) -> Vec<Candidate> {
        self.rank(points)
    }
}

type Detector = fn(&[Point], &BoundingBox) -> Candidate;

const DETECTORS: [Detector; 26] = [
    detect_a, detect_b, detect_c, detect_d, detect_e, detect_f, detect_g, detect_h, detect_i,
    detect_j, detect_k, detect_l, detect_m, detect_n, detect_o, detect_p, detect_q, detect_r,
    detect_s, detect_t, detect_u, detect_v, detect_w, detect_x, detect_y, detect_z,
];

// ── Letter detectors ───────────────────────────────────────

/// Narrow top, wide base, straight sides, no valley.
fn detect_a(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let width = bbox.width();
    let height = bbox.height();
    let top: Vec<Point> = points
        .iter()
        .filter(|p| p.y < bbox.min_y + height / 3.0)
        .copied()
        .collect();
    let bottom: Vec<Point> = points
        .iter()
        .filter(|p| p.y > bbox.max_y - height / 3.0)
        .copied()
        .collect();
    let top_w = if top.is_empty() { width } else { span_x(&top) };
    let bottom_w = if bottom.is_empty() { 0.0 } else { span_x(&bottom) };

    if height > 50.0
        && bottom_w > top_w * 1.5
        && has_triangular_top(points, bbox)
        && count_valleys(points, 0.4) == 0
        && linearity(points) > 0.7
    {
        return Candidate::new('A', 0.92);
    }
    Candidate::new('A', 0.0)
}

/// Two stacked loops on the right of a vertical spine.
fn detect_b(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if bbox.height() < 40.0 {
        return Candidate::new('B', 0.0);
    }
    let mid_y = bbox.center_y();
    let top: Vec<Point> = points.iter().filter(|p| p.y < mid_y).copied().collect();
    let bottom: Vec<Point> = points.iter().filter(|p| p.y > mid_y).copied().collect();
    if half_loop(&top) && half_loop(&bottom) {
        return Candidate::new('B', 0.81);
    }
    Candidate::new('B', 0.0)
}

fn detect_c(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if is_arc_shape(points, bbox) && !is_path_closed(points) {
        return Candidate::new('C', 0.82);
    }
    Candidate::new('C', 0.0)
}

fn detect_d(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if is_path_closed(points) && bbox.width() > 30.0 {
        return Candidate::new('D', 0.79);
    }
    Candidate::new('D', 0.0)
}

/// Three horizontal bars reaching the right half.
fn detect_e(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let h = bbox.height();
    let w = bbox.width();
    if h < 50.0 || w < 30.0 {
        return Candidate::new('E', 0.0);
    }
    let (top, mid, bottom) = right_side_density(points, bbox);
    if top > 2 && mid > 1 && bottom > 2 {
        return Candidate::new('E', 0.85);
    }
    Candidate::new('E', 0.0)
}

/// Like E but with an empty bottom-right region.
fn detect_f(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let h = bbox.height();
    let w = bbox.width();
    if h < 50.0 || w < 30.0 {
        return Candidate::new('F', 0.0);
    }
    let (top, mid, bottom) = right_side_density(points, bbox);
    if top > 2 && mid > 1 && bottom < 2 {
        return Candidate::new('F', 0.84);
    }
    Candidate::new('F', 0.0)
}

/// Open arc whose tail turns back inward.
fn detect_g(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if is_arc_shape(points, bbox) && !is_path_closed(points) {
        let tail = stroke_tail(points, 10);
        let moving_inward = tail
            .iter()
            .any(|p| p.x < bbox.max_x - 10.0 && p.y < bbox.max_y - 10.0);
        if moving_inward {
            return Candidate::new('G', 0.82);
        }
    }
    Candidate::new('G', 0.0)
}

/// Crossbar spanning two uprights at mid height.
fn detect_h(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let w = bbox.width();
    let h = bbox.height();
    if w < 40.0 || h < 50.0 {
        return Candidate::new('H', 0.0);
    }
    let mid_y = bbox.center_y();
    let cross: Vec<Point> = points
        .iter()
        .filter(|p| (p.y - mid_y).abs() < 15.0)
        .copied()
        .collect();
    if cross.len() >= 3 && span_x(&cross) > w * 0.6 {
        return Candidate::new('H', 0.83);
    }
    Candidate::new('H', 0.0)
}

/// Tall, narrow, nearly straight vertical stroke.  The only detector
/// with a graded confidence: taller and straighter scores higher.
fn detect_i(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let width = bbox.width();
    let height = bbox.height();
    let deviation = vertical_deviation(points);
    if height > 30.0 && height / (width + 1.0) > 2.0 && deviation < 0.3 {
        let confidence = (0.75 + height / 400.0 + (0.1 - deviation)).min(0.96);
        return Candidate::new('I', confidence);
    }
    Candidate::new('I', 0.0)
}

/// Descender hooking into the bottom-left corner.
fn detect_j(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let bottom_left = points
        .iter()
        .filter(|p| p.y > bbox.max_y - 30.0)
        .filter(|p| p.x < bbox.min_x + bbox.width() / 2.0)
        .count();
    if bottom_left > 2 && bbox.height() > 40.0 {
        return Candidate::new('J', 0.81);
    }
    Candidate::new('J', 0.0)
}

/// Dense left edge plus diagonals reaching the right half.
fn detect_k(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let h = bbox.height();
    let w = bbox.width();
    if h < 50.0 || w < 30.0 {
        return Candidate::new('K', 0.0);
    }
    let mid_x = bbox.center_x();
    let left = points.iter().filter(|p| p.x < bbox.min_x + 20.0).count();
    let right = points.iter().filter(|p| p.x > mid_x).count();
    if left > 5 && right > 4 {
        return Candidate::new('K', 0.80);
    }
    Candidate::new('K', 0.0)
}

fn detect_l(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if bbox.height() > 50.0 && bbox.width() > 30.0 && has_l_pattern(points, bbox) {
        return Candidate::new('L', 0.83);
    }
    Candidate::new('L', 0.0)
}

/// Two apexes with a valley between them.
fn detect_m(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let width = bbox.width();

    let mut peaks: Vec<usize> = Vec::new();
    let mut i = 5;
    while i + 5 < points.len() {
        if points[i].y < points[i - 4].y && points[i].y < points[i + 4].y {
            peaks.push(i);
            i += 8;
        }
        i += 1;
    }

    if peaks.len() >= 2 && width > 40.0 {
        let peak_span = (points[peaks[peaks.len() - 1]].x - points[peaks[0]].x).abs();
        if count_valleys(points, 0.3) >= 1 && peak_span > width * 0.4 {
            return Candidate::new('M', 0.89);
        }
    }
    Candidate::new('M', 0.0)
}

/// One up/down direction reversal across a wide box.
fn detect_n(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let h = bbox.height();
    let w = bbox.width();
    if h < 50.0 || w < 30.0 {
        return Candidate::new('N', 0.0);
    }
    if direction_reversals(points, 2, 5.0, |p| p.y) >= 1 {
        return Candidate::new('N', 0.82);
    }
    Candidate::new('N', 0.0)
}

/// Closed, round, roughly square-bounded.
fn detect_o(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let width = bbox.width();
    let height = bbox.height();
    let aspect = width.max(height) / width.min(height);
    if is_path_closed(points)
        && is_loop_shape(points, bbox)
        && aspect < 1.6
        && width > 40.0
    {
        return Candidate::new('O', 0.88);
    }
    Candidate::new('O', 0.0)
}

/// Loop confined to the top half of a tall stroke.
fn detect_p(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let mid_y = bbox.center_y();
    let top: Vec<Point> = points.iter().filter(|p| p.y < mid_y).copied().collect();
    if half_loop(&top) && bbox.height() > 50.0 {
        return Candidate::new('P', 0.84);
    }
    Candidate::new('P', 0.0)
}

/// Full loop with a tail leaving the bottom-right.
fn detect_q(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if is_loop_shape(points, bbox) {
        let tail = stroke_tail(points, 10);
        let has_tail = tail
            .iter()
            .any(|p| p.y > bbox.max_y - 15.0 && p.x > bbox.center_x());
        if has_tail {
            return Candidate::new('Q', 0.81);
        }
    }
    Candidate::new('Q', 0.0)
}

/// Top-half loop plus a leg into the bottom-right.
fn detect_r(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let mid_y = bbox.center_y();
    let top: Vec<Point> = points.iter().filter(|p| p.y < mid_y).copied().collect();
    let has_leg = points
        .iter()
        .filter(|p| p.y >= mid_y)
        .any(|p| p.x > bbox.center_x());
    if half_loop(&top) && has_leg {
        return Candidate::new('R', 0.83);
    }
    Candidate::new('R', 0.0)
}

/// Two horizontal direction reversals in a tall box.
fn detect_s(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let height = bbox.height();
    let width = bbox.width();
    if height < 50.0 || width < 30.0 {
        return Candidate::new('S', 0.0);
    }
    if direction_reversals(points, 2, 5.0, |p| p.x) >= 2 && height > width * 0.8 {
        return Candidate::new('S', 0.90);
    }
    Candidate::new('S', 0.0)
}

/// Wide bar across the top quarter over a tall stem.
fn detect_t(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let width = bbox.width();
    let height = bbox.height();
    let top: Vec<Point> = points
        .iter()
        .filter(|p| p.y < bbox.min_y + height * 0.25)
        .copied()
        .collect();
    if top.len() < 5 {
        return Candidate::new('T', 0.0);
    }
    let top_w = span_x(&top);
    if top_w > width * 0.6 && height > width * 0.7 && has_t_pattern(points, bbox) {
        return Candidate::new('T', 0.84);
    }
    Candidate::new('T', 0.0)
}

fn detect_u(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if has_u_pattern(points, bbox) && !is_path_closed(points) {
        return Candidate::new('U', 0.80);
    }
    Candidate::new('U', 0.0)
}

/// Single apex at the bottom center.
fn detect_v(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if bbox.height() < 40.0 || bbox.width() < 30.0 {
        return Candidate::new('V', 0.0);
    }
    if has_v_pattern(points, bbox) {
        return Candidate::new('V', 0.81);
    }
    Candidate::new('V', 0.0)
}

/// Two or more bottom apexes.  Uses raw local maxima without the
/// depth filter so shallow air-written W strokes still count.
fn detect_w(points: &[Point], _bbox: &BoundingBox) -> Candidate {
    let mut valleys = 0;
    let mut i = 5;
    while i + 5 < points.len() {
        if points[i].y > points[i - 4].y && points[i].y > points[i + 4].y {
            valleys += 1;
            i += 8;
        }
        i += 1;
    }
    if valleys >= 2 {
        return Candidate::new('W', 0.85);
    }
    Candidate::new('W', 0.0)
}

/// At least one horizontal direction switch over long strides.
fn detect_x(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let w = bbox.width();
    let h = bbox.height();
    if w < 40.0 || h < 40.0 {
        return Candidate::new('X', 0.0);
    }
    if direction_reversals(points, 5, 10.0, |p| p.x) >= 1 {
        return Candidate::new('X', 0.84);
    }
    Candidate::new('X', 0.0)
}

/// Wide fork above a narrow descender.
fn detect_y(points: &[Point], bbox: &BoundingBox) -> Candidate {
    let mid_y = bbox.center_y();
    let top: Vec<Point> = points.iter().filter(|p| p.y < mid_y).copied().collect();
    let bottom: Vec<Point> = points.iter().filter(|p| p.y > mid_y).copied().collect();
    let top_w = span_x(&top);
    let bottom_w = span_x(&bottom);
    if top_w > bottom_w * 2.0 && bbox.height() > 50.0 {
        return Candidate::new('Y', 0.82);
    }
    Candidate::new('Y', 0.0)
}

/// Two horizontal direction switches over long strides.
fn detect_z(points: &[Point], bbox: &BoundingBox) -> Candidate {
    if bbox.height() < 40.0 {
        return Candidate::new('Z', 0.0);
    }
    if direction_reversals(points, 5, 10.0, |p| p.x) >= 2 {
        return Candidate::new('Z', 0.85);
    }
    Candidate::new('Z', 0.0)
}

// ── Shape sensors ──────────────────────────────────────────

/// Mean horizontal deviation from the average x, relative to width.
fn vertical_deviation(points: &[Point]) -> f64 {
    if points.is_empty() {
        return 1.0;
    }
    let n = points.len() as f64;
    let avg_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_dev = points.iter().map(|p| (p.x - avg_x).abs()).sum::<f64>() / n;
    let width = span_x(points);
    mean_dev / (width + 20.0)
}

/// Endpoints within a fixed closing distance.
fn is_path_closed(points: &[Point]) -> bool {
    if points.len() < 8 {
        return false;
    }
    let first = points[0];
    let last = points[points.len() - 1];
    first.distance(&last) < 40.0
}

/// Points spread across at least 3 of 4 quadrants around the box center.
fn is_loop_shape(points: &[Point], bbox: &BoundingBox) -> bool {
    if points.len() < 5 {
        return false;
    }
    let cx = bbox.center_x();
    let cy = bbox.center_y();
    let mut quadrants = [0usize; 4];
    for p in points {
        if p.x < cx && p.y < cy {
            quadrants[0] += 1;
        } else if p.x >= cx && p.y < cy {
            quadrants[1] += 1;
        } else if p.x >= cx && p.y >= cy {
            quadrants[2] += 1;
        } else {
            quadrants[3] += 1;
        }
    }
    quadrants.iter().filter(|&&count| count > 0).count() >= 3
}

/// Loop test for a half-stroke region, evaluated against the region's
/// own bounding box so a half-height loop can still cover 3 quadrants.
fn half_loop(points: &[Point]) -> bool {
    match BoundingBox::of(points) {
        Some(bbox) => is_loop_shape(points, &bbox),
        None => false,
    }
}

/// Top-third points cluster around the horizontal center.
fn has_triangular_top(points: &[Point], bbox: &BoundingBox) -> bool {
    let top: Vec<Point> = points
        .iter()
        .filter(|p| p.y < bbox.min_y + bbox.height() / 3.0)
        .copied()
        .collect();
    if top.len() < 2 {
        return false;
    }
    let avg_x = top.iter().map(|p| p.x).sum::<f64>() / top.len() as f64;
    (avg_x - bbox.center_x()).abs() < 30.0
}

/// Point counts in the top, middle and bottom bands of the right half.
/// E wants all three bars present, F wants the bottom one missing.
fn right_side_density(points: &[Point], bbox: &BoundingBox) -> (usize, usize, usize) {
    let h = bbox.height();
    let mid_x = bbox.center_x();
    let top = points
        .iter()
        .filter(|p| p.y < bbox.min_y + h * 0.2 && p.x > mid_x)
        .count();
    let mid = points
        .iter()
        .filter(|p| p.y > bbox.min_y + h * 0.4 && p.y < bbox.min_y + h * 0.6 && p.x > mid_x)
        .count();
    let bottom = points
        .iter()
        .filter(|p| p.y > bbox.max_y - h * 0.2 && p.x > mid_x)
        .count();
    (top, mid, bottom)
}

fn has_l_pattern(points: &[Point], bbox: &BoundingBox) -> bool {
    points.iter().filter(|p| p.y > bbox.max_y - 30.0).count() > 3
}

fn has_t_pattern(points: &[Point], bbox: &BoundingBox) -> bool {
    points.iter().filter(|p| p.y < bbox.min_y + 25.0).count() > 5
}

/// Bottom points cluster around the horizontal center.
fn has_v_pattern(points: &[Point], bbox: &BoundingBox) -> bool {
    let bottom: Vec<Point> = points
        .iter()
        .filter(|p| p.y > bbox.max_y - 25.0)
        .copied()
        .collect();
    if bottom.len() < 2 {
        return false;
    }
    let avg_x = bottom.iter().map(|p| p.x).sum::<f64>() / bottom.len() as f64;
    (avg_x - bbox.center_x()).abs() < 35.0
}

/// Left/right point counts are clearly unbalanced.
fn is_arc_shape(points: &[Point], bbox: &BoundingBox) -> bool {
    let cx = bbox.center_x();
    let left = points.iter().filter(|p| p.x < cx).count() as f64;
    let right = points.iter().filter(|p| p.x >= cx).count() as f64;
    (left - right).abs() > points.len() as f64 * 0.2
}

fn has_u_pattern(points: &[Point], bbox: &BoundingBox) -> bool {
    points.iter().filter(|p| p.y > bbox.max_y - 30.0).count() > 5
}

/// Count bottom apexes deeper than `threshold` of the stroke height.
/// Screen y grows downward, so a valley is a local y maximum.
fn count_valleys(points: &[Point], threshold: f64) -> usize {
    let Some(bbox) = BoundingBox::of(points) else {
        return 0;
    };
    let height = bbox.height();
    let mut valleys = 0;
    let mut i = 5;
    while i + 5 < points.len() {
        if points[i].y > points[i - 4].y && points[i].y > points[i + 4].y {
            let left_high = min_y(&points[..i]);
            let right_high = min_y(&points[i..]);
            let depth = points[i].y - left_high.max(right_high);
            if depth > height * threshold {
                valleys += 1;
                i += 8;
            }
        }
        i += 1;
    }
    valleys
}

/// Chord-to-path-length ratio averaged over both stroke halves.
fn linearity(points: &[Point]) -> f64 {
    if points.len() < 4 {
        return 1.0;
    }
    let mid = points.len() / 2;
    let chord1 = points[0].distance(&points[mid]);
    let chord2 = points[mid].distance(&points[points.len() - 1]);

    let mut path1 = 0.0;
    for i in 1..=mid {
        path1 += points[i - 1].distance(&points[i]);
    }
    let mut path2 = 0.0;
    for i in mid + 1..points.len() {
        path2 += points[i - 1].distance(&points[i]);
    }

    (chord1 / (path1 + 0.1) + chord2 / (path2 + 0.1)) / 2.0
}

/// Count sign flips of the finite difference along one axis, sampled
/// `step` points apart and ignoring steps shorter than `min_delta`.
fn direction_reversals(
    points: &[Point],
    step: usize,
    min_delta: f64,
    axis: fn(&Point) -> f64,
) -> usize {
    let mut reversals = 0;
    let mut last_dir = 0i32;
    for i in step..points.len() {
        let delta = axis(&points[i]) - axis(&points[i - step]);
        if delta.abs() > min_delta {
            let dir = if delta > 0.0 { 1 } else { -1 };
            if last_dir != 0 && dir != last_dir {
                reversals += 1;
            }
            last_dir = dir;
        }
    }
    reversals
}

fn stroke_tail(points: &[Point], n: usize) -> &[Point] {
    &points[points.len().saturating_sub(n)..]
}

fn span_x(points: &[Point]) -> f64 {
    let max = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    max - min
}

fn min_y(points: &[Point]) -> f64 {
    points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min)
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
fn sampled_segments(segments: &[((f64, f64), (f64, f64))], per_segment: usize) -> Vec<Point> {
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

// Starts on the right side of the circle. A top start would give the
// horizontal sweep two direction reversals and trip the S detector.
#[cfg(test)]
fn circle_stroke(cx: f64, cy: f64, radius: f64, samples: usize) -> Vec<Point> {
    (0..=samples)
        .map(|i| {
            let theta = i as f64 / samples as f64 * std::f64::consts::TAU;
            Point::new(
                cx + radius * theta.cos(),
                cy + radius * theta.sin(),
                i as u64 * 16,
            )
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_min_points() {
        let classifier = HeuristicClassifier::new();
        let short = vec![
            Point::new(0.0, 0.0, 0),
            Point::new(1.0, 1.0, 16),
            Point::new(2.0, 2.0, 32),
            Point::new(3.0, 3.0, 48),
        ];
        assert!(classifier.rank(&short).is_empty());
    }

    #[test]
    fn test_vertical_stroke_is_i() {
        let classifier = HeuristicClassifier::new();
        let stroke = sampled_segments(&[((100.0, 10.0), (100.0, 200.0))], 20);
        let ranked = classifier.rank(&stroke);
        assert_eq!(ranked[0].label, 'I', "Expected I, got {:?}", ranked);
        assert!(
            ranked[0].confidence >= 0.75,
            "Expected I confidence >= 0.75, got {}",
            ranked[0].confidence
        );
    }

    #[test]
    fn test_i_confidence_capped() {
        let classifier = HeuristicClassifier::new();
        let stroke = sampled_segments(&[((50.0, 0.0), (50.0, 600.0))], 40);
        let ranked = classifier.rank(&stroke);
        assert_eq!(ranked[0].label, 'I');
        assert!(
            ranked[0].confidence <= 0.96,
            "Expected cap at 0.96, got {}",
            ranked[0].confidence
        );
    }

    #[test]
    fn test_circle_is_o() {
        let classifier = HeuristicClassifier::new();
        let stroke = circle_stroke(100.0, 100.0, 60.0, 32);
        let ranked = classifier.rank(&stroke);
        assert_eq!(ranked[0].label, 'O', "Expected O, got {:?}", ranked);
        assert!(
            ranked[0].confidence >= 0.85,
            "Expected O confidence >= 0.85, got {}",
            ranked[0].confidence
        );
    }

    #[test]
    fn test_circle_also_reports_closed_shape() {
        let classifier = HeuristicClassifier::new();
        let stroke = circle_stroke(100.0, 100.0, 60.0, 32);
        let ranked = classifier.rank(&stroke);
        // D's closed-path detector fires on any closed wide shape.
        assert!(
            ranked.iter().any(|c| c.label == 'D' && c.confidence == 0.79),
            "Expected D among candidates, got {:?}",
            ranked
        );
    }

    #[test]
    fn test_v_stroke_is_a_shape() {
        // Two straight legs, apex at the top: A without the crossbar.
        let classifier = HeuristicClassifier::new();
        let stroke = sampled_segments(
            &[
                ((0.0, 100.0), (25.0, 0.0)),
                ((25.0, 0.0), (50.0, 100.0)),
            ],
            10,
        );
        let ranked = classifier.rank(&stroke);
        assert_eq!(ranked[0].label, 'A', "Expected A, got {:?}", ranked);
        assert_eq!(ranked[0].confidence, 0.92);
    }

    #[test]
    fn test_zigzag_is_z() {
        // Height kept under 50 so the S and N gates stay shut.
        let classifier = HeuristicClassifier::new();
        let stroke = sampled_segments(
            &[
                ((0.0, 0.0), (50.0, 0.0)),
                ((50.0, 0.0), (0.0, 45.0)),
                ((0.0, 45.0), (50.0, 45.0)),
            ],
            8,
        );
        let ranked = classifier.rank(&stroke);
        assert_eq!(ranked[0].label, 'Z', "Expected Z, got {:?}", ranked);
        assert_eq!(ranked[0].confidence, 0.85);
    }

    #[test]
    fn test_s_curve_reversals() {
        let classifier = HeuristicClassifier::new();
        // Tall S: three horizontal phases right-left-right.
        let stroke = sampled_segments(
            &[
                ((50.0, 0.0), (0.0, 30.0)),
                ((0.0, 30.0), (50.0, 70.0)),
                ((50.0, 70.0), (0.0, 100.0)),
            ],
            10,
        );
        let ranked = classifier.rank(&stroke);
        assert!(
            ranked.iter().any(|c| c.label == 'S' && c.confidence == 0.90),
            "Expected S among candidates, got {:?}",
            ranked
        );
    }

    #[test]
    fn test_w_double_valley() {
        let classifier = HeuristicClassifier::new();
        let stroke = sampled_segments(
            &[
                ((0.0, 0.0), (15.0, 100.0)),
                ((15.0, 100.0), (25.0, 40.0)),
                ((25.0, 40.0), (40.0, 100.0)),
                ((40.0, 100.0), (50.0, 0.0)),
            ],
            10,
        );
        let ranked = classifier.rank(&stroke);
        assert!(
            ranked.iter().any(|c| c.label == 'W' && c.confidence == 0.85),
            "Expected W among candidates, got {:?}",
            ranked
        );
    }

    #[test]
    fn test_all_confidences_in_unit_range() {
        let classifier = HeuristicClassifier::new();
        let strokes = vec![
            sampled_segments(&[((100.0, 10.0), (100.0, 200.0))], 20),
            circle_stroke(100.0, 100.0, 60.0, 32),
            sampled_segments(
                &[((0.0, 0.0), (50.0, 0.0)), ((50.0, 0.0), (0.0, 100.0))],
                12,
            ),
        ];
        for stroke in strokes {
            for candidate in classifier.rank(&stroke) {
                assert!(
                    (0.0..=1.0).contains(&candidate.confidence),
                    "Expected confidence in [0,1], got {:?}",
                    candidate
                );
            }
        }
    }

    #[test]
    fn test_flat_stroke_rejected_by_ratio_detectors() {
        // Zero-height stroke: every detector that divides by or gates on
        // height must reject without error.
        let classifier = HeuristicClassifier::new();
        let stroke = sampled_segments(&[((0.0, 50.0), (200.0, 50.0))], 12);
        let ranked = classifier.rank(&stroke);
        assert!(
            ranked.iter().all(|c| c.label != 'O' && c.label != 'S'),
            "Expected no O/S for flat stroke, got {:?}",
            ranked
        );
    }

    // ── Sensor tests ────────────────────────────────────────

    #[test]
    fn test_is_path_closed() {
        let closed = circle_stroke(50.0, 50.0, 30.0, 16);
        assert!(is_path_closed(&closed));

        let open = sampled_segments(&[((0.0, 0.0), (100.0, 0.0))], 10);
        assert!(!is_path_closed(&open));
    }

    #[test]
    fn test_loop_shape_quadrants() {
        let circle = circle_stroke(50.0, 50.0, 30.0, 16);
        let bbox = BoundingBox::of(&circle).unwrap();
        assert!(is_loop_shape(&circle, &bbox));

        let line = sampled_segments(&[((0.0, 0.0), (100.0, 0.0))], 10);
        let line_bbox = BoundingBox::of(&line).unwrap();
        assert!(!is_loop_shape(&line, &line_bbox));
    }

    #[test]
    fn test_direction_reversals_zigzag() {
        let stroke = sampled_segments(
            &[
                ((0.0, 0.0), (50.0, 0.0)),
                ((50.0, 0.0), (0.0, 40.0)),
                ((0.0, 40.0), (50.0, 40.0)),
            ],
            8,
        );
        assert!(direction_reversals(&stroke, 5, 10.0, |p| p.x) >= 2);
        assert_eq!(direction_reversals(&stroke, 2, 5.0, |p| p.y), 0);
    }

    #[test]
    fn test_linearity_straight_vs_curved() {
        let straight = sampled_segments(&[((0.0, 0.0), (100.0, 100.0))], 20);
        assert!(linearity(&straight) > 0.9);

        let curved = circle_stroke(50.0, 50.0, 40.0, 24);
        assert!(linearity(&curved) < 0.7);
    }

    #[test]
    fn test_vertical_deviation() {
        let vertical = sampled_segments(&[((10.0, 0.0), (10.0, 100.0))], 12);
        assert!(vertical_deviation(&vertical) < 0.05);

        let diagonal = sampled_segments(&[((0.0, 0.0), (100.0, 100.0))], 12);
        assert!(vertical_deviation(&diagonal) > 0.2);
    }

    #[test]
    fn test_count_valleys_depth_filter() {
        // One deep valley between two full-height peaks.
        let stroke = sampled_segments(
            &[
                ((0.0, 100.0), (25.0, 0.0)),
                ((25.0, 0.0), (50.0, 90.0)),
                ((50.0, 90.0), (75.0, 0.0)),
            ],
            10,
        );
        assert_eq!(count_valleys(&stroke, 0.3), 1);
        // A shallow wobble is filtered out.
        let shallow = sampled_segments(
            &[
                ((0.0, 100.0), (25.0, 0.0)),
                ((25.0, 0.0), (50.0, 10.0)),
                ((50.0, 10.0), (75.0, 0.0)),
            ],
            10,
        );
        assert_eq!(count_valleys(&shallow, 0.3), 0);
    }
}
