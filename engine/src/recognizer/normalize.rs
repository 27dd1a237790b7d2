//! Stroke normalization for template matching.
//!
//! Reduces an arbitrary-length stroke to a canonical 64-point form:
//! evenly resampled along path length, rotated so the indicative angle
//! is zero, scaled anisotropically into a fixed reference square, and
//! translated so the centroid sits at the origin.

use super::points::{centroid, path_length, BoundingBox, Point};

/// Number of points every normalized stroke is resampled to.
pub const RESAMPLE_COUNT: usize = 64;

/// Side length of the reference square strokes are scaled into.
pub const REFERENCE_SIZE: f64 = 250.0;

/// Normalize a raw stroke into canonical form.  Deterministic and pure.
pub fn normalize(points: &[Point]) -> Vec<Point> {
    let resampled = resample(points, RESAMPLE_COUNT);
    let rotated = rotate_by(&resampled, -indicative_angle(&resampled));
    let scaled = scale_to_square(&rotated, REFERENCE_SIZE);
    translate_to_origin(&scaled)
}

/// Resample a polyline to `n` points evenly spaced along its path length.
///
/// Walks the original segments accumulating distance; whenever the
/// accumulated distance reaches the target interval, a point is
/// interpolated at the exact fractional position and re-enters the walk
/// as the new segment start.  A stroke with fewer than 2 distinct points
/// (zero path length) is filled by duplicating its first point.
pub fn resample(points: &[Point], n: usize) -> Vec<Point> {
    if n == 0 || points.is_empty() {
        return Vec::new();
    }
    let total = path_length(points);
    if points.len() < 2 || total < f64::EPSILON {
        return vec![points[0]; n];
    }

    let interval = total / (n - 1) as f64;
    let mut resampled = Vec::with_capacity(n);
    resampled.push(points[0]);
    let mut accumulated = 0.0;
    let mut prev = points[0];
    let mut i = 1;
    while i < points.len() {
        let d = prev.distance(&points[i]);
        if accumulated + d >= interval && d > 0.0 {
            let t = (interval - accumulated) / d;
            let q = Point::new(
                prev.x + t * (points[i].x - prev.x),
                prev.y + t * (points[i].y - prev.y),
                lerp_timestamp(prev.timestamp_ms, points[i].timestamp_ms, t),
            );
            resampled.push(q);
            prev = q;
            accumulated = 0.0;
        } else {
            accumulated += d;
            prev = points[i];
            i += 1;
        }
    }
    // Accumulated rounding can leave the walk short of the final slot.
    if let Some(&last) = points.last() {
        while resampled.len() < n {
            resampled.push(last);
        }
    }
    resampled.truncate(n);
    resampled
}

/// Angle from the centroid to the first point.
pub fn indicative_angle(points: &[Point]) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (cx, cy) = centroid(points);
    (cy - first.y).atan2(cx - first.x)
}

/// Rotate all points about their centroid by `radians`.
pub fn rotate_by(points: &[Point], radians: f64) -> Vec<Point> {
    let (cx, cy) = centroid(points);
    let (sin, cos) = radians.sin_cos();
    points
        .iter()
        .map(|p| {
            let dx = p.x - cx;
            let dy = p.y - cy;
            Point::new(
                cx + dx * cos - dy * sin,
                cy + dx * sin + dy * cos,
                p.timestamp_ms,
            )
        })
        .collect()
}

/// Axis extents below this count as flat.  Covers residual extent left
/// by rotation rounding on perfectly straight strokes.
const MIN_AXIS_EXTENT: f64 = 1e-6;

/// Scale each axis independently so the bounding box becomes `size` on
/// a side.  A flat axis keeps scale factor 1.
fn scale_to_square(points: &[Point], size: f64) -> Vec<Point> {
    let Some(bbox) = BoundingBox::of(points) else {
        return Vec::new();
    };
    let sx = if bbox.width() < MIN_AXIS_EXTENT {
        1.0
    } else {
        size / bbox.width()
    };
    let sy = if bbox.height() < MIN_AXIS_EXTENT {
        1.0
    } else {
        size / bbox.height()
    };
    points
        .iter()
        .map(|p| Point::new(p.x * sx, p.y * sy, p.timestamp_ms))
        .collect()
}

/// Translate points so their centroid lands on the origin.
fn translate_to_origin(points: &[Point]) -> Vec<Point> {
    let (cx, cy) = centroid(points);
    points
        .iter()
        .map(|p| Point::new(p.x - cx, p.y - cy, p.timestamp_ms))
        .collect()
}

fn lerp_timestamp(a: u64, b: u64, t: f64) -> u64 {
    a + (b.saturating_sub(a) as f64 * t).round() as u64
}

// ── Tests ──────────────────────────────────────────────────
