//! Built-in unistroke template library.
//!
//! Idealized single-stroke letter paths in a 0-100 design space.  Every
//! entry is normalized once at engine construction; raw input strokes
//! are normalized the same way and compared against each variant.
//! Letters with several common stroke orders carry one variant per
//! order, all competing independently under the same label.

use super::normalize::normalize;
use super::points::Point;

/// A single normalized template variant.
#[derive(Debug, Clone)]
pub struct Template {
    pub label: char,
    /// Normalized to 64 points, reference scale, centroid at origin.
    pub points: Vec<Point>,
}

/// Build the normalized template library.
pub fn build_library() -> Vec<Template> {
    library_paths()
        .into_iter()
        .map(|(label, path)| {
            let raw: Vec<Point> = path.iter().map(|&(x, y)| Point::new(x, y, 0)).collect();
            Template {
                label,
                points: normalize(&raw),
            }
        })
        .collect()
}

/// Idealized letter paths in stroke order.
#[rustfmt::skip]
fn library_paths() -> Vec<(char, Vec<(f64, f64)>)> {
    vec![
        ('A', vec![(0.0, 100.0), (25.0, 0.0), (50.0, 100.0), (10.0, 75.0), (40.0, 75.0)]),
        ('A', vec![(0.0, 100.0), (25.0, 0.0), (50.0, 100.0), (50.0, 75.0), (10.0, 75.0)]), // continuous
        ('A', vec![(25.0, 0.0), (0.0, 100.0), (25.0, 0.0), (50.0, 100.0), (10.0, 75.0), (40.0, 75.0)]), // roof first

        ('B', vec![(10.0, 100.0), (10.0, 0.0), (40.0, 0.0), (50.0, 25.0), (10.0, 50.0), (50.0, 75.0), (40.0, 100.0), (10.0, 100.0)]),

        ('C', vec![(50.0, 20.0), (20.0, 0.0), (0.0, 50.0), (20.0, 100.0), (50.0, 80.0)]),

        ('D', vec![(10.0, 100.0), (10.0, 0.0), (40.0, 0.0), (50.0, 50.0), (40.0, 100.0), (10.0, 100.0)]),

        ('E', vec![(50.0, 0.0), (0.0, 0.0), (0.0, 50.0), (40.0, 50.0), (0.0, 50.0), (0.0, 100.0), (50.0, 100.0)]),
        ('E', vec![(50.0, 0.0), (0.0, 0.0), (0.0, 50.0), (30.0, 50.0), (0.0, 50.0), (0.0, 100.0), (50.0, 100.0)]), // shallow bar

        ('F', vec![(50.0, 0.0), (0.0, 0.0), (0.0, 50.0), (40.0, 50.0), (0.0, 50.0), (0.0, 100.0)]),
        ('F', vec![(50.0, 0.0), (0.0, 0.0), (0.0, 100.0), (0.0, 50.0), (40.0, 50.0)]), // continuous

        ('G', vec![(50.0, 20.0), (20.0, 0.0), (0.0, 50.0), (20.0, 100.0), (50.0, 100.0), (50.0, 60.0), (30.0, 60.0)]),

        ('H', vec![(10.0, 0.0), (10.0, 100.0), (10.0, 50.0), (40.0, 50.0), (40.0, 0.0), (40.0, 100.0)]),
        ('H', vec![(10.0, 0.0), (10.0, 100.0), (10.0, 50.0), (40.0, 50.0), (40.0, 100.0)]), // lowercase style
        ('H', vec![(0.0, 0.0), (0.0, 100.0), (50.0, 0.0), (50.0, 100.0), (0.0, 50.0), (50.0, 50.0)]), // strokes joined

        ('I', vec![(25.0, 0.0), (25.0, 100.0)]),

        ('J', vec![(40.0, 0.0), (40.0, 80.0), (20.0, 100.0), (0.0, 80.0)]),

        ('K', vec![(0.0, 0.0), (0.0, 100.0), (0.0, 50.0), (50.0, 0.0), (0.0, 50.0), (50.0, 100.0)]),
        ('K', vec![(50.0, 0.0), (0.0, 50.0), (0.0, 100.0), (0.0, 0.0), (0.0, 50.0), (50.0, 100.0)]), // continuous

        ('L', vec![(10.0, 0.0), (10.0, 100.0), (50.0, 100.0)]),

        ('M', vec![(0.0, 100.0), (0.0, 0.0), (25.0, 50.0), (50.0, 0.0), (50.0, 100.0)]),
        ('M', vec![(0.0, 100.0), (0.0, 0.0), (25.0, 35.0), (50.0, 0.0), (50.0, 100.0)]), // shallow middle

        ('N', vec![(0.0, 100.0), (0.0, 0.0), (50.0, 100.0), (50.0, 0.0)]),

        ('O', vec![(25.0, 0.0), (50.0, 50.0), (25.0, 100.0), (0.0, 50.0), (25.0, 0.0)]),

        ('P', vec![(0.0, 100.0), (0.0, 0.0), (50.0, 0.0), (50.0, 50.0), (0.0, 50.0)]),

        ('Q', vec![(25.0, 0.0), (50.0, 50.0), (25.0, 100.0), (0.0, 50.0), (25.0, 0.0), (25.0, 75.0), (50.0, 100.0)]),

        ('R', vec![(0.0, 100.0), (0.0, 0.0), (50.0, 0.0), (50.0, 50.0), (0.0, 50.0), (50.0, 100.0)]),

        ('S', vec![(50.0, 0.0), (0.0, 25.0), (50.0, 75.0), (0.0, 100.0)]),

        ('T', vec![(0.0, 0.0), (50.0, 0.0), (25.0, 0.0), (25.0, 100.0)]),
        ('T', vec![(25.0, 0.0), (25.0, 100.0), (25.0, 0.0), (0.0, 0.0), (50.0, 0.0)]), // stem first, retraced

        ('U', vec![(0.0, 0.0), (0.0, 100.0), (50.0, 100.0), (50.0, 0.0)]),

        ('V', vec![(0.0, 0.0), (25.0, 100.0), (50.0, 0.0)]),

        ('W', vec![(0.0, 0.0), (0.0, 100.0), (25.0, 50.0), (50.0, 100.0), (50.0, 0.0)]),
        ('W', vec![(0.0, 0.0), (0.0, 100.0), (25.0, 65.0), (50.0, 100.0), (50.0, 0.0)]), // shallow middle
        ('W', vec![(0.0, 0.0), (10.0, 100.0), (25.0, 0.0), (40.0, 100.0), (50.0, 0.0)]), // sawtooth

        ('X', vec![(0.0, 0.0), (50.0, 100.0), (25.0, 50.0), (50.0, 0.0), (0.0, 100.0)]),
        ('X', vec![(0.0, 0.0), (50.0, 100.0), (50.0, 0.0), (0.0, 100.0)]), // butterfly

        ('Y', vec![(0.0, 0.0), (25.0, 50.0), (50.0, 0.0), (25.0, 50.0), (25.0, 100.0)]),
        ('Y', vec![(0.0, 0.0), (50.0, 0.0), (50.0, 100.0)]), // fast diagonal

        ('Z', vec![(0.0, 0.0), (50.0, 0.0), (0.0, 100.0), (50.0, 100.0)]),
    ]
}

// ── Tests ──────────────────────────────────────────────────
