//! One-dimensional maximum search over a closed interval.

/// Relative bracket width at which the golden-section refinement stops.
const REFINE_TOLERANCE: f64 = 1e-10;
const MAX_REFINE_STEPS: usize = 200;

/// Treat non-finite samples as missing.
fn sample<F: Fn(f64) -> f64>(f: &F, x: f64) -> f64 {
    let y = f(x);
    if y.is_finite() {
        y
    } else {
        f64::NEG_INFINITY
    }
}

/// Location and value of the largest finite value of `f` on `[lo, hi]`.
///
/// A uniform grid of `points` samples locates the best cell, then a
/// golden-section search refines inside the neighbouring cells. Returns
/// `None` when no sample is finite.
pub(crate) fn maximum<F: Fn(f64) -> f64>(f: F, lo: f64, hi: f64, points: usize) -> Option<(f64, f64)> {
    let points = points.max(2);
    let step = (hi - lo) / (points - 1) as f64;

    let mut best: Option<(usize, f64)> = None;
    let mut skipped = 0usize;
    for i in 0..points {
        let y = sample(&f, lo + step * i as f64);
        if y == f64::NEG_INFINITY {
            skipped += 1;
            continue;
        }
        if best.map_or(true, |(_, b)| y > b) {
            best = Some((i, y));
        }
    }
    if skipped > 0 {
        log::warn!("maximum search skipped {} non-finite samples", skipped);
    }

    let (index, grid_max) = best?;
    let grid_x = lo + step * index as f64;
    if step == 0.0 {
        return Some((grid_x, grid_max));
    }

    let mut a = (grid_x - step).max(lo);
    let mut b = (grid_x + step).min(hi);
    let phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut c = b - phi * (b - a);
    let mut d = a + phi * (b - a);
    let mut fc = sample(&f, c);
    let mut fd = sample(&f, d);

    for _ in 0..MAX_REFINE_STEPS {
        if (b - a).abs() <= REFINE_TOLERANCE * (1.0 + 0.5 * (a.abs() + b.abs())) {
            break;
        }
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - phi * (b - a);
            fc = sample(&f, c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + phi * (b - a);
            fd = sample(&f, d);
        }
    }

    let (x, y) = if fc > fd { (c, fc) } else { (d, fd) };
    if y > grid_max {
        Some((x, y))
    } else {
        Some((grid_x, grid_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interior_maximum() {
        let (x, y) = maximum(|x| 3.0 - (x - 1.234567).powi(2), 0.0, 10.0, 100).unwrap();
        assert_relative_eq!(x, 1.234567, epsilon = 1e-4);
        assert_relative_eq!(y, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_edge_maximum() {
        let (x, y) = maximum(|x| 2.0 * x, 0.0, 5.0, 11).unwrap();
        assert_eq!(x, 5.0);
        assert_eq!(y, 10.0);
    }

    #[test]
    fn test_non_finite_samples() {
        // Infinite at x = 0, which is skipped.
        let (_, y) = maximum(|x| 1.0 / x - x, 0.0, 1.0, 11).unwrap();
        assert!(y.is_finite());
        assert!(y >= 10.0 - 0.1);

        assert!(maximum(|_| f64::NAN, 0.0, 1.0, 10).is_none());
    }
}
