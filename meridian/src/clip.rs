//! Device coordinate clipping guard.
//!
//! Rasterization backends overflow on extreme coordinates, so transformed
//! shapes are trimmed to a safe device range before drawing. The common case
//! is a shape entirely in range, which only pays for a scan.

/// Largest absolute device coordinate considered safe to draw.
pub const MAX_SAFE_COORD: f64 = 32767.0;

#[derive(Clone, Copy)]
enum Boundary {
    XMax,
    XMin,
    YMax,
    YMin,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::XMax,
    Boundary::XMin,
    Boundary::YMax,
    Boundary::YMin,
];

impl Boundary {
    fn inside(&self, x: f64, y: f64) -> bool {
        match self {
            Boundary::XMax => x <= MAX_SAFE_COORD,
            Boundary::XMin => x >= -MAX_SAFE_COORD,
            Boundary::YMax => y <= MAX_SAFE_COORD,
            Boundary::YMin => y >= -MAX_SAFE_COORD,
        }
    }

    fn intersect(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> (f64, f64) {
        match self {
            Boundary::XMax | Boundary::XMin => {
                let edge = if matches!(self, Boundary::XMax) {
                    MAX_SAFE_COORD
                } else {
                    -MAX_SAFE_COORD
                };
                let t = (edge - x1) / (x2 - x1);
                (edge, y1 + t * (y2 - y1))
            }
            Boundary::YMax | Boundary::YMin => {
                let edge = if matches!(self, Boundary::YMax) {
                    MAX_SAFE_COORD
                } else {
                    -MAX_SAFE_COORD
                };
                let t = (edge - y1) / (y2 - y1);
                (x1 + t * (x2 - x1), edge)
            }
        }
    }
}

/// Whether every coordinate of the run is within the safe device range.
pub fn within_safe_range(xs: &[f64], ys: &[f64]) -> bool {
    xs.iter()
        .chain(ys.iter())
        .all(|v| v.abs() <= MAX_SAFE_COORD)
}

/// Trims a polyline to the safe device range.
///
/// Does nothing when the run is already in range. Crossing segments are cut
/// at the range boundary; separate surviving pieces remain joined at their
/// boundary points, which is acceptable for a guard against coordinate
/// overflow.
pub fn trim_polyline(xs: &mut Vec<f64>, ys: &mut Vec<f64>) {
    if within_safe_range(xs, ys) {
        return;
    }
    for boundary in BOUNDARIES {
        clip_open(boundary, xs, ys);
    }
}

/// Trims a polygon ring to the safe device range with the Sutherland-Hodgman
/// algorithm.
///
/// The ring may carry the explicit closing vertex; the trimmed output closes
/// itself the same way the input did. Does nothing when the ring is already
/// in range.
pub fn trim_ring(xs: &mut Vec<f64>, ys: &mut Vec<f64>) {
    if within_safe_range(xs, ys) {
        return;
    }

    let explicit_closure = xs.len() > 1
        && xs.first() == xs.last()
        && ys.first() == ys.last();
    if explicit_closure {
        xs.pop();
        ys.pop();
    }

    for boundary in BOUNDARIES {
        clip_closed(boundary, xs, ys);
    }

    if explicit_closure && !xs.is_empty() {
        xs.push(xs[0]);
        ys.push(ys[0]);
    }
}

fn clip_open(boundary: Boundary, xs: &mut Vec<f64>, ys: &mut Vec<f64>) {
    let mut out_x = Vec::with_capacity(xs.len());
    let mut out_y = Vec::with_capacity(ys.len());

    for i in 1..xs.len() {
        let (x1, y1) = (xs[i - 1], ys[i - 1]);
        let (x2, y2) = (xs[i], ys[i]);
        let from_inside = boundary.inside(x1, y1);
        let to_inside = boundary.inside(x2, y2);

        if from_inside && out_x.is_empty() {
            out_x.push(x1);
            out_y.push(y1);
        }
        match (from_inside, to_inside) {
            (true, true) => {
                out_x.push(x2);
                out_y.push(y2);
            }
            (true, false) => {
                let (ix, iy) = boundary.intersect(x1, y1, x2, y2);
                out_x.push(ix);
                out_y.push(iy);
            }
            (false, true) => {
                let (ix, iy) = boundary.intersect(x1, y1, x2, y2);
                out_x.push(ix);
                out_y.push(iy);
                out_x.push(x2);
                out_y.push(y2);
            }
            (false, false) => {}
        }
    }

    *xs = out_x;
    *ys = out_y;
}

fn clip_closed(boundary: Boundary, xs: &mut Vec<f64>, ys: &mut Vec<f64>) {
    if xs.is_empty() {
        return;
    }

    let mut out_x = Vec::with_capacity(xs.len());
    let mut out_y = Vec::with_capacity(ys.len());

    for i in 0..xs.len() {
        let prev = if i == 0 { xs.len() - 1 } else { i - 1 };
        let (x1, y1) = (xs[prev], ys[prev]);
        let (x2, y2) = (xs[i], ys[i]);

        match (boundary.inside(x1, y1), boundary.inside(x2, y2)) {
            (true, true) => {
                out_x.push(x2);
                out_y.push(y2);
            }
            (true, false) => {
                let (ix, iy) = boundary.intersect(x1, y1, x2, y2);
                out_x.push(ix);
                out_y.push(iy);
            }
            (false, true) => {
                let (ix, iy) = boundary.intersect(x1, y1, x2, y2);
                out_x.push(ix);
                out_y.push(iy);
                out_x.push(x2);
                out_y.push(y2);
            }
            (false, false) => {}
        }
    }

    *xs = out_x;
    *ys = out_y;
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn in_range_run_is_untouched() {
        let mut xs = vec![0.0, 100.0, 200.0];
        let mut ys = vec![0.0, 50.0, 0.0];
        let (orig_x, orig_y) = (xs.clone(), ys.clone());
        trim_polyline(&mut xs, &mut ys);
        assert_eq!(xs, orig_x);
        assert_eq!(ys, orig_y);
    }

    #[test]
    fn polyline_crossing_is_cut_at_boundary() {
        let mut xs = vec![0.0, 100_000.0];
        let mut ys = vec![0.0, 0.0];
        trim_polyline(&mut xs, &mut ys);
        assert_eq!(xs.len(), 2);
        assert_abs_diff_eq!(xs[0], 0.0);
        assert_abs_diff_eq!(xs[1], MAX_SAFE_COORD);
        assert_abs_diff_eq!(ys[1], 0.0);
    }

    #[test]
    fn fully_outside_polyline_vanishes() {
        let mut xs = vec![50_000.0, 60_000.0];
        let mut ys = vec![0.0, 0.0];
        trim_polyline(&mut xs, &mut ys);
        assert!(xs.is_empty());
        assert!(ys.is_empty());
    }

    #[test]
    fn ring_is_clipped_to_safe_square() {
        // square from (0, 0) far past the safe range in both axes
        let mut xs = vec![0.0, 100_000.0, 100_000.0, 0.0, 0.0];
        let mut ys = vec![0.0, 0.0, 100_000.0, 100_000.0, 0.0];
        trim_ring(&mut xs, &mut ys);
        assert!(!xs.is_empty());
        assert_eq!(xs.first(), xs.last());
        assert_eq!(ys.first(), ys.last());
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!(x.abs() <= MAX_SAFE_COORD);
            assert!(y.abs() <= MAX_SAFE_COORD);
        }
        assert!(xs.iter().any(|x| *x == MAX_SAFE_COORD));
        assert!(ys.iter().any(|y| *y == MAX_SAFE_COORD));
    }

    #[test]
    fn fully_outside_ring_vanishes() {
        let mut xs = vec![40_000.0, 50_000.0, 50_000.0, 40_000.0];
        let mut ys = vec![40_000.0, 40_000.0, 50_000.0, 40_000.0];
        trim_ring(&mut xs, &mut ys);
        assert!(xs.is_empty());
    }
}
