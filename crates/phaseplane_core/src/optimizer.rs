//! Grid-seeded, derivative-free search for roots of a residual function.
//!
//! This is the fallback behind the symbolic solver: it never fails, it just
//! returns the minimizers it found. 1D search scans grid cells for sign
//! changes (refined by bisection) and for tangential minima of the squared
//! residual (refined by golden section). 2D search seeds a bounded
//! Nelder-Mead simplex at every local minimum of the sampled squared
//! residual. Callers filter the results against `fl_tol` and deduplicate.

use serde::{Deserialize, Serialize};

/// Pass-through tuning for the global search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Uniform subdivisions of each grid cell before scanning.
    pub subdivisions: usize,
    /// Iteration cap for bisection, golden-section, and simplex refinement.
    pub refine_iters: usize,
    /// Emit one `log::debug!` line per accepted minimizer.
    pub trace: bool,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            subdivisions: 4,
            refine_iters: 80,
            trace: false,
        }
    }
}

/// Inserts `subdivisions` uniform samples into every cell of `samples`.
fn refine_axis(samples: &[f64], subdivisions: usize) -> Vec<f64> {
    let sub = subdivisions.max(1);
    let mut out = Vec::with_capacity((samples.len().saturating_sub(1)) * sub + 1);
    for w in samples.windows(2) {
        let (a, b) = (w[0], w[1]);
        for k in 0..sub {
            out.push(a + (b - a) * k as f64 / sub as f64);
        }
    }
    if let Some(&last) = samples.last() {
        out.push(last);
    }
    out
}

/// All minimizers of `f(x)^2` found over the sampled interval, as
/// `(x, f(x))` pairs.
pub(crate) fn scalar_minimizers(
    f: &dyn Fn(f64) -> f64,
    samples: &[f64],
    opts: &OptimizerOptions,
) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::new();
    if samples.len() < 2 {
        for &x in samples {
            let v = f(x);
            if v == 0.0 {
                out.push((x, v));
            }
        }
        return out;
    }

    let xs = refine_axis(samples, opts.subdivisions);
    let vals: Vec<f64> = xs.iter().map(|&x| f(x)).collect();

    // Exact zeros and sign changes.
    for i in 0..xs.len() - 1 {
        let (v0, v1) = (vals[i], vals[i + 1]);
        if !v0.is_finite() || !v1.is_finite() {
            continue;
        }
        if v0 == 0.0 {
            out.push((xs[i], 0.0));
        }
        if (v0 < 0.0 && v1 > 0.0) || (v0 > 0.0 && v1 < 0.0) {
            let root = bisect(f, xs[i], xs[i + 1], v0, opts.refine_iters);
            out.push((root, f(root)));
        }
    }
    if let (Some(&x), Some(&v)) = (xs.last(), vals.last()) {
        if v == 0.0 {
            out.push((x, 0.0));
        }
    }

    // Tangential roots: interior minima of |f| with no adjacent sign change.
    for i in 1..xs.len() - 1 {
        let (vm, v, vp) = (vals[i - 1], vals[i], vals[i + 1]);
        if !vm.is_finite() || !v.is_finite() || !vp.is_finite() || v == 0.0 {
            continue;
        }
        if vm * v > 0.0 && v * vp > 0.0 && v.abs() <= vm.abs() && v.abs() <= vp.abs() {
            let x = golden_min(
                &|x| {
                    let y = f(x);
                    y * y
                },
                xs[i - 1],
                xs[i + 1],
                opts.refine_iters,
            );
            out.push((x, f(x)));
        }
    }

    if opts.trace {
        for (x, r) in &out {
            log::debug!("scalar minimizer at {x} with residual {r}");
        }
    }
    out
}

/// All minimizers of the squared residual `h(x, y)` over the sampled mesh,
/// as `(x, y, sqrt(h))` triples.
pub(crate) fn plane_minimizers(
    h: &dyn Fn(f64, f64) -> f64,
    x_samples: &[f64],
    y_samples: &[f64],
    opts: &OptimizerOptions,
) -> Vec<(f64, f64, f64)> {
    if x_samples.len() < 2 || y_samples.len() < 2 {
        return Vec::new();
    }
    let xs = refine_axis(x_samples, opts.subdivisions);
    let ys = refine_axis(y_samples, opts.subdivisions);
    let nx = xs.len();
    let ny = ys.len();
    let mut vals = vec![0.0; nx * ny];
    for (iy, &y) in ys.iter().enumerate() {
        for (ix, &x) in xs.iter().enumerate() {
            vals[ix + iy * nx] = h(x, y);
        }
    }

    let bounds = (
        x_samples[0],
        *x_samples.last().unwrap(),
        y_samples[0],
        *y_samples.last().unwrap(),
    );
    let mut out: Vec<(f64, f64, f64)> = Vec::new();
    for iy in 0..ny {
        for ix in 0..nx {
            let v = vals[ix + iy * nx];
            if !v.is_finite() {
                continue;
            }
            let mut is_min = true;
            let mut check = |n: f64| {
                if n.is_finite() && n < v {
                    is_min = false;
                }
            };
            if ix > 0 {
                check(vals[ix - 1 + iy * nx]);
            }
            if ix + 1 < nx {
                check(vals[ix + 1 + iy * nx]);
            }
            if iy > 0 {
                check(vals[ix + (iy - 1) * nx]);
            }
            if iy + 1 < ny {
                check(vals[ix + (iy + 1) * nx]);
            }
            if !is_min {
                continue;
            }

            let sx = cell_width(&xs, ix);
            let sy = cell_width(&ys, iy);
            let (px, py) = nelder_mead(h, (xs[ix], ys[iy]), (sx, sy), bounds, opts.refine_iters);
            let hv = h(px, py);
            if hv.is_finite() {
                out.push((px, py, hv.max(0.0).sqrt()));
            }
        }
    }

    if opts.trace {
        for (x, y, r) in &out {
            log::debug!("plane minimizer at ({x}, {y}) with residual {r}");
        }
    }
    out
}

fn cell_width(axis: &[f64], i: usize) -> f64 {
    if i + 1 < axis.len() {
        axis[i + 1] - axis[i]
    } else {
        axis[i] - axis[i - 1]
    }
}

fn bisect(f: &dyn Fn(f64) -> f64, mut lo: f64, mut hi: f64, mut f_lo: f64, iters: usize) -> f64 {
    for _ in 0..iters {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || !f_mid.is_finite() {
            return mid;
        }
        if (f_mid < 0.0) == (f_lo < 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
        if (hi - lo).abs() <= f64::EPSILON * (1.0 + lo.abs().max(hi.abs())) {
            break;
        }
    }
    0.5 * (lo + hi)
}

fn golden_min(g: &dyn Fn(f64) -> f64, mut a: f64, mut b: f64, iters: usize) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_894_8;
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut gc = g(c);
    let mut gd = g(d);
    for _ in 0..iters {
        if (b - a).abs() <= f64::EPSILON * (1.0 + a.abs().max(b.abs())) {
            break;
        }
        if gc < gd {
            b = d;
            d = c;
            gd = gc;
            c = b - INV_PHI * (b - a);
            gc = g(c);
        } else {
            a = c;
            c = d;
            gc = gd;
            d = a + INV_PHI * (b - a);
            gd = g(d);
        }
    }
    0.5 * (a + b)
}

/// Bounded Nelder-Mead on `h`, started from a vertex with a simplex sized
/// to the local grid cell. Points are projected back into the domain
/// rectangle after every move; non-finite values order as +inf so the
/// simplex walks away from undefined regions.
fn nelder_mead(
    h: &dyn Fn(f64, f64) -> f64,
    start: (f64, f64),
    scale: (f64, f64),
    bounds: (f64, f64, f64, f64),
    iters: usize,
) -> (f64, f64) {
    let (x_min, x_max, y_min, y_max) = bounds;
    let clamp = |p: (f64, f64)| (p.0.clamp(x_min, x_max), p.1.clamp(y_min, y_max));
    let eval = |p: (f64, f64)| {
        let v = h(p.0, p.1);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let p0 = clamp(start);
    let mut p1 = (start.0 + scale.0, start.1);
    if p1.0 > x_max {
        p1.0 = start.0 - scale.0;
    }
    let mut p2 = (start.0, start.1 + scale.1);
    if p2.1 > y_max {
        p2.1 = start.1 - scale.1;
    }
    let mut pts = [p0, clamp(p1), clamp(p2)];
    let mut vals = [eval(pts[0]), eval(pts[1]), eval(pts[2])];

    for _ in 0..iters {
        // Order: best, middle, worst.
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| vals[a].partial_cmp(&vals[b]).expect("finite ordering"));
        let (best, mid, worst) = (order[0], order[1], order[2]);

        let spread = (vals[worst] - vals[best]).abs();
        if spread <= f64::EPSILON * (1.0 + vals[best].abs()) {
            break;
        }

        let centroid = (
            0.5 * (pts[best].0 + pts[mid].0),
            0.5 * (pts[best].1 + pts[mid].1),
        );
        let reflected = clamp((
            centroid.0 + (centroid.0 - pts[worst].0),
            centroid.1 + (centroid.1 - pts[worst].1),
        ));
        let v_ref = eval(reflected);

        if v_ref < vals[best] {
            let expanded = clamp((
                centroid.0 + 2.0 * (centroid.0 - pts[worst].0),
                centroid.1 + 2.0 * (centroid.1 - pts[worst].1),
            ));
            let v_exp = eval(expanded);
            if v_exp < v_ref {
                pts[worst] = expanded;
                vals[worst] = v_exp;
            } else {
                pts[worst] = reflected;
                vals[worst] = v_ref;
            }
        } else if v_ref < vals[mid] {
            pts[worst] = reflected;
            vals[worst] = v_ref;
        } else {
            let contracted = clamp((
                centroid.0 + 0.5 * (pts[worst].0 - centroid.0),
                centroid.1 + 0.5 * (pts[worst].1 - centroid.1),
            ));
            let v_con = eval(contracted);
            if v_con < vals[worst] {
                pts[worst] = contracted;
                vals[worst] = v_con;
            } else {
                // Shrink toward the best vertex.
                for i in [mid, worst] {
                    pts[i] = clamp((
                        pts[best].0 + 0.5 * (pts[i].0 - pts[best].0),
                        pts[best].1 + 0.5 * (pts[i].1 - pts[best].1),
                    ));
                    vals[i] = eval(pts[i]);
                }
            }
        }
    }

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| vals[a].partial_cmp(&vals[b]).expect("finite ordering"));
    pts[order[0]]
}
