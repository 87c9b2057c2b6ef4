//! Constrained least-squares cubic fit used by [`Spotter`](super::spotter::Spotter).
//!
//! Fits `a*x^3 + b*x^2 + c*x + d` to `(xs, ys)` by least squares, subject to
//! the curve being strictly increasing everywhere (`3a > 0` and the
//! derivative's discriminant `(2b)^2 - 4(3a)c < 0`) and `d >= 0`. There is no
//! off-the-shelf constrained NLS solver in the crate's dependency stack for
//! a problem this small, so this is a hand-rolled projected gradient
//! descent: an unconstrained gradient step followed by reprojection onto the
//! feasible set, with backtracking to guarantee monotone descent.

/// `a*x^3 + b*x^2 + c*x + d`.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Cubic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Cubic {
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        ((self.a * x + self.b) * x + self.c) * x + self.d
    }
}

/// A cubic fit on data that was first rescaled to the unit square.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ScaledCubic {
    pub cubic: Cubic,
    xmin: f64,
    ymin: f64,
    rxrang: f64,
    yrang: f64,
}

impl ScaledCubic {
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        let xs = (x - self.xmin) * self.rxrang;
        self.cubic.eval(xs) * self.yrang + self.ymin
    }
}

const EPS_A: f64 = 1e-6;
const EPS_DISCRIMINANT: f64 = 1e-9;

/// Project `c` onto the feasible set: `a >= EPS_A/3`, `c > b^2/(3a) + eps`,
/// `d >= 0`.
fn project(mut c: Cubic) -> Cubic {
    if c.a < EPS_A / 3.0 {
        c.a = EPS_A / 3.0;
    }
    let floor_c = (c.b * c.b) / (3.0 * c.a) + EPS_DISCRIMINANT;
    if c.c <= floor_c {
        c.c = floor_c;
    }
    if c.d < 0.0 {
        c.d = 0.0;
    }
    c
}

fn sse(c: &Cubic, xs: &[f64], ys: &[f64]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = c.eval(x) - y;
            r * r
        })
        .sum()
}

fn gradient(c: &Cubic, xs: &[f64], ys: &[f64]) -> Cubic {
    let mut g = Cubic::default();
    for (&x, &y) in xs.iter().zip(ys) {
        let r = c.eval(x) - y;
        g.a += 2.0 * r * x.powi(3);
        g.b += 2.0 * r * x.powi(2);
        g.c += 2.0 * r * x;
        g.d += 2.0 * r;
    }
    g
}

/// Fit a constrained cubic to `(xs, ys)`, both already scaled to roughly
/// `[0, 1]`. Returns the fit and whether it converged (gradient norm below
/// tolerance within the iteration budget).
#[must_use]
pub fn fit_cubic_constrained(xs: &[f64], ys: &[f64]) -> (Cubic, bool) {
    let mut coef = project(Cubic {
        a: 0.0,
        b: 0.0,
        c: 1.0,
        d: 0.0,
    });
    let mut step = 1e-2;
    let mut converged = false;

    for _ in 0..2000 {
        let g = gradient(&coef, xs, ys);
        let gnorm = (g.a * g.a + g.b * g.b + g.c * g.c + g.d * g.d).sqrt();
        if gnorm < 1e-10 {
            converged = true;
            break;
        }

        let current = sse(&coef, xs, ys);
        let mut accepted = false;
        let mut trial_step = step;
        for _ in 0..40 {
            let candidate = project(Cubic {
                a: coef.a - trial_step * g.a,
                b: coef.b - trial_step * g.b,
                c: coef.c - trial_step * g.c,
                d: coef.d - trial_step * g.d,
            });
            let candidate_sse = sse(&candidate, xs, ys);
            if candidate_sse < current {
                coef = candidate;
                step = trial_step * 1.2;
                accepted = true;
                break;
            }
            trial_step *= 0.5;
        }
        if !accepted {
            converged = step < 1e-12;
            break;
        }
    }

    (coef, converged)
}

/// Scale `(xs, ys)` to the unit square, fit the constrained cubic, and wrap
/// the result with the scaling needed to evaluate it at original-scale `x`.
#[must_use]
pub fn fit_cubic_constrained_scaled(xs: &[f64], ys: &[f64]) -> (ScaledCubic, bool) {
    let xmin = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let xmax = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ymin = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let ymax = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let xrang = (xmax - xmin).max(1e-12);
    let yrang = (ymax - ymin).max(1e-12);
    let rxrang = 1.0 / xrang;
    let ryrang = 1.0 / yrang;

    let xss: Vec<f64> = xs.iter().map(|&x| (x - xmin) * rxrang).collect();
    let yss: Vec<f64> = ys.iter().map(|&y| (y - ymin) * ryrang).collect();

    let (cubic, converged) = fit_cubic_constrained(&xss, &yss);
    (
        ScaledCubic {
            cubic,
            xmin,
            ymin,
            rxrang,
            yrang,
        },
        converged,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_a_line_closely() {
        let xs: Vec<f64> = (0..50).map(|i| i as f64 / 49.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| x).collect();
        let (cubic, _) = fit_cubic_constrained(&xs, &ys);
        for &x in &xs {
            assert!((cubic.eval(x) - x).abs() < 0.05);
        }
    }

    #[test]
    fn stays_monotone_increasing() {
        let xs: Vec<f64> = (0..50).map(|i| i as f64 / 49.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| x * x).collect();
        let (cubic, _) = fit_cubic_constrained(&xs, &ys);
        let mut prev = cubic.eval(0.0);
        for i in 1..=100 {
            let x = i as f64 / 100.0;
            let v = cubic.eval(x);
            assert!(v >= prev - 1e-9);
            prev = v;
        }
    }
}
