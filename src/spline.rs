use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::common::{SampleSeries, MIN_INTERPOLATION_POINTS};
use crate::error::{FitError, FitResult};

/// Interpolant used for derivative extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Order-2 B-spline through all points. Derivatives of order >= 3 are
    /// identically zero by construction.
    #[default]
    QuadraticSpline,
    /// Single polynomial through all points. Degraded-accuracy path:
    /// numerically unstable above ~20 points, kept only as a fallback for
    /// short series that need a nonzero third derivative.
    Lagrange,
}

// ---------------------------------------------------------------------------
// Quadratic B-spline interpolant
// ---------------------------------------------------------------------------

/// Order-2 B-spline interpolant over strictly increasing sample times.
///
/// Knots are clamped at the end points with interior knots at the data-site
/// midpoints, so the collocation system satisfies the Schoenberg-Whitney
/// conditions and the spline passes exactly through every sample.
#[derive(Debug, Clone)]
pub struct QuadraticSpline {
    knots: Vec<f64>,
    coeffs: Vec<f64>,
}

impl QuadraticSpline {
    pub fn interpolate(series: &SampleSeries) -> FitResult<Self> {
        let x = series.times();
        let y = series.values();
        let n = x.len();
        if n < MIN_INTERPOLATION_POINTS {
            return Err(FitError::InsufficientSamples {
                needed: MIN_INTERPOLATION_POINTS,
                got: n,
            });
        }

        // Clamped knot vector of length n + 3.
        let mut knots = Vec::with_capacity(n + 3);
        knots.extend([x[0]; 3]);
        for i in 1..(n - 2) {
            knots.push((x[i] + x[i + 1]) / 2.0);
        }
        knots.extend([x[n - 1]; 3]);

        // Collocation: B_{i,2}(x_j) c_i = y_j.
        let mut collocation = DMatrix::zeros(n, n);
        for (j, &xj) in x.iter().enumerate() {
            let span = find_span(&knots, 2, n, xj);
            let basis = basis_values(&knots, span, 2, xj);
            for (r, &b) in basis.iter().enumerate() {
                collocation[(j, span - 2 + r)] = b;
            }
        }

        let rhs = DVector::from_column_slice(y);
        let coeffs = collocation.lu().solve(&rhs).ok_or_else(|| {
            FitError::NumericalInstability("quadratic spline collocation matrix is singular".into())
        })?;

        Ok(Self {
            knots,
            coeffs: coeffs.iter().copied().collect(),
        })
    }

    /// Evaluates the `order`-th derivative at `x` (order 0 is the spline
    /// itself). For an order-2 spline every derivative of order >= 3 is
    /// identically zero; callers expecting a nonzero third derivative must
    /// use [`InterpolationMethod::Lagrange`].
    pub fn evaluate(&self, x: f64, order: usize) -> f64 {
        if order > 2 {
            return 0.0;
        }

        let mut knots = self.knots.clone();
        let mut coeffs = self.coeffs.clone();
        let mut degree = 2usize;
        for _ in 0..order {
            let (next_knots, next_coeffs) = derivative_stage(&knots, &coeffs, degree);
            knots = next_knots;
            coeffs = next_coeffs;
            degree -= 1;
        }
        de_boor(&knots, &coeffs, degree, x)
    }
}

/// Knot span index `s` with `knots[s] <= x < knots[s + 1]`, clamped into the
/// spline's domain so end-point evaluation lands in the last real interval.
fn find_span(knots: &[f64], degree: usize, n_coeffs: usize, x: f64) -> usize {
    if x >= knots[n_coeffs] {
        return n_coeffs - 1;
    }
    if x <= knots[degree] {
        return degree;
    }
    let mut lo = degree;
    let mut hi = n_coeffs;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if x < knots[mid] {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    lo
}

/// The `degree + 1` nonzero basis functions at `x` within `span`
/// (Cox-de Boor, in the arrangement of the NURBS-book "BasisFuns").
fn basis_values(knots: &[f64], span: usize, degree: usize, x: f64) -> Vec<f64> {
    let mut values = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    values[0] = 1.0;

    for j in 1..=degree {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let term = if denom == 0.0 { 0.0 } else { values[r] / denom };
            values[r] = saved + right[r + 1] * term;
            saved = left[j - r] * term;
        }
        values[j] = saved;
    }
    values
}

/// One differentiation step: a degree-`degree` spline becomes a
/// degree-`degree - 1` spline over the knot vector with its first and last
/// knot dropped.
fn derivative_stage(knots: &[f64], coeffs: &[f64], degree: usize) -> (Vec<f64>, Vec<f64>) {
    let k = degree as f64;
    let mut derived = Vec::with_capacity(coeffs.len() - 1);
    for i in 0..coeffs.len() - 1 {
        let denom = knots[i + degree + 1] - knots[i + 1];
        let value = if denom == 0.0 {
            0.0
        } else {
            k * (coeffs[i + 1] - coeffs[i]) / denom
        };
        derived.push(value);
    }
    (knots[1..knots.len() - 1].to_vec(), derived)
}

/// De Boor's algorithm for a spline of the given degree.
fn de_boor(knots: &[f64], coeffs: &[f64], degree: usize, x: f64) -> f64 {
    let span = find_span(knots, degree, coeffs.len(), x);
    let mut d: Vec<f64> = (0..=degree).map(|j| coeffs[span + j - degree]).collect();
    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let i = span + j - degree;
            let denom = knots[i + degree + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (x - knots[i]) / denom };
            d[j] = (1.0 - alpha) * d[j - 1] + alpha * d[j];
        }
    }
    d[degree]
}

// ---------------------------------------------------------------------------
// Lagrange fallback
// ---------------------------------------------------------------------------

/// Single interpolating polynomial in the monomial basis, built from Newton
/// divided differences.
#[derive(Debug, Clone)]
pub struct LagrangePolynomial {
    coeffs: Vec<f64>,
}

impl LagrangePolynomial {
    pub fn interpolate(series: &SampleSeries) -> FitResult<Self> {
        let x = series.times();
        let y = series.values();
        let n = x.len();
        if n < MIN_INTERPOLATION_POINTS {
            return Err(FitError::InsufficientSamples {
                needed: MIN_INTERPOLATION_POINTS,
                got: n,
            });
        }

        // Divided differences in place: dd[i] ends up as f[x_0 .. x_i].
        let mut dd = y.to_vec();
        for level in 1..n {
            for i in (level..n).rev() {
                dd[i] = (dd[i] - dd[i - 1]) / (x[i] - x[i - level]);
            }
        }

        // Expand the Newton form into monomial coefficients (ascending).
        let mut coeffs = vec![0.0; n];
        let mut basis = vec![0.0; n];
        basis[0] = 1.0;
        let mut basis_len = 1;
        for (i, &dd_i) in dd.iter().enumerate() {
            for j in 0..basis_len {
                coeffs[j] += dd_i * basis[j];
            }
            if i + 1 < n {
                let mut next = vec![0.0; basis_len + 1];
                for j in 0..basis_len {
                    next[j + 1] += basis[j];
                    next[j] -= x[i] * basis[j];
                }
                basis[..=basis_len].copy_from_slice(&next);
                basis_len += 1;
            }
        }

        Ok(Self { coeffs })
    }

    /// Evaluates the `order`-th derivative at `x` via analytic coefficient
    /// shift-down and Horner's rule.
    pub fn evaluate(&self, x: f64, order: usize) -> f64 {
        if order >= self.coeffs.len() {
            return 0.0;
        }
        let derived: Vec<f64> = self.coeffs[order..]
            .iter()
            .enumerate()
            .map(|(m, &c)| {
                let mut factor = 1.0;
                for q in (m + 1)..=(m + order) {
                    factor *= q as f64;
                }
                c * factor
            })
            .collect();
        derived.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }
}

// ---------------------------------------------------------------------------
// Derivative extraction
// ---------------------------------------------------------------------------

/// Uniform evaluation grid with the interpolant's first three derivatives.
///
/// When the input times are in days the derivatives are per day, per day^2
/// and per day^3; conversion to per-second units is the caller's
/// responsibility, applied once, after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativeGrid {
    pub times: Vec<f64>,
    pub first: Vec<f64>,
    pub second: Vec<f64>,
    pub third: Vec<f64>,
}

impl DerivativeGrid {
    /// Fits the chosen interpolant through all samples exactly and evaluates
    /// its 1st/2nd/3rd derivatives at `n` uniformly spaced times spanning the
    /// input's time range.
    pub fn extract(
        series: &SampleSeries,
        n: usize,
        method: InterpolationMethod,
    ) -> FitResult<Self> {
        if n < 2 {
            return Err(FitError::InvalidGridSize(n));
        }
        if series.len() < MIN_INTERPOLATION_POINTS {
            return Err(FitError::InsufficientSamples {
                needed: MIN_INTERPOLATION_POINTS,
                got: series.len(),
            });
        }

        let t_start = series.times()[0];
        let t_end = series.times()[series.len() - 1];
        let step = (t_end - t_start) / (n - 1) as f64;
        let times: Vec<f64> = (0..n).map(|i| t_start + i as f64 * step).collect();

        let evaluate: Box<dyn Fn(f64, usize) -> f64> = match method {
            InterpolationMethod::QuadraticSpline => {
                let spline = QuadraticSpline::interpolate(series)?;
                Box::new(move |t, order| spline.evaluate(t, order))
            }
            InterpolationMethod::Lagrange => {
                let poly = LagrangePolynomial::interpolate(series)?;
                Box::new(move |t, order| poly.evaluate(t, order))
            }
        };

        let first = times.iter().map(|&t| evaluate(t, 1)).collect();
        let second = times.iter().map(|&t| evaluate(t, 2)).collect();
        let third = times.iter().map(|&t| evaluate(t, 3)).collect();

        Ok(Self {
            times,
            first,
            second,
            third,
        })
    }
}
