use crate::error::{FitError, FitResult};

/// Seconds in one day; converts per-day derivative units to per-second.
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Minimum sample count accepted by the order-2 interpolants downstream.
pub const MIN_INTERPOLATION_POINTS: usize = 3;

// ---------------------------------------------------------------------------
// Sample conditioning
// ---------------------------------------------------------------------------

/// Time-ordered, duplicate-free (time, value) samples.
///
/// Times are strictly increasing once constructed; the series is immutable
/// thereafter.
#[derive(Debug, Clone)]
pub struct SampleSeries {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl SampleSeries {
    /// Sorts raw samples by time and collapses duplicate timestamps.
    ///
    /// The sort is stable, so among samples sharing a timestamp the one that
    /// appeared first in the input is the one kept. The interpolants
    /// downstream require single-valued time points.
    pub fn from_raw(times: &[f64], values: &[f64], min_points: usize) -> FitResult<Self> {
        if times.len() != values.len() {
            return Err(FitError::ShapeMismatch {
                left: times.len(),
                right: values.len(),
            });
        }

        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let mut unique_times = Vec::with_capacity(times.len());
        let mut unique_values = Vec::with_capacity(times.len());
        for &i in &order {
            let is_new = match unique_times.last() {
                Some(&last) => times[i] > last,
                None => true,
            };
            if is_new {
                unique_times.push(times[i]);
                unique_values.push(values[i]);
            }
        }

        if unique_times.len() < min_points {
            return Err(FitError::InsufficientSamples {
                needed: min_points,
                got: unique_times.len(),
            });
        }

        Ok(Self {
            times: unique_times,
            values: unique_values,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// Time normalization
// ---------------------------------------------------------------------------

/// A time axis rescaled to origin 0 and span 1, with the inverse mapping
/// retained as `(t_ref, t_scale)`.
#[derive(Debug, Clone)]
pub struct NormalizedTime {
    times: Vec<f64>,
    t_ref: f64,
    t_scale: f64,
}

impl NormalizedTime {
    /// Maps `t -> (t - min(t)) / (max(t) - min(t))`.
    pub fn from_times(times: &[f64]) -> FitResult<Self> {
        let t_min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let t_max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let t_scale = t_max - t_min;
        if !(t_scale > 0.0) {
            return Err(FitError::DegenerateTimeSpan);
        }

        let normalized = times.iter().map(|&t| (t - t_min) / t_scale).collect();
        Ok(Self {
            times: normalized,
            t_ref: t_min,
            t_scale,
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn t_ref(&self) -> f64 {
        self.t_ref
    }

    pub fn t_scale(&self) -> f64 {
        self.t_scale
    }

    /// Inverts the normalization: `t = t_norm * t_scale + t_ref`.
    pub fn denormalize(&self, t_norm: f64) -> f64 {
        t_norm * self.t_scale + self.t_ref
    }
}

// ---------------------------------------------------------------------------
// Math utilities
// ---------------------------------------------------------------------------

/// Braking index `n = f * d2f / df^2`, elementwise.
///
/// Entries where `df` is zero come back as NaN; the rest of the series is
/// still computed.
pub fn braking_index(f: &[f64], df: &[f64], d2f: &[f64]) -> FitResult<Vec<f64>> {
    if f.len() != df.len() {
        return Err(FitError::ShapeMismatch {
            left: f.len(),
            right: df.len(),
        });
    }
    if f.len() != d2f.len() {
        return Err(FitError::ShapeMismatch {
            left: f.len(),
            right: d2f.len(),
        });
    }

    Ok(f.iter()
        .zip(df.iter())
        .zip(d2f.iter())
        .map(|((&fi, &dfi), &d2fi)| {
            if dfi != 0.0 {
                fi * d2fi / (dfi * dfi)
            } else {
                f64::NAN
            }
        })
        .collect())
}
