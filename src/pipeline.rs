use serde::{Deserialize, Serialize};

use crate::common::{braking_index, NormalizedTime, SampleSeries, MIN_INTERPOLATION_POINTS, SECONDS_PER_DAY};
use crate::error::{FitError, FitResult};
use crate::gp::{GpFitOptions, GpModel};
use crate::reconstruct::{reconstruct, ReconstructedSeries};
use crate::spline::{DerivativeGrid, InterpolationMethod};

/// End-to-end fit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpindownOptions {
    /// Interpolant used for the derivative stage.
    pub method: InterpolationMethod,
    /// Number of uniform evaluation points for the derivative stage. Must
    /// equal the deduplicated series length so the derivative samples line up
    /// one-to-one with the observation times; `None` uses that length.
    pub grid_size: Option<usize>,
    /// Kernel optimization settings shared by the three regressions.
    pub gp: GpFitOptions,
}

/// The three trained regressors, retained so callers can predict at times
/// not present in the fit.
#[derive(Debug, Clone)]
pub struct SpindownModels {
    pub frequency: GpModel,
    pub first_derivative: GpModel,
    pub second_derivative: GpModel,
}

/// Full result of a spindown fit: reconstructed frequency evolution with
/// one-sigma bands, the time mapping, and the trained models.
#[derive(Debug, Clone)]
pub struct SpindownFit {
    pub frequency: ReconstructedSeries,
    pub first_derivative: ReconstructedSeries,
    pub second_derivative: ReconstructedSeries,
    pub t_ref: f64,
    pub t_scale: f64,
    pub models: SpindownModels,
}

impl SpindownFit {
    /// Maps a normalized time back to the input time scale (days).
    pub fn denormalize(&self, t_norm: f64) -> f64 {
        t_norm * self.t_scale + self.t_ref
    }

    /// Braking index `n = f * f'' / f'^2` along the reconstructed means,
    /// `NaN` wherever the first derivative vanishes.
    pub fn braking_index(&self) -> FitResult<Vec<f64>> {
        braking_index(
            &self.frequency.mean,
            &self.first_derivative.mean,
            &self.second_derivative.mean,
        )
    }
}

/// Fits the full spindown pipeline to timing residuals.
///
/// `times` are observation epochs in days and `residuals` the timing (phase)
/// residuals at those epochs, so the interpolant's first three derivatives
/// are the frequency residual and its first two derivatives; `base_frequency`
/// (Hz) is added back to the reconstructed frequency mean only. Duplicated
/// epochs keep their first value,
/// times are normalized to `[0, 1]`, derivative samples are taken on a
/// uniform grid matching the series length and converted from per-day to
/// per-second units before regression.
pub fn fit_spindown(
    times: &[f64],
    residuals: &[f64],
    base_frequency: f64,
    opts: &SpindownOptions,
) -> FitResult<SpindownFit> {
    let series = SampleSeries::from_raw(times, residuals, MIN_INTERPOLATION_POINTS)?;
    let normalized = NormalizedTime::from_times(series.times())?;

    let grid_size = opts.grid_size.unwrap_or(series.len());
    if grid_size != series.len() {
        return Err(FitError::ShapeMismatch {
            left: grid_size,
            right: series.len(),
        });
    }

    // Differentiation happens over the raw day-valued axis so the extracted
    // derivatives come out per day; the GPs below regress those values over
    // the normalized axis, which only rescales the inputs, not the targets.
    let grid = DerivativeGrid::extract(&series, grid_size, opts.method)?;

    // The input times are days; frequency derivatives are reported per
    // second, per second^2 and per second^3.
    let per_sec: Vec<f64> = grid.first.iter().map(|v| v / SECONDS_PER_DAY).collect();
    let per_sec2: Vec<f64> = grid
        .second
        .iter()
        .map(|v| v / (SECONDS_PER_DAY * SECONDS_PER_DAY))
        .collect();
    let per_sec3: Vec<f64> = grid
        .third
        .iter()
        .map(|v| v / (SECONDS_PER_DAY * SECONDS_PER_DAY * SECONDS_PER_DAY))
        .collect();

    let x = normalized.times();
    let (freq_model, (fdot_model, f2dot_model)) = rayon::join(
        || GpModel::fit(x, &per_sec, &opts.gp),
        || {
            rayon::join(
                || GpModel::fit(x, &per_sec2, &opts.gp),
                || GpModel::fit(x, &per_sec3, &opts.gp),
            )
        },
    );
    let freq_model = freq_model?;
    let fdot_model = fdot_model?;
    let f2dot_model = f2dot_model?;

    let frequency = reconstruct(&freq_model, x, base_frequency)?;
    let first_derivative = reconstruct(&fdot_model, x, 0.0)?;
    let second_derivative = reconstruct(&f2dot_model, x, 0.0)?;

    Ok(SpindownFit {
        frequency,
        first_derivative,
        second_derivative,
        t_ref: normalized.t_ref(),
        t_scale: normalized.t_scale(),
        models: SpindownModels {
            frequency: freq_model,
            first_derivative: fdot_model,
            second_derivative: f2dot_model,
        },
    })
}
