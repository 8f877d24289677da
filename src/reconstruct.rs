use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};
use crate::gp::GpModel;

/// Posterior reconstruction of one derivative series: the GP mean shifted by
/// an additive baseline, with a one-sigma band on either side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructedSeries {
    pub times: Vec<f64>,
    pub mean: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Evaluates the trained model at `times` and offsets the posterior mean by
/// `baseline`. The band half-width is the posterior standard deviation, so
/// `upper` and `lower` sit symmetrically about `mean`.
pub fn reconstruct(model: &GpModel, times: &[f64], baseline: f64) -> FitResult<ReconstructedSeries> {
    let (mu, var) = model.predict(times);
    if mu.iter().any(|m| !m.is_finite()) || var.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NumericalInstability(
            "posterior prediction produced non-finite values".into(),
        ));
    }

    let mean: Vec<f64> = mu.iter().map(|m| baseline + m).collect();
    let sigma: Vec<f64> = var.iter().map(|v| v.sqrt()).collect();
    let upper = mean.iter().zip(&sigma).map(|(m, s)| m + s).collect();
    let lower = mean.iter().zip(&sigma).map(|(m, s)| m - s).collect();

    Ok(ReconstructedSeries {
        times: times.to_vec(),
        mean,
        upper,
        lower,
    })
}
