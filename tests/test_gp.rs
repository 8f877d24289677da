use spindown_fitting::error::FitError;
use spindown_fitting::gp::{GpFitOptions, GpModel};

fn smooth_signal(n: usize) -> (Vec<f64>, Vec<f64>) {
    let times: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
    let values: Vec<f64> = times.iter().map(|&t| (4.0 * t).sin() + 0.5 * t).collect();
    (times, values)
}

// ---------------------------------------------------------------------------
// GpModel::fit
// ---------------------------------------------------------------------------

#[test]
fn fit_interpolates_smooth_curve() {
    let (times, values) = smooth_signal(30);
    let model = GpModel::fit(&times, &values, &GpFitOptions::default())
        .expect("fit should succeed on smooth data");

    let (mean, _) = model.predict(&times);
    let mut max_residual = 0.0f64;
    for (m, v) in mean.iter().zip(&values) {
        max_residual = max_residual.max((m - v).abs());
    }
    assert!(
        max_residual < 0.5,
        "posterior mean should track the data, max residual = {max_residual}"
    );
}

#[test]
fn fit_improves_on_initial_hyperparameters() {
    let (times, values) = smooth_signal(25);
    let opts = GpFitOptions::default();
    let model = GpModel::fit(&times, &values, &opts).expect("fit should succeed");
    let frozen = GpModel::fit(
        &times,
        &values,
        &GpFitOptions {
            max_opt_iters: 0,
            ..opts
        },
    )
    .expect("assembling at the initial hyperparameters should succeed");

    assert!(
        model.log_marginal_likelihood() >= frozen.log_marginal_likelihood() - 1e-6,
        "optimization must not make the likelihood worse: {} vs {}",
        model.log_marginal_likelihood(),
        frozen.log_marginal_likelihood()
    );
}

#[test]
fn fit_rejects_mismatched_shapes() {
    let err = GpModel::fit(&[0.0, 0.5, 1.0], &[1.0, 2.0], &GpFitOptions::default()).unwrap_err();
    assert!(
        matches!(err, FitError::ShapeMismatch { left: 3, right: 2 }),
        "unexpected error: {err:?}"
    );
}

#[test]
fn fit_rejects_too_few_distinct_times() {
    // Four samples, only two distinct epochs.
    let err = GpModel::fit(
        &[0.0, 0.0, 1.0, 1.0],
        &[1.0, 1.0, 2.0, 2.0],
        &GpFitOptions::default(),
    )
    .unwrap_err();
    assert!(
        matches!(err, FitError::InsufficientSamples { needed: 3, got: 2 }),
        "unexpected error: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// GpModel::predict
// ---------------------------------------------------------------------------

#[test]
fn predict_variance_is_nonnegative_and_finite() {
    let (times, values) = smooth_signal(20);
    let model = GpModel::fit(&times, &values, &GpFitOptions::default()).expect("fit should succeed");

    let query: Vec<f64> = (0..50).map(|i| -0.2 + i as f64 * 0.03).collect();
    let (mean, variance) = model.predict(&query);
    assert_eq!(mean.len(), query.len());
    assert_eq!(variance.len(), query.len());
    for (i, &v) in variance.iter().enumerate() {
        assert!(v.is_finite() && v >= 0.0, "bad variance at {i}: {v}");
        assert!(mean[i].is_finite(), "non-finite mean at {i}");
    }
}

#[test]
fn predict_variance_grows_away_from_data() {
    let (times, values) = smooth_signal(20);
    let model = GpModel::fit(&times, &values, &GpFitOptions::default()).expect("fit should succeed");

    let (_, var_inside) = model.predict(&[0.5]);
    let (_, var_far) = model.predict(&[10.0]);
    assert!(
        var_far[0] > var_inside[0],
        "variance far from data ({}) should exceed variance inside ({})",
        var_far[0],
        var_inside[0]
    );
}

#[test]
fn fit_is_deterministic() {
    let (times, values) = smooth_signal(20);
    let a = GpModel::fit(&times, &values, &GpFitOptions::default()).expect("fit should succeed");
    let b = GpModel::fit(&times, &values, &GpFitOptions::default()).expect("fit should succeed");

    assert_eq!(a.hyperparameters(), b.hyperparameters());
    let (mean_a, var_a) = a.predict(&[0.25, 0.75]);
    let (mean_b, var_b) = b.predict(&[0.25, 0.75]);
    assert_eq!(mean_a, mean_b);
    assert_eq!(var_a, var_b);
}

#[test]
fn log_marginal_likelihood_is_finite_after_fit() {
    let (times, values) = smooth_signal(15);
    let model = GpModel::fit(&times, &values, &GpFitOptions::default()).expect("fit should succeed");
    assert!(
        model.log_marginal_likelihood().is_finite(),
        "likelihood at the optimum must be finite, got {}",
        model.log_marginal_likelihood()
    );
}

#[test]
fn hyperparameters_are_positive() {
    let (times, values) = smooth_signal(20);
    let model = GpModel::fit(&times, &values, &GpFitOptions::default()).expect("fit should succeed");
    let p = model.hyperparameters();
    assert!(p.signal_variance > 0.0);
    assert!(p.length_scale > 0.0);
    assert!(p.noise_variance > 0.0);
}
