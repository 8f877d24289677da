pub mod common;
pub mod error;
pub mod gp;
pub mod pipeline;
pub mod reconstruct;
pub mod spline;

pub use common::{braking_index, NormalizedTime, SampleSeries, SECONDS_PER_DAY};
pub use error::{FitError, FitResult};
pub use gp::{GpFitOptions, GpHyperparameters, GpModel};
pub use pipeline::{fit_spindown, SpindownFit, SpindownModels, SpindownOptions};
pub use reconstruct::{reconstruct, ReconstructedSeries};
pub use spline::{DerivativeGrid, InterpolationMethod, LagrangePolynomial, QuadraticSpline};
