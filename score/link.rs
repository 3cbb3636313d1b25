use ndarray::{Array1, ArrayView1};
use std::ops::Deref;

/// Defines the link function, connecting the linear predictor to a probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkFunction {
    /// The logistic link: `1 / (1 + exp(-eta))`.
    Logit,
    /// Cox-type transform `1 - S0^exp(eta - mean)`, with `S0` the baseline survival
    /// at the horizon and `mean` the cohort mean of the linear predictor.
    BaselineSurvival { baseline_survival: f64, mean: f64 },
}

impl LinkFunction {
    #[inline]
    pub fn apply(self, eta: f64) -> f64 {
        match self {
            LinkFunction::Logit => 1.0 / (1.0 + (-eta).exp()),
            LinkFunction::BaselineSurvival {
                baseline_survival,
                mean,
            } => 1.0 - baseline_survival.powf((eta - mean).exp()),
        }
    }
}

/// Per-row linear predictors of one call. Rows with a missing required covariate are NaN.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct LinearPredictor(pub Array1<f64>);

impl LinearPredictor {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

impl Deref for LinearPredictor {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Array1<f64>> for LinearPredictor {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}
