//! # Risk Engine
//!
//! The single call contract of the crate: raw covariate columns plus a request in,
//! one probability per row out. A call either succeeds for the whole batch or fails
//! without a partial result; the only non-fatal condition is per-row missing data,
//! which is logged once and returned alongside the probabilities.

use log::{info, warn};
use ndarray::Array1;
use rayon::prelude::*;
use thiserror::Error;

use crate::coefficients::{CoefficientError, CoefficientRepository};
use crate::dispatch::{DispatchError, resolve};
use crate::inputs::bounds::BoundarySpec;
use crate::inputs::levels::LevelMapError;
use crate::inputs::prepare::{InputError, prepare};
use crate::inputs::{LevelMaps, MissingDataReport, RiskInputs, ValidationError};
use crate::link::LinearPredictor;
use crate::types::{DescriptorParseError, EquationDescriptor};

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] LevelMapError),
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorParseError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Coefficients(#[from] CoefficientError),
}

impl From<InputError> for RiskError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Configuration(e) => RiskError::Configuration(e),
            InputError::Validation(e) => RiskError::Validation(e),
        }
    }
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Widens every recommended range to (-inf, +inf).
    pub override_boundary_errors: bool,
    /// Scores a missing SDI as the first decile for female subjects under the PREVENT
    /// ASCVD equations instead of using the SDI missing-indicator.
    pub impute_missing_sdi_for_female_ascvd: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            override_boundary_errors: false,
            impute_missing_sdi_for_female_ascvd: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskRequest {
    pub descriptor: EquationDescriptor,
    pub levels: LevelMaps,
    pub options: EngineOptions,
}

impl RiskRequest {
    pub fn new(descriptor: EquationDescriptor) -> Self {
        Self {
            descriptor,
            levels: LevelMaps::default(),
            options: EngineOptions::default(),
        }
    }

    /// Builds a request from user-facing labels such as `"Khan_2023"`, `"hf"` and `"30"`.
    pub fn from_labels(
        pred_type: &str,
        equation_version: &str,
        horizon: &str,
        prevent_type: Option<&str>,
    ) -> Result<Self, RiskError> {
        let mut descriptor = EquationDescriptor::new(
            pred_type.parse()?,
            equation_version.parse()?,
            horizon.parse()?,
        );
        if let Some(label) = prevent_type {
            descriptor = descriptor.with_prevent_type(label.parse()?);
        }
        Ok(Self::new(descriptor))
    }

    pub fn with_levels(mut self, levels: LevelMaps) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RiskPrediction {
    /// One probability per input row, in input order. NaN where a required covariate
    /// is missing.
    pub risk: Array1<f64>,
    pub linear_predictor: LinearPredictor,
    pub missing: Option<MissingDataReport>,
}

/// Validates `inputs`, resolves the requested equation and evaluates every row.
pub fn predict_risk(
    inputs: &RiskInputs,
    request: &RiskRequest,
    repository: &CoefficientRepository,
) -> Result<RiskPrediction, RiskError> {
    let descriptor = &request.descriptor;
    let resolved = resolve(descriptor, inputs)?;
    let boundaries = BoundarySpec::new(
        descriptor.equation_version,
        request.options.override_boundary_errors,
    );
    let prepared = prepare(inputs, &resolved.uses, &request.levels, &boundaries)?;
    let plan = resolved.plan(
        repository,
        request.options.impute_missing_sdi_for_female_ascvd,
    )?;

    if let Some(report) = &prepared.missing {
        warn!("{report}");
    }
    info!("Evaluating {descriptor} for {} subjects", prepared.n_rows);

    let rows: Vec<(f64, f64)> = (0..prepared.n_rows)
        .into_par_iter()
        .map(|row| match plan.evaluate_row(&prepared, row) {
            Some((eta, link)) => (eta, link.apply(eta)),
            None => (f64::NAN, f64::NAN),
        })
        .collect();
    let (eta, risk): (Vec<f64>, Vec<f64>) = rows.into_iter().unzip();

    Ok(RiskPrediction {
        risk: Array1::from_vec(risk),
        linear_predictor: LinearPredictor::new(Array1::from_vec(eta)),
        missing: prepared.missing,
    })
}
