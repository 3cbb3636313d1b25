//! # Equation Dispatch
//!
//! Decides, once per call, which equation family serves a descriptor, which
//! covariates it reads and how their missingness is treated, and then resolves every
//! coefficient table the call can touch into an `EquationPlan`. Row evaluation never
//! performs a fallible lookup.

use log::debug;
use thiserror::Error;

use crate::coefficients::{CoefficientError, CoefficientRepository};
use crate::inputs::prepare::{CovariateUse, PreparedCovariates, RiskInputs};
use crate::link::LinkFunction;
use crate::pooled_cohort::{PooledCohortEquation, RevisedPooledCohortEquation};
use crate::prevent::{ActiveBlocks, EndpointReads, PreventEquation};
use crate::types::{Covariate, EquationDescriptor, EquationVersion, Horizon, PredType, PreventType};

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error(
        "The following variables are required by the selected equation but were not supplied: {}",
        .names.join(", ")
    )]
    MissingRequiredVariable { names: Vec<&'static str> },
    #[error("{version} does not provide a {horizon} horizon.")]
    UnsupportedHorizon {
        version: EquationVersion,
        horizon: Horizon,
    },
    #[error("{version} does not predict the '{pred_type}' endpoint.")]
    UnsupportedEndpoint {
        version: EquationVersion,
        pred_type: PredType,
    },
}

/// The equation family that serves a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationFamily {
    PooledCohort,
    RevisedPooledCohort,
    Prevent {
        prevent_type: PreventType,
        blocks: ActiveBlocks,
    },
}

/// Covariates every family needs supplied.
const CORE: [Covariate; 8] = [
    Covariate::AgeYears,
    Covariate::Sex,
    Covariate::SmokeCurrent,
    Covariate::CholTotal,
    Covariate::CholHdl,
    Covariate::BpSys,
    Covariate::BpMeds,
    Covariate::Diabetes,
];

const POOLED_COHORT_EXTRA: [Covariate; 1] = [Covariate::Race];

const PREVENT_EXTRA: [Covariate; 3] = [Covariate::StatinMeds, Covariate::Egfr, Covariate::Bmi];

/// A descriptor checked against the supplied inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEquation {
    pub descriptor: EquationDescriptor,
    pub family: EquationFamily,
    /// Every covariate the equation reads, with how its missingness is handled.
    pub uses: Vec<(Covariate, CovariateUse)>,
}

/// Checks endpoint, horizon and variable presence. All absent variables are
/// reported together.
pub fn resolve(
    descriptor: &EquationDescriptor,
    inputs: &RiskInputs,
) -> Result<ResolvedEquation, DispatchError> {
    let version = descriptor.equation_version;
    let horizon = descriptor.horizon;

    let (family, supplied, read, optional): (
        EquationFamily,
        &[Covariate],
        Vec<Covariate>,
        Vec<Covariate>,
    ) = match version {
        EquationVersion::Goff2013 | EquationVersion::Yadlowsky2018 => {
            if descriptor.pred_type != PredType::Ascvd {
                return Err(DispatchError::UnsupportedEndpoint {
                    version,
                    pred_type: descriptor.pred_type,
                });
            }
            let supported = match version {
                EquationVersion::Goff2013 => {
                    matches!(horizon, Horizon::FiveYear | Horizon::TenYear)
                }
                _ => horizon == Horizon::TenYear,
            };
            if !supported {
                return Err(DispatchError::UnsupportedHorizon { version, horizon });
            }
            if descriptor.prevent_type.is_some() {
                debug!("Ignoring the PREVENT model type for {version}");
            }
            let family = if version == EquationVersion::Goff2013 {
                EquationFamily::PooledCohort
            } else {
                EquationFamily::RevisedPooledCohort
            };
            let read = CORE.iter().chain(POOLED_COHORT_EXTRA.iter()).copied().collect();
            (family, &POOLED_COHORT_EXTRA[..], read, Vec::new())
        }
        EquationVersion::Khan2023 => {
            if !matches!(horizon, Horizon::TenYear | Horizon::ThirtyYear) {
                return Err(DispatchError::UnsupportedHorizon { version, horizon });
            }
            let prevent_type = descriptor.prevent_type.unwrap_or_default();
            let blocks = ActiveBlocks::for_prevent_type(prevent_type);
            let optional = blocks.iter().map(|block| block.covariate()).collect();
            (
                EquationFamily::Prevent {
                    prevent_type,
                    blocks,
                },
                &PREVENT_EXTRA[..],
                EndpointReads::for_pred_type(descriptor.pred_type).covariates(),
                optional,
            )
        }
    };

    let names: Vec<&'static str> = CORE
        .iter()
        .chain(supplied.iter())
        .chain(optional.iter())
        .filter(|covariate| !inputs.is_supplied(**covariate))
        .map(|covariate| covariate.name())
        .collect();
    if !names.is_empty() {
        return Err(DispatchError::MissingRequiredVariable { names });
    }

    // Supplied covariates the endpoint never reads are not validated.
    let uses: Vec<(Covariate, CovariateUse)> = read
        .iter()
        .map(|&covariate| (covariate, CovariateUse::Required))
        .chain(
            optional
                .iter()
                .map(|&covariate| (covariate, CovariateUse::Optional)),
        )
        .collect();

    debug!(
        "Resolved {descriptor} to {family:?} reading {} covariates",
        uses.len()
    );
    Ok(ResolvedEquation {
        descriptor: *descriptor,
        family,
        uses,
    })
}

/// Every coefficient table of one call, resolved up front.
#[derive(Debug, Clone, Copy)]
pub enum EquationPlan<'a> {
    PooledCohort(PooledCohortEquation<'a>),
    RevisedPooledCohort(RevisedPooledCohortEquation<'a>),
    Prevent(PreventEquation<'a>),
}

impl ResolvedEquation {
    pub fn plan<'a>(
        &self,
        repository: &'a CoefficientRepository,
        impute_missing_sdi_for_female_ascvd: bool,
    ) -> Result<EquationPlan<'a>, CoefficientError> {
        let horizon = self.descriptor.horizon;
        let plan = match self.family {
            EquationFamily::PooledCohort => {
                EquationPlan::PooledCohort(PooledCohortEquation::resolve(repository, horizon)?)
            }
            EquationFamily::RevisedPooledCohort => EquationPlan::RevisedPooledCohort(
                RevisedPooledCohortEquation::resolve(repository, horizon)?,
            ),
            EquationFamily::Prevent { prevent_type, .. } => {
                EquationPlan::Prevent(PreventEquation::resolve(
                    repository,
                    self.descriptor.pred_type,
                    prevent_type,
                    horizon,
                    impute_missing_sdi_for_female_ascvd,
                )?)
            }
        };
        Ok(plan)
    }
}

impl EquationPlan<'_> {
    /// Linear predictor and link of one row, or `None` when a covariate whose
    /// missingness propagates is missing.
    pub fn evaluate_row(
        &self,
        covariates: &PreparedCovariates,
        row: usize,
    ) -> Option<(f64, LinkFunction)> {
        match self {
            EquationPlan::PooledCohort(equation) => equation.evaluate_row(covariates, row),
            EquationPlan::RevisedPooledCohort(equation) => equation.evaluate_row(covariates, row),
            EquationPlan::Prevent(equation) => equation.evaluate_row(covariates, row),
        }
    }
}
