//! # Input Preparation
//!
//! Turns the caller's raw columns into typed, validated, canonical covariate vectors.
//! The order of the checks is fixed:
//!
//! 1. level maps of the categorical covariates in use are compiled (configuration errors),
//! 2. every column in use is type-checked,
//! 3. all columns in use must share one length,
//! 4. categorical columns are normalized and checked against their canonical levels,
//! 5. continuous columns are checked against their recommended ranges,
//! 6. missing data among covariates whose missingness propagates is summarized.
//!
//! Only covariates the resolved equation needs are touched; anything else the caller
//! supplied is ignored.

use log::debug;
use thiserror::Error;

use super::bounds::BoundarySpec;
use super::column::{ColumnKind, RawColumn};
use super::levels::{CanonicalLevel, LevelMapError, LevelMaps, YesNo, canonical_levels, into_typed};
use super::validate::{
    MissingDataReport, ValidationError, check_bounds, check_category, check_equal_lengths,
    check_missing, check_type,
};
use crate::types::{Covariate, Race, Sex};

const NUMERIC: &[ColumnKind] = &[ColumnKind::Float];
const CATEGORICAL: &[ColumnKind] = &[ColumnKind::Text, ColumnKind::Integer, ColumnKind::Logical];

/// Raw covariate columns for one call. Covariates every equation needs are plain
/// fields; the rest are supplied only when the chosen equation uses them.
#[derive(Debug, Clone)]
pub struct RiskInputs {
    pub age_years: RawColumn,
    pub sex: RawColumn,
    pub smoke_current: RawColumn,
    pub chol_total_mgdl: RawColumn,
    pub chol_hdl_mgdl: RawColumn,
    pub bp_sys_mmhg: RawColumn,
    pub bp_meds: RawColumn,
    pub diabetes: RawColumn,
    pub race: Option<RawColumn>,
    pub statin_meds: Option<RawColumn>,
    pub bmi: Option<RawColumn>,
    pub egfr_mlminm2: Option<RawColumn>,
    pub acr: Option<RawColumn>,
    pub hba1c: Option<RawColumn>,
    pub sdi: Option<RawColumn>,
}

impl RiskInputs {
    pub fn column(&self, covariate: Covariate) -> Option<&RawColumn> {
        match covariate {
            Covariate::AgeYears => Some(&self.age_years),
            Covariate::Sex => Some(&self.sex),
            Covariate::SmokeCurrent => Some(&self.smoke_current),
            Covariate::CholTotal => Some(&self.chol_total_mgdl),
            Covariate::CholHdl => Some(&self.chol_hdl_mgdl),
            Covariate::BpSys => Some(&self.bp_sys_mmhg),
            Covariate::BpMeds => Some(&self.bp_meds),
            Covariate::Diabetes => Some(&self.diabetes),
            Covariate::Race => self.race.as_ref(),
            Covariate::StatinMeds => self.statin_meds.as_ref(),
            Covariate::Bmi => self.bmi.as_ref(),
            Covariate::Egfr => self.egfr_mlminm2.as_ref(),
            Covariate::Acr => self.acr.as_ref(),
            Covariate::Hba1c => self.hba1c.as_ref(),
            Covariate::Sdi => self.sdi.as_ref(),
        }
    }

    pub fn is_supplied(&self, covariate: Covariate) -> bool {
        self.column(covariate).is_some()
    }

    /// Reorders every column so that row `i` of the result is row `order[i]` of `self`.
    pub fn take_rows(&self, order: &[usize]) -> RiskInputs {
        let take = |column: &Option<RawColumn>| column.as_ref().map(|c| c.take(order));
        RiskInputs {
            age_years: self.age_years.take(order),
            sex: self.sex.take(order),
            smoke_current: self.smoke_current.take(order),
            chol_total_mgdl: self.chol_total_mgdl.take(order),
            chol_hdl_mgdl: self.chol_hdl_mgdl.take(order),
            bp_sys_mmhg: self.bp_sys_mmhg.take(order),
            bp_meds: self.bp_meds.take(order),
            diabetes: self.diabetes.take(order),
            race: take(&self.race),
            statin_meds: take(&self.statin_meds),
            bmi: take(&self.bmi),
            egfr_mlminm2: take(&self.egfr_mlminm2),
            acr: take(&self.acr),
            hba1c: take(&self.hba1c),
            sdi: take(&self.sdi),
        }
    }
}

/// How a covariate's per-row missingness is handled by the equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovariateUse {
    /// A missing entry makes the whole row missing.
    Required,
    /// A missing entry is absorbed by a missing-indicator term.
    Optional,
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error(transparent)]
    Configuration(#[from] LevelMapError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Typed, canonical covariates. Vectors for covariates the equation does not use are
/// left as `None`.
#[derive(Debug, Clone, Default)]
pub struct PreparedCovariates {
    pub n_rows: usize,
    pub age_years: Vec<Option<f64>>,
    pub sex: Vec<Option<Sex>>,
    pub smoke_current: Vec<Option<bool>>,
    pub chol_total_mgdl: Vec<Option<f64>>,
    pub chol_hdl_mgdl: Vec<Option<f64>>,
    pub bp_sys_mmhg: Vec<Option<f64>>,
    pub bp_meds: Vec<Option<bool>>,
    pub diabetes: Vec<Option<bool>>,
    pub race: Option<Vec<Option<Race>>>,
    pub statin_meds: Option<Vec<Option<bool>>>,
    pub bmi: Option<Vec<Option<f64>>>,
    pub egfr_mlminm2: Option<Vec<Option<f64>>>,
    pub acr: Option<Vec<Option<f64>>>,
    pub hba1c: Option<Vec<Option<f64>>>,
    pub sdi: Option<Vec<Option<f64>>>,
    /// The single missing-data warning of the call, if any required covariate has gaps.
    pub missing: Option<MissingDataReport>,
}

/// Runs the full validation pipeline over the covariates in `uses`.
pub fn prepare(
    inputs: &RiskInputs,
    uses: &[(Covariate, CovariateUse)],
    levels: &LevelMaps,
    boundaries: &BoundarySpec,
) -> Result<PreparedCovariates, InputError> {
    let in_use: Vec<(Covariate, CovariateUse, &RawColumn)> = uses
        .iter()
        .filter_map(|&(covariate, usage)| {
            inputs
                .column(covariate)
                .map(|column| (covariate, usage, column))
        })
        .collect();

    let mut compiled = Vec::new();
    for &(covariate, _, _) in in_use.iter().filter(|(c, _, _)| c.is_categorical()) {
        if let Some(map) = levels.for_covariate(covariate) {
            compiled.push(map.compile(covariate, canonical_levels(covariate))?);
        }
    }

    for &(covariate, _, column) in &in_use {
        let expected = if covariate.is_categorical() {
            CATEGORICAL
        } else {
            NUMERIC
        };
        check_type(covariate.name(), column, expected)?;
    }

    let named: Vec<(&'static str, &RawColumn)> = in_use
        .iter()
        .map(|&(covariate, _, column)| (covariate.name(), column))
        .collect();
    let n_rows = check_equal_lengths(&named)?;
    debug!("Validating {} covariates over {} rows", in_use.len(), n_rows);

    let mut prepared = PreparedCovariates {
        n_rows,
        ..PreparedCovariates::default()
    };

    for map in &compiled {
        let covariate = map.variable();
        let Some(labels) = inputs.column(covariate).and_then(RawColumn::as_labels) else {
            continue;
        };
        let canonical = map.normalize(&labels);
        check_category(covariate.name(), &canonical, map.allowed())?;
        match covariate {
            Covariate::Sex => prepared.sex = into_typed(covariate, &canonical, Sex::from_canonical)?,
            Covariate::Race => {
                prepared.race = Some(into_typed(covariate, &canonical, Race::from_canonical)?)
            }
            Covariate::SmokeCurrent => prepared.smoke_current = yes_no(covariate, &canonical)?,
            Covariate::BpMeds => prepared.bp_meds = yes_no(covariate, &canonical)?,
            Covariate::StatinMeds => prepared.statin_meds = Some(yes_no(covariate, &canonical)?),
            Covariate::Diabetes => prepared.diabetes = yes_no(covariate, &canonical)?,
            _ => {}
        }
    }

    for &(covariate, _, column) in in_use.iter().filter(|(c, _, _)| !c.is_categorical()) {
        let Some(values) = column.as_numeric() else {
            continue;
        };
        if let Some(range) = boundaries.bounds(covariate) {
            check_bounds(covariate.name(), &values, range.lower, range.upper)?;
        }
        match covariate {
            Covariate::AgeYears => prepared.age_years = values,
            Covariate::CholTotal => prepared.chol_total_mgdl = values,
            Covariate::CholHdl => prepared.chol_hdl_mgdl = values,
            Covariate::BpSys => prepared.bp_sys_mmhg = values,
            Covariate::Bmi => prepared.bmi = Some(values),
            Covariate::Egfr => prepared.egfr_mlminm2 = Some(values),
            Covariate::Acr => prepared.acr = Some(values),
            Covariate::Hba1c => prepared.hba1c = Some(values),
            Covariate::Sdi => prepared.sdi = Some(values),
            _ => {}
        }
    }

    let propagating: Vec<(&'static str, &RawColumn)> = in_use
        .iter()
        .filter(|(_, usage, _)| *usage == CovariateUse::Required)
        .map(|&(covariate, _, column)| (covariate.name(), column))
        .collect();
    prepared.missing = check_missing(&propagating, n_rows);

    Ok(prepared)
}

/// Value of an optional covariate at `row`; `None` when the column was not prepared
/// or the entry is missing.
pub fn cell<T: Copy>(column: Option<&Vec<Option<T>>>, row: usize) -> Option<T> {
    column.and_then(|values| values.get(row).copied().flatten())
}

fn yes_no(
    covariate: Covariate,
    canonical: &[Option<String>],
) -> Result<Vec<Option<bool>>, ValidationError> {
    let typed = into_typed(covariate, canonical, YesNo::parse)?;
    Ok(typed.into_iter().map(|v| v.map(|answer| answer.0)).collect())
}
