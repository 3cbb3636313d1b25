//! # Pooled Cohort Equations
//!
//! Row-level evaluation of the Goff 2013 equations and their Yadlowsky 2018 revision.
//! Both read the same nine covariates. Goff 2013 works on natural logs and joins its
//! coefficients by (sex, race); Yadlowsky 2018 works on raw age and blood pressure,
//! joins by sex alone and carries race as a black-race indicator term.

use crate::coefficients::{
    CoefficientError, CoefficientRepository, PooledCohortTable, PooledCohortTerms,
    RevisedPooledCohortTable, RevisedPooledCohortTerms,
};
use crate::inputs::prepare::{PreparedCovariates, cell};
use crate::link::LinkFunction;
use crate::types::{Horizon, Race, Sex};

/// Covariates of one subject, already typed and canonical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PooledCohortRow {
    pub sex: Sex,
    pub race: Race,
    pub age: f64,
    pub total_chol: f64,
    pub hdl: f64,
    pub sbp: f64,
    pub bp_meds: bool,
    pub smoker: bool,
    pub diabetes: bool,
}

impl PooledCohortRow {
    /// `None` if any covariate is missing at `row`.
    pub fn extract(covariates: &PreparedCovariates, row: usize) -> Option<Self> {
        Some(Self {
            sex: covariates.sex[row]?,
            race: cell(covariates.race.as_ref(), row)?,
            age: covariates.age_years[row]?,
            total_chol: covariates.chol_total_mgdl[row]?,
            hdl: covariates.chol_hdl_mgdl[row]?,
            sbp: covariates.bp_sys_mmhg[row]?,
            bp_meds: covariates.bp_meds[row]?,
            smoker: covariates.smoke_current[row]?,
            diabetes: covariates.diabetes[row]?,
        })
    }
}

#[inline]
fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Log-scale linear predictor of Goff 2013. The log of systolic pressure enters either
/// the treated or the untreated term, never both.
pub fn pooled_cohort_linear_predictor(terms: &PooledCohortTerms, x: &PooledCohortRow) -> f64 {
    let ln_age = x.age.ln();
    let ln_total_chol = x.total_chol.ln();
    let ln_hdl = x.hdl.ln();
    let ln_sbp = x.sbp.ln();
    let treated = indicator(x.bp_meds);
    let ln_treated_sbp = ln_sbp * treated;
    let ln_untreated_sbp = ln_sbp * (1.0 - treated);
    let smoker = indicator(x.smoker);

    terms.ln_age * ln_age
        + terms.ln_age_squared * ln_age * ln_age
        + terms.ln_total_chol * ln_total_chol
        + terms.ln_age_ln_total_chol * ln_age * ln_total_chol
        + terms.ln_hdl * ln_hdl
        + terms.ln_age_ln_hdl * ln_age * ln_hdl
        + terms.ln_treated_sbp * ln_treated_sbp
        + terms.ln_age_ln_treated_sbp * ln_age * ln_treated_sbp
        + terms.ln_untreated_sbp * ln_untreated_sbp
        + terms.ln_age_ln_untreated_sbp * ln_age * ln_untreated_sbp
        + terms.smoker * smoker
        + terms.ln_age_smoker * ln_age * smoker
        + terms.diabetes * indicator(x.diabetes)
}

pub fn revised_pooled_cohort_linear_predictor(
    terms: &RevisedPooledCohortTerms,
    x: &PooledCohortRow,
) -> f64 {
    let black = x.race.is_black();
    let treated = indicator(x.bp_meds);
    let diabetes = indicator(x.diabetes);
    let smoker = indicator(x.smoker);
    let chol_ratio = x.total_chol / x.hdl;
    let (age, sbp) = (x.age, x.sbp);

    terms.intercept
        + terms.age * age
        + terms.black * black
        + terms.sbp_squared * sbp * sbp
        + terms.sbp * sbp
        + terms.bp_meds * treated
        + terms.diabetes * diabetes
        + terms.smoker * smoker
        + terms.chol_ratio * chol_ratio
        + terms.age_black * age * black
        + terms.sbp_bp_meds * sbp * treated
        + terms.sbp_black * sbp * black
        + terms.black_bp_meds * black * treated
        + terms.age_sbp * age * sbp
        + terms.black_diabetes * black * diabetes
        + terms.black_smoker * black * smoker
        + terms.chol_ratio_black * chol_ratio * black
        + terms.sbp_black_bp_meds * sbp * black * treated
        + terms.age_sbp_black * age * sbp * black
}

/// Goff 2013 with all four subgroup tables resolved, indexed `[sex][race]`.
#[derive(Debug, Clone, Copy)]
pub struct PooledCohortEquation<'a> {
    tables: [[&'a PooledCohortTable; 2]; 2],
}

impl<'a> PooledCohortEquation<'a> {
    pub fn resolve(
        repository: &'a CoefficientRepository,
        horizon: Horizon,
    ) -> Result<Self, CoefficientError> {
        let subgroup =
            |sex: Sex, race: Race| repository.pooled_cohort(horizon, sex, race);
        Ok(Self {
            tables: [
                [
                    subgroup(Sex::Female, Race::Black)?,
                    subgroup(Sex::Female, Race::White)?,
                ],
                [
                    subgroup(Sex::Male, Race::Black)?,
                    subgroup(Sex::Male, Race::White)?,
                ],
            ],
        })
    }

    pub fn table(&self, sex: Sex, race: Race) -> &'a PooledCohortTable {
        self.tables[sex.index()][race.index()]
    }

    pub fn evaluate_row(
        &self,
        covariates: &PreparedCovariates,
        row: usize,
    ) -> Option<(f64, LinkFunction)> {
        let x = PooledCohortRow::extract(covariates, row)?;
        let table = self.table(x.sex, x.race);
        let eta = pooled_cohort_linear_predictor(&table.terms, &x);
        Some((
            eta,
            LinkFunction::BaselineSurvival {
                baseline_survival: table.baseline_survival,
                mean: table.mean,
            },
        ))
    }
}

/// Yadlowsky 2018 with both sex tables resolved, indexed by sex.
#[derive(Debug, Clone, Copy)]
pub struct RevisedPooledCohortEquation<'a> {
    tables: [&'a RevisedPooledCohortTable; 2],
}

impl<'a> RevisedPooledCohortEquation<'a> {
    pub fn resolve(
        repository: &'a CoefficientRepository,
        horizon: Horizon,
    ) -> Result<Self, CoefficientError> {
        Ok(Self {
            tables: [
                repository.revised_pooled_cohort(horizon, Sex::Female)?,
                repository.revised_pooled_cohort(horizon, Sex::Male)?,
            ],
        })
    }

    pub fn evaluate_row(
        &self,
        covariates: &PreparedCovariates,
        row: usize,
    ) -> Option<(f64, LinkFunction)> {
        let x = PooledCohortRow::extract(covariates, row)?;
        let table = self.tables[x.sex.index()];
        Some((
            revised_pooled_cohort_linear_predictor(&table.terms, &x),
            LinkFunction::Logit,
        ))
    }
}
