//! Typed coefficient records, one record type per equation family.
//!
//! Every term of a family's linear predictor is a named field. Terms a published
//! table does not use are simply left out of the resource and read as zero.

use serde::{Deserialize, Serialize};

use crate::types::{Horizon, PredType, PreventType, Race, Sex};

/// Goff 2013 Pooled Cohort Equations, one record per (horizon, sex, race).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledCohortTable {
    pub horizon: Horizon,
    pub sex: Sex,
    pub race: Race,
    /// Baseline survival at the horizon.
    pub baseline_survival: f64,
    /// Mean of the linear predictor in the derivation cohort.
    pub mean: f64,
    #[serde(flatten)]
    pub terms: PooledCohortTerms,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PooledCohortTerms {
    pub ln_age: f64,
    pub ln_age_squared: f64,
    pub ln_total_chol: f64,
    pub ln_age_ln_total_chol: f64,
    pub ln_hdl: f64,
    pub ln_age_ln_hdl: f64,
    pub ln_treated_sbp: f64,
    pub ln_age_ln_treated_sbp: f64,
    pub ln_untreated_sbp: f64,
    pub ln_age_ln_untreated_sbp: f64,
    pub smoker: f64,
    pub ln_age_smoker: f64,
    pub diabetes: f64,
}

/// Yadlowsky 2018 revised Pooled Cohort Equations, one record per (horizon, sex).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisedPooledCohortTable {
    pub horizon: Horizon,
    pub sex: Sex,
    #[serde(flatten)]
    pub terms: RevisedPooledCohortTerms,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisedPooledCohortTerms {
    pub intercept: f64,
    pub age: f64,
    pub black: f64,
    pub sbp_squared: f64,
    pub sbp: f64,
    pub bp_meds: f64,
    pub diabetes: f64,
    pub smoker: f64,
    pub chol_ratio: f64,
    pub age_black: f64,
    pub sbp_bp_meds: f64,
    pub sbp_black: f64,
    pub black_bp_meds: f64,
    pub age_sbp: f64,
    pub black_diabetes: f64,
    pub black_smoker: f64,
    pub chol_ratio_black: f64,
    pub sbp_black_bp_meds: f64,
    pub age_sbp_black: f64,
}

/// Khan 2023 PREVENT equations, one record per (endpoint, model, horizon, sex).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreventTable {
    pub pred_type: PredType,
    pub prevent_type: PreventType,
    pub horizon: Horizon,
    pub sex: Sex,
    #[serde(flatten)]
    pub terms: PreventTerms,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreventTerms {
    pub constant: f64,
    pub age: f64,
    pub age_squared: f64,
    pub non_hdl_c: f64,
    pub hdl_c: f64,
    pub sbp_lt_110: f64,
    pub sbp_gte_110: f64,
    pub diabetes: f64,
    pub current_smoking: f64,
    pub bmi_lt_30: f64,
    pub bmi_gte_30: f64,
    pub egfr_lt_60: f64,
    pub egfr_gte_60: f64,
    pub bp_meds: f64,
    pub statin: f64,
    pub bp_meds_sbp_lt_110: f64,
    pub bp_meds_sbp_gte_110: f64,
    pub statin_non_hdl_c: f64,
    pub age_non_hdl_c: f64,
    pub age_hdl_c: f64,
    pub age_sbp_gte_110: f64,
    pub age_diabetes: f64,
    pub age_smoking: f64,
    pub age_bmi_gte_30: f64,
    pub age_egfr_lt_60: f64,
    pub sdi_4_to_6: f64,
    pub sdi_7_to_10: f64,
    pub sdi_missing: f64,
    pub ln_acr: f64,
    pub acr_missing: f64,
    pub hba1c_diabetes: f64,
    pub hba1c_no_diabetes: f64,
    pub hba1c_missing: f64,
}
