//! # PREVENT Equations
//!
//! Row-level evaluation of the Khan 2023 PREVENT equations. Every covariate is moved onto
//! a piecewise-linear clinical scale before it meets its coefficient:
//!
//! - age is centered at 55 and scaled per decade, with its square for the 30-year models,
//! - systolic pressure, BMI and eGFR are split at knots of 110 mmHg, 30 kg/m2 and
//!   60 mL/min/1.73m2 into two slopes each,
//! - cholesterol is converted to mmol/L and centered (non-HDL at 3.5, HDL at 1.3 per 0.3).
//!
//! The optional ACR, HbA1c and SDI blocks follow a missing-indicator policy: a missing
//! entry zeroes the block's terms and switches on the block's own missing coefficient
//! instead of making the whole row missing.

use crate::coefficients::{CoefficientError, CoefficientRepository, PreventTable, PreventTerms};
use crate::inputs::prepare::{PreparedCovariates, cell};
use crate::link::LinkFunction;
use crate::types::{Covariate, Horizon, PredType, PreventType, Sex};

const MGDL_TO_MMOLL: f64 = 0.02586;

/// One optional covariate block of the PREVENT family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalBlock {
    Acr,
    Hba1c,
    Sdi,
}

impl OptionalBlock {
    /// The input column the block reads.
    pub fn covariate(self) -> Covariate {
        match self {
            OptionalBlock::Acr => Covariate::Acr,
            OptionalBlock::Hba1c => Covariate::Hba1c,
            OptionalBlock::Sdi => Covariate::Sdi,
        }
    }
}

/// The optional blocks switched on by a model type, resolved once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveBlocks {
    pub acr: bool,
    pub hba1c: bool,
    pub sdi: bool,
}

impl ActiveBlocks {
    pub fn for_prevent_type(prevent_type: PreventType) -> Self {
        Self {
            acr: prevent_type.uses_acr(),
            hba1c: prevent_type.uses_hba1c(),
            sdi: prevent_type.uses_sdi(),
        }
    }

    pub fn iter(self) -> impl Iterator<Item = OptionalBlock> {
        [
            (self.acr, OptionalBlock::Acr),
            (self.hba1c, OptionalBlock::Hba1c),
            (self.sdi, OptionalBlock::Sdi),
        ]
        .into_iter()
        .filter_map(|(active, block)| active.then_some(block))
    }
}

/// Covariates an endpoint's equation reads on top of the ones every PREVENT equation
/// reads. The heart-failure equations use BMI instead of cholesterol and statin use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointReads {
    pub lipids: bool,
    pub bmi: bool,
}

impl EndpointReads {
    pub fn for_pred_type(pred_type: PredType) -> Self {
        match pred_type {
            PredType::Hf => Self {
                lipids: false,
                bmi: true,
            },
            _ => Self {
                lipids: true,
                bmi: false,
            },
        }
    }

    /// Every covariate whose missingness makes a row missing under this endpoint.
    pub fn covariates(self) -> Vec<Covariate> {
        let mut read = vec![
            Covariate::AgeYears,
            Covariate::Sex,
            Covariate::SmokeCurrent,
            Covariate::BpSys,
            Covariate::BpMeds,
            Covariate::Diabetes,
            Covariate::Egfr,
        ];
        if self.lipids {
            read.extend([Covariate::CholTotal, Covariate::CholHdl, Covariate::StatinMeds]);
        }
        if self.bmi {
            read.push(Covariate::Bmi);
        }
        read
    }
}

/// Total and HDL cholesterol in mg/dL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lipids {
    pub total_chol: f64,
    pub hdl: f64,
}

/// Covariates of one subject. Optional block values stay `None` when missing; values
/// the endpoint does not read are `None` (or `false` for statin use).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreventRow {
    pub sex: Sex,
    pub age: f64,
    pub lipids: Option<Lipids>,
    pub sbp: f64,
    pub bmi: Option<f64>,
    pub egfr: f64,
    pub bp_meds: bool,
    pub statin: bool,
    pub smoker: bool,
    pub diabetes: bool,
    pub acr: Option<f64>,
    pub hba1c: Option<f64>,
    pub sdi: Option<f64>,
}

impl PreventRow {
    /// `None` if any covariate the endpoint reads is missing at `row`.
    pub fn extract(
        covariates: &PreparedCovariates,
        row: usize,
        reads: EndpointReads,
    ) -> Option<Self> {
        let (lipids, statin) = if reads.lipids {
            let lipids = Lipids {
                total_chol: covariates.chol_total_mgdl.get(row).copied().flatten()?,
                hdl: covariates.chol_hdl_mgdl.get(row).copied().flatten()?,
            };
            (Some(lipids), cell(covariates.statin_meds.as_ref(), row)?)
        } else {
            (None, false)
        };
        let bmi = if reads.bmi {
            Some(cell(covariates.bmi.as_ref(), row)?)
        } else {
            None
        };
        Some(Self {
            sex: covariates.sex[row]?,
            age: covariates.age_years[row]?,
            lipids,
            sbp: covariates.bp_sys_mmhg[row]?,
            bmi,
            egfr: cell(covariates.egfr_mlminm2.as_ref(), row)?,
            bp_meds: covariates.bp_meds[row]?,
            statin,
            smoker: covariates.smoke_current[row]?,
            diabetes: covariates.diabetes[row]?,
            acr: cell(covariates.acr.as_ref(), row),
            hba1c: cell(covariates.hba1c.as_ref(), row),
            sdi: cell(covariates.sdi.as_ref(), row),
        })
    }
}

#[inline]
fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Piecewise-linear transforms of the core covariates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreventScales {
    pub age: f64,
    pub non_hdl_c: f64,
    pub hdl_c: f64,
    pub sbp_lt_110: f64,
    pub sbp_gte_110: f64,
    pub bmi_lt_30: f64,
    pub bmi_gte_30: f64,
    pub egfr_lt_60: f64,
    pub egfr_gte_60: f64,
}

impl PreventScales {
    /// Covariates the endpoint does not read contribute zero.
    pub fn from_row(x: &PreventRow) -> Self {
        let (non_hdl_c, hdl_c) = x.lipids.map_or((0.0, 0.0), |l| {
            (
                (l.total_chol - l.hdl) * MGDL_TO_MMOLL - 3.5,
                (l.hdl * MGDL_TO_MMOLL - 1.3) / 0.3,
            )
        });
        let (bmi_lt_30, bmi_gte_30) = x.bmi.map_or((0.0, 0.0), |bmi| {
            ((bmi.min(30.0) - 25.0) / 5.0, (bmi.max(30.0) - 30.0) / 5.0)
        });
        Self {
            age: (x.age - 55.0) / 10.0,
            non_hdl_c,
            hdl_c,
            sbp_lt_110: (x.sbp.min(110.0) - 110.0) / 20.0,
            sbp_gte_110: (x.sbp.max(110.0) - 130.0) / 20.0,
            bmi_lt_30,
            bmi_gte_30,
            egfr_lt_60: (x.egfr.min(60.0) - 60.0) / -15.0,
            egfr_gte_60: (x.egfr.max(60.0) - 90.0) / -15.0,
        }
    }
}

/// Contribution of the core terms, including the constant.
pub fn core_linear_predictor(terms: &PreventTerms, x: &PreventRow) -> f64 {
    let s = PreventScales::from_row(x);
    let diabetes = indicator(x.diabetes);
    let smoker = indicator(x.smoker);
    let bp_meds = indicator(x.bp_meds);
    let statin = indicator(x.statin);

    terms.constant
        + terms.age * s.age
        + terms.age_squared * s.age * s.age
        + terms.non_hdl_c * s.non_hdl_c
        + terms.hdl_c * s.hdl_c
        + terms.sbp_lt_110 * s.sbp_lt_110
        + terms.sbp_gte_110 * s.sbp_gte_110
        + terms.diabetes * diabetes
        + terms.current_smoking * smoker
        + terms.bmi_lt_30 * s.bmi_lt_30
        + terms.bmi_gte_30 * s.bmi_gte_30
        + terms.egfr_lt_60 * s.egfr_lt_60
        + terms.egfr_gte_60 * s.egfr_gte_60
        + terms.bp_meds * bp_meds
        + terms.statin * statin
        + terms.bp_meds_sbp_lt_110 * bp_meds * s.sbp_lt_110
        + terms.bp_meds_sbp_gte_110 * bp_meds * s.sbp_gte_110
        + terms.statin_non_hdl_c * statin * s.non_hdl_c
        + terms.age_non_hdl_c * s.age * s.non_hdl_c
        + terms.age_hdl_c * s.age * s.hdl_c
        + terms.age_sbp_gte_110 * s.age * s.sbp_gte_110
        + terms.age_diabetes * s.age * diabetes
        + terms.age_smoking * s.age * smoker
        + terms.age_bmi_gte_30 * s.age * s.bmi_gte_30
        + terms.age_egfr_lt_60 * s.age * s.egfr_lt_60
}

fn acr_contribution(terms: &PreventTerms, acr: Option<f64>) -> f64 {
    match acr {
        Some(value) => terms.ln_acr * value.ln(),
        None => terms.acr_missing,
    }
}

fn hba1c_contribution(terms: &PreventTerms, hba1c: Option<f64>, diabetes: bool) -> f64 {
    match hba1c {
        Some(value) => {
            let centered = value - 5.3;
            let dm = indicator(diabetes);
            terms.hba1c_diabetes * centered * dm + terms.hba1c_no_diabetes * centered * (1.0 - dm)
        }
        None => terms.hba1c_missing,
    }
}

fn sdi_contribution(terms: &PreventTerms, sdi: Option<f64>) -> f64 {
    match sdi {
        Some(value) if value >= 7.0 => terms.sdi_7_to_10,
        Some(value) if value >= 4.0 => terms.sdi_4_to_6,
        Some(_) => 0.0,
        None => terms.sdi_missing,
    }
}

/// One PREVENT model with both sex tables resolved.
#[derive(Debug, Clone, Copy)]
pub struct PreventEquation<'a> {
    pred_type: PredType,
    reads: EndpointReads,
    blocks: ActiveBlocks,
    impute_missing_sdi_for_female_ascvd: bool,
    tables: [&'a PreventTable; 2],
}

impl<'a> PreventEquation<'a> {
    pub fn resolve(
        repository: &'a CoefficientRepository,
        pred_type: PredType,
        prevent_type: PreventType,
        horizon: Horizon,
        impute_missing_sdi_for_female_ascvd: bool,
    ) -> Result<Self, CoefficientError> {
        Ok(Self {
            pred_type,
            reads: EndpointReads::for_pred_type(pred_type),
            blocks: ActiveBlocks::for_prevent_type(prevent_type),
            impute_missing_sdi_for_female_ascvd,
            tables: [
                repository.prevent(pred_type, prevent_type, horizon, Sex::Female)?,
                repository.prevent(pred_type, prevent_type, horizon, Sex::Male)?,
            ],
        })
    }

    pub fn blocks(&self) -> ActiveBlocks {
        self.blocks
    }

    /// Linear predictor of one subject under this model.
    pub fn linear_predictor(&self, x: &PreventRow) -> f64 {
        let terms = &self.tables[x.sex.index()].terms;
        let mut eta = core_linear_predictor(terms, x);
        if self.blocks.acr {
            eta += acr_contribution(terms, x.acr);
        }
        if self.blocks.hba1c {
            eta += hba1c_contribution(terms, x.hba1c, x.diabetes);
        }
        if self.blocks.sdi {
            eta += sdi_contribution(terms, self.effective_sdi(x));
        }
        eta
    }

    // Female ASCVD rows with no SDI are scored as the least deprived decile.
    fn effective_sdi(&self, x: &PreventRow) -> Option<f64> {
        let imputed = self.impute_missing_sdi_for_female_ascvd
            && self.pred_type == PredType::Ascvd
            && x.sex == Sex::Female;
        match x.sdi {
            None if imputed => Some(1.0),
            other => other,
        }
    }

    pub fn evaluate_row(
        &self,
        covariates: &PreparedCovariates,
        row: usize,
    ) -> Option<(f64, LinkFunction)> {
        let x = PreventRow::extract(covariates, row, self.reads)?;
        Some((self.linear_predictor(&x), LinkFunction::Logit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scenario_d(sex: Sex) -> PreventRow {
        PreventRow {
            sex,
            age: 50.0,
            lipids: Some(Lipids {
                total_chol: 200.0,
                hdl: 45.0,
            }),
            sbp: 160.0,
            bmi: Some(35.0),
            egfr: 90.0,
            bp_meds: true,
            statin: false,
            smoker: false,
            diabetes: true,
            acr: None,
            hba1c: None,
            sdi: None,
        }
    }

    fn base_ascvd(horizon: Horizon) -> PreventEquation<'static> {
        let repository = CoefficientRepository::shared().unwrap();
        PreventEquation::resolve(
            repository,
            PredType::Ascvd,
            PreventType::Base,
            horizon,
            true,
        )
        .unwrap()
    }

    fn synthetic_full() -> CoefficientRepository {
        CoefficientRepository::from_toml_str(
            r#"
            [[Khan_2023]]
            pred_type = "ascvd"
            prevent_type = "full"
            horizon = 10
            sex = "female"
            ln_acr = 1.0
            acr_missing = 10.0
            hba1c_diabetes = 2.0
            hba1c_no_diabetes = 3.0
            hba1c_missing = 20.0
            sdi_4_to_6 = 4.0
            sdi_7_to_10 = 5.0
            sdi_missing = 40.0

            [[Khan_2023]]
            pred_type = "ascvd"
            prevent_type = "full"
            horizon = 10
            sex = "male"
            sdi_4_to_6 = 4.0
            sdi_7_to_10 = 5.0
            sdi_missing = 40.0
            "#,
        )
        .unwrap()
    }

    #[test]
    fn scales_match_clinical_definitions() {
        let s = PreventScales::from_row(&scenario_d(Sex::Female));
        assert_abs_diff_eq!(s.age, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.non_hdl_c, 155.0 * 0.02586 - 3.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.hdl_c, (45.0 * 0.02586 - 1.3) / 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(s.sbp_lt_110, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.sbp_gte_110, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.bmi_lt_30, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.bmi_gte_30, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.egfr_lt_60, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.egfr_gte_60, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn base_ascvd_female_scenario() {
        let equation = base_ascvd(Horizon::TenYear);
        let eta = equation.linear_predictor(&scenario_d(Sex::Female));
        assert_abs_diff_eq!(LinkFunction::Logit.apply(eta), 0.0920, epsilon = 5e-4);
    }

    #[test]
    fn base_ascvd_male_scenario() {
        let equation = base_ascvd(Horizon::TenYear);
        let eta = equation.linear_predictor(&scenario_d(Sex::Male));
        assert_abs_diff_eq!(LinkFunction::Logit.apply(eta), 0.1019, epsilon = 5e-4);
    }

    #[test]
    fn thirty_year_risk_exceeds_ten_year_risk() {
        let x = scenario_d(Sex::Female);
        let ten = base_ascvd(Horizon::TenYear).linear_predictor(&x);
        let thirty = base_ascvd(Horizon::ThirtyYear).linear_predictor(&x);
        assert!(LinkFunction::Logit.apply(thirty) > LinkFunction::Logit.apply(ten));
    }

    #[test]
    fn base_model_ignores_optional_values() {
        let equation = base_ascvd(Horizon::TenYear);
        let mut x = scenario_d(Sex::Male);
        let without = equation.linear_predictor(&x);
        x.acr = Some(300.0);
        x.hba1c = Some(9.0);
        x.sdi = Some(9.0);
        assert_eq!(equation.linear_predictor(&x), without);
    }

    #[test]
    fn missing_optional_values_switch_on_missing_terms() {
        let repository = synthetic_full();
        let equation = PreventEquation::resolve(
            &repository,
            PredType::Ascvd,
            PreventType::Full,
            Horizon::TenYear,
            false,
        )
        .unwrap();
        let mut x = scenario_d(Sex::Female);
        assert_abs_diff_eq!(equation.linear_predictor(&x), 70.0, epsilon = 1e-12);

        x.acr = Some(std::f64::consts::E);
        x.hba1c = Some(6.3);
        x.sdi = Some(5.0);
        // ln(e) + 2 * (6.3 - 5.3) for a diabetic subject + the 4-6 decile indicator.
        assert_abs_diff_eq!(equation.linear_predictor(&x), 1.0 + 2.0 + 4.0, epsilon = 1e-12);

        x.diabetes = false;
        x.sdi = Some(8.0);
        let core_shift = core_linear_predictor(&equation.tables[0].terms, &x);
        assert_abs_diff_eq!(
            equation.linear_predictor(&x) - core_shift,
            1.0 + 3.0 + 5.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn missing_sdi_for_female_ascvd_is_scored_as_first_decile() {
        let repository = synthetic_full();
        let imputing = PreventEquation::resolve(
            &repository,
            PredType::Ascvd,
            PreventType::Full,
            Horizon::TenYear,
            true,
        )
        .unwrap();
        let mut female = scenario_d(Sex::Female);
        female.acr = Some(1.0);
        female.hba1c = Some(5.3);
        assert_abs_diff_eq!(imputing.linear_predictor(&female), 0.0, epsilon = 1e-12);

        let male = PreventRow {
            sex: Sex::Male,
            ..female
        };
        assert_abs_diff_eq!(imputing.linear_predictor(&male), 40.0, epsilon = 1e-12);
    }

    #[test]
    fn sdi_deciles_split_at_four_and_seven() {
        let terms = PreventTerms {
            sdi_4_to_6: 1.0,
            sdi_7_to_10: 2.0,
            sdi_missing: 3.0,
            ..PreventTerms::default()
        };
        assert_eq!(sdi_contribution(&terms, Some(3.0)), 0.0);
        assert_eq!(sdi_contribution(&terms, Some(4.0)), 1.0);
        assert_eq!(sdi_contribution(&terms, Some(6.0)), 1.0);
        assert_eq!(sdi_contribution(&terms, Some(7.0)), 2.0);
        assert_eq!(sdi_contribution(&terms, Some(10.0)), 2.0);
        assert_eq!(sdi_contribution(&terms, None), 3.0);
    }

    #[test]
    fn heart_failure_reads_bmi_instead_of_lipids() {
        let hf = EndpointReads::for_pred_type(PredType::Hf);
        assert!(!hf.covariates().contains(&Covariate::CholTotal));
        assert!(!hf.covariates().contains(&Covariate::StatinMeds));
        assert!(hf.covariates().contains(&Covariate::Bmi));

        let cvd = EndpointReads::for_pred_type(PredType::Cvd);
        assert!(cvd.covariates().contains(&Covariate::CholHdl));
        assert!(!cvd.covariates().contains(&Covariate::Bmi));

        let x = PreventRow {
            lipids: None,
            ..scenario_d(Sex::Female)
        };
        let s = PreventScales::from_row(&x);
        assert_eq!((s.non_hdl_c, s.hdl_c), (0.0, 0.0));
    }

    #[test]
    fn active_blocks_follow_model_type() {
        let full: Vec<OptionalBlock> = ActiveBlocks::for_prevent_type(PreventType::Full)
            .iter()
            .collect();
        assert_eq!(
            full,
            vec![OptionalBlock::Acr, OptionalBlock::Hba1c, OptionalBlock::Sdi]
        );
        assert_eq!(ActiveBlocks::for_prevent_type(PreventType::Base).iter().count(), 0);
        assert_eq!(OptionalBlock::Hba1c.covariate(), Covariate::Hba1c);
    }
}
