// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Every covariate the engine knows about. The `name` of a covariate is the
/// identifier used in error messages, warnings, level-map files and TSV headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Covariate {
    AgeYears,
    Sex,
    Race,
    SmokeCurrent,
    CholTotal,
    CholHdl,
    BpSys,
    BpMeds,
    StatinMeds,
    Diabetes,
    Bmi,
    Egfr,
    Acr,
    Hba1c,
    Sdi,
}

impl Covariate {
    pub const ALL: [Covariate; 15] = [
        Covariate::AgeYears,
        Covariate::Sex,
        Covariate::Race,
        Covariate::SmokeCurrent,
        Covariate::CholTotal,
        Covariate::CholHdl,
        Covariate::BpSys,
        Covariate::BpMeds,
        Covariate::StatinMeds,
        Covariate::Diabetes,
        Covariate::Bmi,
        Covariate::Egfr,
        Covariate::Acr,
        Covariate::Hba1c,
        Covariate::Sdi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Covariate::AgeYears => "age_years",
            Covariate::Sex => "sex",
            Covariate::Race => "race",
            Covariate::SmokeCurrent => "smoke_current",
            Covariate::CholTotal => "chol_total_mgdl",
            Covariate::CholHdl => "chol_hdl_mgdl",
            Covariate::BpSys => "bp_sys_mmhg",
            Covariate::BpMeds => "bp_meds",
            Covariate::StatinMeds => "statin_meds",
            Covariate::Diabetes => "diabetes",
            Covariate::Bmi => "bmi",
            Covariate::Egfr => "egfr_mlminm2",
            Covariate::Acr => "acr",
            Covariate::Hba1c => "hba1c",
            Covariate::Sdi => "sdi",
        }
    }

    /// Categorical covariates go through the level-map normalizer; the rest are numeric.
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            Covariate::Sex
                | Covariate::Race
                | Covariate::SmokeCurrent
                | Covariate::BpMeds
                | Covariate::StatinMeds
                | Covariate::Diabetes
        )
    }
}

impl fmt::Display for Covariate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    /// Position in dense subgroup tables.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Sex::Female => 0,
            Sex::Male => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Race {
    Black,
    White,
}

impl Race {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Race::Black => 0,
            Race::White => 1,
        }
    }

    #[inline]
    pub fn is_black(self) -> f64 {
        match self {
            Race::Black => 1.0,
            Race::White => 0.0,
        }
    }
}

/// Failure to interpret a user-facing descriptor label.
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorParseError {
    #[error(
        "Unsupported equation version '{0}'. Expected one of: Goff_2013, Yadlowsky_2018, Khan_2023."
    )]
    UnsupportedEquationVersion(String),
    #[error("Unknown prediction type '{0}'. Expected one of: ascvd, cvd, hf, chd, stroke.")]
    UnknownPredType(String),
    #[error("Unknown PREVENT model type '{0}'. Expected one of: base, acr, hba1c, sdi, full.")]
    UnknownPreventType(String),
    #[error("Unsupported time horizon '{0}'. Expected one of: 5, 10, 30.")]
    UnsupportedHorizon(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquationVersion {
    #[serde(rename = "Goff_2013")]
    Goff2013,
    #[serde(rename = "Yadlowsky_2018")]
    Yadlowsky2018,
    #[serde(rename = "Khan_2023")]
    Khan2023,
}

impl EquationVersion {
    pub fn label(self) -> &'static str {
        match self {
            EquationVersion::Goff2013 => "Goff_2013",
            EquationVersion::Yadlowsky2018 => "Yadlowsky_2018",
            EquationVersion::Khan2023 => "Khan_2023",
        }
    }
}

impl fmt::Display for EquationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EquationVersion {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Goff_2013" => Ok(EquationVersion::Goff2013),
            "Yadlowsky_2018" => Ok(EquationVersion::Yadlowsky2018),
            "Khan_2023" => Ok(EquationVersion::Khan2023),
            other => Err(DescriptorParseError::UnsupportedEquationVersion(
                other.to_string(),
            )),
        }
    }
}

/// The clinical endpoint being predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredType {
    Ascvd,
    Cvd,
    Hf,
    Chd,
    Stroke,
}

impl PredType {
    pub fn label(self) -> &'static str {
        match self {
            PredType::Ascvd => "ascvd",
            PredType::Cvd => "cvd",
            PredType::Hf => "hf",
            PredType::Chd => "chd",
            PredType::Stroke => "stroke",
        }
    }
}

impl fmt::Display for PredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PredType {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascvd" => Ok(PredType::Ascvd),
            "cvd" => Ok(PredType::Cvd),
            "hf" => Ok(PredType::Hf),
            "chd" => Ok(PredType::Chd),
            "stroke" => Ok(PredType::Stroke),
            _ => Err(DescriptorParseError::UnknownPredType(s.to_string())),
        }
    }
}

/// PREVENT model variant. Each variant other than `Base` switches on one or more
/// optional covariate blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreventType {
    #[default]
    Base,
    Acr,
    Hba1c,
    Sdi,
    Full,
}

impl PreventType {
    pub fn label(self) -> &'static str {
        match self {
            PreventType::Base => "base",
            PreventType::Acr => "acr",
            PreventType::Hba1c => "hba1c",
            PreventType::Sdi => "sdi",
            PreventType::Full => "full",
        }
    }

    pub fn uses_acr(self) -> bool {
        matches!(self, PreventType::Acr | PreventType::Full)
    }

    pub fn uses_hba1c(self) -> bool {
        matches!(self, PreventType::Hba1c | PreventType::Full)
    }

    pub fn uses_sdi(self) -> bool {
        matches!(self, PreventType::Sdi | PreventType::Full)
    }
}

impl fmt::Display for PreventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PreventType {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(PreventType::Base),
            "acr" => Ok(PreventType::Acr),
            "hba1c" => Ok(PreventType::Hba1c),
            "sdi" => Ok(PreventType::Sdi),
            "full" => Ok(PreventType::Full),
            _ => Err(DescriptorParseError::UnknownPreventType(s.to_string())),
        }
    }
}

/// Prediction horizon in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Horizon {
    FiveYear,
    TenYear,
    ThirtyYear,
}

impl Horizon {
    pub fn years(self) -> u32 {
        match self {
            Horizon::FiveYear => 5,
            Horizon::TenYear => 10,
            Horizon::ThirtyYear => 30,
        }
    }
}

impl TryFrom<u32> for Horizon {
    type Error = DescriptorParseError;

    fn try_from(years: u32) -> Result<Self, Self::Error> {
        match years {
            5 => Ok(Horizon::FiveYear),
            10 => Ok(Horizon::TenYear),
            30 => Ok(Horizon::ThirtyYear),
            other => Err(DescriptorParseError::UnsupportedHorizon(other.to_string())),
        }
    }
}

impl From<Horizon> for u32 {
    fn from(horizon: Horizon) -> Self {
        horizon.years()
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-year", self.years())
    }
}

impl FromStr for Horizon {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let years: u32 = s
            .trim()
            .parse()
            .map_err(|_| DescriptorParseError::UnsupportedHorizon(s.to_string()))?;
        Horizon::try_from(years)
    }
}

/// Everything that decides which equation is evaluated. Built once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquationDescriptor {
    pub pred_type: PredType,
    pub equation_version: EquationVersion,
    pub horizon: Horizon,
    /// Only meaningful for `Khan_2023`; `None` means the base model.
    pub prevent_type: Option<PreventType>,
}

impl EquationDescriptor {
    pub fn new(pred_type: PredType, equation_version: EquationVersion, horizon: Horizon) -> Self {
        Self {
            pred_type,
            equation_version,
            horizon,
            prevent_type: None,
        }
    }

    pub fn with_prevent_type(mut self, prevent_type: PreventType) -> Self {
        self.prevent_type = Some(prevent_type);
        self
    }
}

impl fmt::Display for EquationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.horizon, self.pred_type, self.equation_version
        )?;
        if let (EquationVersion::Khan2023, Some(kind)) = (self.equation_version, self.prevent_type)
        {
            write!(f, " [{kind}]")?;
        }
        Ok(())
    }
}
