//! # Coefficient Repository
//!
//! Immutable, exact-key collection of the published coefficient tables. Tables are
//! read once from TOML (the resources compiled into the crate, optionally extended
//! with a caller-supplied file of the same schema) and never reparsed per call.
//! After loading, the repository is plain read-only data and can be shared freely
//! across threads.

pub mod tables;

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use crate::types::{Horizon, PredType, PreventType, Race, Sex};
pub use tables::{
    PooledCohortTable, PooledCohortTerms, PreventTable, PreventTerms, RevisedPooledCohortTable,
    RevisedPooledCohortTerms,
};

const BUNDLED_POOLED_COHORT: &str = include_str!("pooled_cohort.toml");
const BUNDLED_PREVENT: &str = include_str!("prevent.toml");

#[derive(Debug, Error)]
pub enum CoefficientError {
    #[error("Failed to read coefficient file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse coefficient TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("The coefficient resource defines the table for {0} more than once.")]
    DuplicateTable(TableKey),
    #[error(
        "No coefficient table is loaded for {0}. Supply a coefficient file that contains it."
    )]
    MissingTable(TableKey),
    #[error("The coefficient table for {key} is invalid: {reason}")]
    InvalidTable { key: TableKey, reason: String },
}

/// Exact lookup key of one coefficient table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKey {
    PooledCohort {
        horizon: Horizon,
        sex: Sex,
        race: Race,
    },
    RevisedPooledCohort {
        horizon: Horizon,
        sex: Sex,
    },
    Prevent {
        pred_type: PredType,
        prevent_type: PreventType,
        horizon: Horizon,
        sex: Sex,
    },
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::PooledCohort { horizon, sex, race } => {
                write!(f, "Goff_2013 {horizon} ascvd ({sex:?}, {race:?})")
            }
            TableKey::RevisedPooledCohort { horizon, sex } => {
                write!(f, "Yadlowsky_2018 {horizon} ascvd ({sex:?})")
            }
            TableKey::Prevent {
                pred_type,
                prevent_type,
                horizon,
                sex,
            } => write!(
                f,
                "Khan_2023 {horizon} {pred_type} [{prevent_type}] ({sex:?})"
            ),
        }
    }
}

/// On-disk layout of a coefficient resource.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CoefficientFile {
    #[serde(default, rename = "Goff_2013")]
    pub pooled_cohort: Vec<PooledCohortTable>,
    #[serde(default, rename = "Yadlowsky_2018")]
    pub revised_pooled_cohort: Vec<RevisedPooledCohortTable>,
    #[serde(default, rename = "Khan_2023")]
    pub prevent: Vec<PreventTable>,
}

#[derive(Debug, Clone, Default)]
pub struct CoefficientRepository {
    pooled_cohort: HashMap<TableKey, PooledCohortTable>,
    revised_pooled_cohort: HashMap<TableKey, RevisedPooledCohortTable>,
    prevent: HashMap<TableKey, PreventTable>,
}

static SHARED: OnceLock<CoefficientRepository> = OnceLock::new();

impl CoefficientRepository {
    /// Parses the coefficient resources compiled into the crate.
    pub fn bundled() -> Result<Self, CoefficientError> {
        let mut repository = Self::from_toml_str(BUNDLED_POOLED_COHORT)?;
        repository.extend(Self::from_toml_str(BUNDLED_PREVENT)?);
        Ok(repository)
    }

    /// The bundled repository, parsed on first use and shared for the life of the process.
    pub fn shared() -> Result<&'static Self, CoefficientError> {
        if let Some(repository) = SHARED.get() {
            return Ok(repository);
        }
        let repository = Self::bundled()?;
        Ok(SHARED.get_or_init(|| repository))
    }

    /// Parses one coefficient resource. A key defined twice in the same resource is an error.
    pub fn from_toml_str(text: &str) -> Result<Self, CoefficientError> {
        let file: CoefficientFile = toml::from_str(text)?;
        let mut repository = Self::default();

        for table in file.pooled_cohort {
            let key = TableKey::PooledCohort {
                horizon: table.horizon,
                sex: table.sex,
                race: table.race,
            };
            validate_baseline_survival(key, table.baseline_survival)?;
            insert_unique(&mut repository.pooled_cohort, key, table)?;
        }
        for table in file.revised_pooled_cohort {
            let key = TableKey::RevisedPooledCohort {
                horizon: table.horizon,
                sex: table.sex,
            };
            insert_unique(&mut repository.revised_pooled_cohort, key, table)?;
        }
        for table in file.prevent {
            let key = TableKey::Prevent {
                pred_type: table.pred_type,
                prevent_type: table.prevent_type,
                horizon: table.horizon,
                sex: table.sex,
            };
            insert_unique(&mut repository.prevent, key, table)?;
        }

        debug!(
            "Parsed coefficient resource: {} Goff_2013, {} Yadlowsky_2018, {} Khan_2023 tables",
            repository.pooled_cohort.len(),
            repository.revised_pooled_cohort.len(),
            repository.prevent.len()
        );
        Ok(repository)
    }

    pub fn load(path: &Path) -> Result<Self, CoefficientError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Adds every table of `other`, replacing tables that share a key.
    pub fn extend(&mut self, other: CoefficientRepository) {
        self.pooled_cohort.extend(other.pooled_cohort);
        self.revised_pooled_cohort
            .extend(other.revised_pooled_cohort);
        self.prevent.extend(other.prevent);
    }

    pub fn len(&self) -> usize {
        self.pooled_cohort.len() + self.revised_pooled_cohort.len() + self.prevent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: TableKey) -> bool {
        match key {
            TableKey::PooledCohort { .. } => self.pooled_cohort.contains_key(&key),
            TableKey::RevisedPooledCohort { .. } => self.revised_pooled_cohort.contains_key(&key),
            TableKey::Prevent { .. } => self.prevent.contains_key(&key),
        }
    }

    pub fn pooled_cohort(
        &self,
        horizon: Horizon,
        sex: Sex,
        race: Race,
    ) -> Result<&PooledCohortTable, CoefficientError> {
        let key = TableKey::PooledCohort { horizon, sex, race };
        self.pooled_cohort
            .get(&key)
            .ok_or(CoefficientError::MissingTable(key))
    }

    pub fn revised_pooled_cohort(
        &self,
        horizon: Horizon,
        sex: Sex,
    ) -> Result<&RevisedPooledCohortTable, CoefficientError> {
        let key = TableKey::RevisedPooledCohort { horizon, sex };
        self.revised_pooled_cohort
            .get(&key)
            .ok_or(CoefficientError::MissingTable(key))
    }

    pub fn prevent(
        &self,
        pred_type: PredType,
        prevent_type: PreventType,
        horizon: Horizon,
        sex: Sex,
    ) -> Result<&PreventTable, CoefficientError> {
        let key = TableKey::Prevent {
            pred_type,
            prevent_type,
            horizon,
            sex,
        };
        self.prevent
            .get(&key)
            .ok_or(CoefficientError::MissingTable(key))
    }
}

fn insert_unique<T>(
    map: &mut HashMap<TableKey, T>,
    key: TableKey,
    table: T,
) -> Result<(), CoefficientError> {
    if map.insert(key, table).is_some() {
        return Err(CoefficientError::DuplicateTable(key));
    }
    Ok(())
}

fn validate_baseline_survival(key: TableKey, value: f64) -> Result<(), CoefficientError> {
    if value > 0.0 && value < 1.0 {
        return Ok(());
    }
    Err(CoefficientError::InvalidTable {
        key,
        reason: format!("baseline survival {value} is not strictly between 0 and 1"),
    })
}
