//! # Category Normalization
//!
//! Categorical covariates arrive in whatever spelling the caller's data uses
//! ("F", "Female", "woman", `1`, `true`). A `LevelMap` maps each canonical level of a
//! variable to an ordered set of accepted aliases, and `normalize` rewrites a raw
//! vector into canonical names before anything else looks at it.
//!
//! Matching is case-insensitive and ignores surrounding whitespace for every
//! variable. Values that match no alias are passed through untouched so that the
//! category check can report them; missing values stay missing.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::validate::{ValidationError, check_length};
use crate::types::{Covariate, Race, Sex};

/// Malformed level-map configuration.
#[derive(Debug, Error, PartialEq)]
pub enum LevelMapError {
    #[error(
        "The level map for '{variable}' must define exactly {expected} canonical levels, but {found} were given."
    )]
    WrongLevelCount {
        variable: &'static str,
        expected: usize,
        found: usize,
    },
    #[error(
        "The level map for '{variable}' must use the canonical names {expected:?}, but found {found:?}."
    )]
    WrongLevelNames {
        variable: &'static str,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("The level '{level}' of '{variable}' has no accepted aliases.")]
    EmptyAliasSet { variable: &'static str, level: String },
    #[error(
        "The alias '{alias}' of '{variable}' is claimed by both '{first}' and '{second}'."
    )]
    AmbiguousAlias {
        variable: &'static str,
        alias: String,
        first: String,
        second: String,
    },
}

/// A categorical variable with a fixed set of canonical levels.
pub trait CanonicalLevel: Sized + Copy {
    const COVARIATE: Covariate;

    /// Canonical level names, in the order they are reported to users.
    fn levels() -> &'static [&'static str];

    fn from_canonical(name: &str) -> Option<Self>;
}

impl CanonicalLevel for Sex {
    const COVARIATE: Covariate = Covariate::Sex;

    fn levels() -> &'static [&'static str] {
        &["female", "male"]
    }

    fn from_canonical(name: &str) -> Option<Self> {
        match name {
            "female" => Some(Sex::Female),
            "male" => Some(Sex::Male),
            _ => None,
        }
    }
}

impl CanonicalLevel for Race {
    const COVARIATE: Covariate = Covariate::Race;

    fn levels() -> &'static [&'static str] {
        &["black", "white"]
    }

    fn from_canonical(name: &str) -> Option<Self> {
        match name {
            "black" => Some(Race::Black),
            "white" => Some(Race::White),
            _ => None,
        }
    }
}

/// Canonical yes/no answer shared by the smoking, medication and diabetes variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YesNo(pub bool);

impl YesNo {
    pub const LEVELS: [&'static str; 2] = ["no", "yes"];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "no" => Some(YesNo(false)),
            "yes" => Some(YesNo(true)),
            _ => None,
        }
    }

    #[inline]
    pub fn indicator(self) -> f64 {
        if self.0 { 1.0 } else { 0.0 }
    }
}

/// Canonical level name to the aliases accepted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelMap {
    pub levels: BTreeMap<String, Vec<String>>,
}

impl LevelMap {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let levels = entries
            .into_iter()
            .map(|(name, aliases)| (name.into(), aliases.into_iter().map(Into::into).collect()))
            .collect();
        Self { levels }
    }

    fn yes_no() -> Self {
        Self::new([
            ("no", vec!["no", "n", "false", "0"]),
            ("yes", vec!["yes", "y", "true", "1"]),
        ])
    }

    /// Checks the map against the canonical names of `variable` and builds the
    /// case-folded alias lookup used by `normalize`.
    pub fn compile(
        &self,
        variable: Covariate,
        expected: &[&str],
    ) -> Result<CompiledLevelMap, LevelMapError> {
        let name = variable.name();
        if check_length(name, self.levels.len(), expected.len()).is_err() {
            return Err(LevelMapError::WrongLevelCount {
                variable: name,
                expected: expected.len(),
                found: self.levels.len(),
            });
        }

        let mut wanted: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        wanted.sort_unstable();
        let found: Vec<String> = self.levels.keys().cloned().collect();
        if wanted != found {
            return Err(LevelMapError::WrongLevelNames {
                variable: name,
                expected: wanted,
                found,
            });
        }

        let mut lookup: AHashMap<String, String> = AHashMap::new();
        for (level, aliases) in &self.levels {
            if aliases.is_empty() {
                return Err(LevelMapError::EmptyAliasSet {
                    variable: name,
                    level: level.clone(),
                });
            }
            for alias in aliases {
                let key = fold(alias);
                if let Some(previous) = lookup.get(&key) {
                    if previous != level {
                        return Err(LevelMapError::AmbiguousAlias {
                            variable: name,
                            alias: alias.clone(),
                            first: previous.clone(),
                            second: level.clone(),
                        });
                    }
                    continue;
                }
                lookup.insert(key, level.clone());
            }
        }

        Ok(CompiledLevelMap {
            variable,
            allowed: expected.iter().map(|s| s.to_string()).collect(),
            lookup,
        })
    }
}

/// A validated level map ready to rewrite raw values.
#[derive(Debug, Clone)]
pub struct CompiledLevelMap {
    variable: Covariate,
    allowed: Vec<String>,
    lookup: AHashMap<String, String>,
}

impl CompiledLevelMap {
    pub fn variable(&self) -> Covariate {
        self.variable
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Rewrites matched values to their canonical name. Unmatched values are
    /// returned as given; missing values stay missing.
    pub fn normalize(&self, raw: &[Option<String>]) -> Vec<Option<String>> {
        raw.iter()
            .map(|value| {
                value.as_ref().map(|v| match self.lookup.get(&fold(v)) {
                    Some(canonical) => canonical.clone(),
                    None => v.clone(),
                })
            })
            .collect()
    }
}

fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

/// The full set of level maps for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelMaps {
    pub sex: LevelMap,
    pub race: LevelMap,
    pub smoke_current: LevelMap,
    pub bp_meds: LevelMap,
    pub statin_meds: LevelMap,
    pub diabetes: LevelMap,
}

impl Default for LevelMaps {
    fn default() -> Self {
        Self {
            sex: LevelMap::new([
                ("female", vec!["female", "f", "woman", "women"]),
                ("male", vec!["male", "m", "man", "men"]),
            ]),
            // Races other than black are scored with the white equations.
            race: LevelMap::new([
                ("black", vec!["black", "aa", "african american", "african-american"]),
                ("white", vec!["white", "caucasian", "other"]),
            ]),
            smoke_current: LevelMap::yes_no(),
            bp_meds: LevelMap::yes_no(),
            statin_meds: LevelMap::yes_no(),
            diabetes: LevelMap::yes_no(),
        }
    }
}

impl LevelMaps {
    pub fn for_covariate(&self, covariate: Covariate) -> Option<&LevelMap> {
        match covariate {
            Covariate::Sex => Some(&self.sex),
            Covariate::Race => Some(&self.race),
            Covariate::SmokeCurrent => Some(&self.smoke_current),
            Covariate::BpMeds => Some(&self.bp_meds),
            Covariate::StatinMeds => Some(&self.statin_meds),
            Covariate::Diabetes => Some(&self.diabetes),
            _ => None,
        }
    }

    /// Parses a TOML document with one table per categorical variable. Variables
    /// that are not mentioned keep their default map.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Canonical names that `covariate` is normalized into.
pub fn canonical_levels(covariate: Covariate) -> &'static [&'static str] {
    match covariate {
        Covariate::Sex => Sex::levels(),
        Covariate::Race => Race::levels(),
        _ => &YesNo::LEVELS,
    }
}

/// Converts canonical names into typed levels. Must only be called on vectors that
/// passed the category check; any other value is reported as an invalid category.
pub fn into_typed<T, F>(
    variable: Covariate,
    canonical: &[Option<String>],
    parse: F,
) -> Result<Vec<Option<T>>, ValidationError>
where
    F: Fn(&str) -> Option<T>,
{
    canonical
        .iter()
        .map(|value| match value {
            None => Ok(None),
            Some(name) => parse(name).map(Some).ok_or_else(|| {
                ValidationError::InvalidCategory {
                    variable: variable.name(),
                    allowed: canonical_levels(variable)
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    offending: vec![name.clone()],
                }
            }),
        })
        .collect()
}
