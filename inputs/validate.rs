//! Composable input checks.
//!
//! Every check is a pure function returning `Result<(), ValidationError>`; the engine
//! chains them with `?` so the first failure aborts the call. `check_missing` is the
//! exception: missing data never fails a call, it produces a `MissingDataReport`.

use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::column::{ColumnKind, RawColumn};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("'{variable}' has type '{found}', but one of [{expected}] is required.")]
    TypeMismatch {
        variable: &'static str,
        found: ColumnKind,
        expected: String,
    },
    #[error(
        "Inputs must all have length {expected} (length-1 inputs must be broadcast explicitly). Observed lengths: {}",
        format_lengths(.lengths)
    )]
    LengthMismatch {
        expected: usize,
        lengths: Vec<(&'static str, usize)>,
    },
    #[error(
        "'{variable}' has values outside its recommended range [{lower}, {upper}] (observed minimum {observed_min}, maximum {observed_max}); the violated bound is {violated}. Set override_boundary_errors to compute anyway."
    )]
    BoundsViolation {
        variable: &'static str,
        observed_min: f64,
        observed_max: f64,
        lower: f64,
        upper: f64,
        violated: ViolatedBound,
    },
    #[error(
        "'{variable}' contains values that are not allowed: [{}]. Allowed values are: [{}].",
        .offending.join(", "),
        .allowed.join(", ")
    )]
    InvalidCategory {
        variable: &'static str,
        allowed: Vec<String>,
        offending: Vec<String>,
    },
}

fn format_lengths(lengths: &[(&'static str, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{name} = {len}"))
        .join(", ")
}

/// Which side of a recommended range was crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViolatedBound {
    Lower(f64),
    Upper(f64),
}

impl fmt::Display for ViolatedBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolatedBound::Lower(bound) => write!(f, "the lower bound {bound}"),
            ViolatedBound::Upper(bound) => write!(f, "the upper bound {bound}"),
        }
    }
}

pub fn check_type(
    variable: &'static str,
    column: &RawColumn,
    expected: &[ColumnKind],
) -> Result<(), ValidationError> {
    let found = column.kind();
    let accepted = expected
        .iter()
        .any(|&kind| kind == found || (kind == ColumnKind::Float && found.is_numeric()));
    if accepted {
        return Ok(());
    }
    Err(ValidationError::TypeMismatch {
        variable,
        found,
        expected: expected.iter().map(ToString::to_string).join(", "),
    })
}

pub fn check_length(
    variable: &'static str,
    found: usize,
    expected: usize,
) -> Result<(), ValidationError> {
    if found == expected {
        Ok(())
    } else {
        Err(ValidationError::LengthMismatch {
            expected,
            lengths: vec![(variable, found)],
        })
    }
}

/// Returns the shared length of all columns. No broadcasting happens here.
pub fn check_equal_lengths(columns: &[(&'static str, &RawColumn)]) -> Result<usize, ValidationError> {
    let Some((_, first)) = columns.first() else {
        return Ok(0);
    };
    let expected = first.len();
    let all_equal = columns
        .iter()
        .all(|(name, column)| check_length(*name, column.len(), expected).is_ok());
    if all_equal {
        return Ok(expected);
    }
    Err(ValidationError::LengthMismatch {
        expected,
        lengths: columns
            .iter()
            .map(|(name, column)| (*name, column.len()))
            .collect(),
    })
}

/// Checks non-missing entries against `[lower, upper]`. A vector that is entirely
/// missing passes.
pub fn check_bounds(
    variable: &'static str,
    values: &[Option<f64>],
    lower: f64,
    upper: f64,
) -> Result<(), ValidationError> {
    let (observed_min, observed_max) = values
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if observed_min > observed_max {
        return Ok(());
    }
    let violated = if observed_min < lower {
        ViolatedBound::Lower(lower)
    } else if observed_max > upper {
        ViolatedBound::Upper(upper)
    } else {
        return Ok(());
    };
    Err(ValidationError::BoundsViolation {
        variable,
        observed_min,
        observed_max,
        lower,
        upper,
        violated,
    })
}

pub fn check_category(
    variable: &'static str,
    values: &[Option<String>],
    allowed: &[String],
) -> Result<(), ValidationError> {
    let offending: Vec<String> = values
        .iter()
        .flatten()
        .filter(|v| !allowed.contains(*v))
        .unique()
        .cloned()
        .collect();
    if offending.is_empty() {
        return Ok(());
    }
    Err(ValidationError::InvalidCategory {
        variable,
        allowed: allowed.to_vec(),
        offending,
    })
}

/// Summary of missing data among covariates whose missingness reaches the output.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingDataReport {
    /// Missing count per variable, only for variables with at least one missing entry.
    pub missing_by_variable: BTreeMap<&'static str, usize>,
    /// Rows missing in any of the checked variables; these rows come out as NaN.
    pub missing_rows: usize,
}

impl fmt::Display for MissingDataReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_variable = self
            .missing_by_variable
            .iter()
            .map(|(name, count)| format!("{name} ({count} missing)"))
            .join(", ");
        write!(
            f,
            "Missing values were found in: {per_variable}. {} output row(s) will be missing.",
            self.missing_rows
        )
    }
}

/// Counts missing entries. Returns `None` when nothing is missing; otherwise the
/// caller surfaces the report as its single warning for the call.
pub fn check_missing(columns: &[(&'static str, &RawColumn)], n_rows: usize) -> Option<MissingDataReport> {
    let mut missing_by_variable = BTreeMap::new();
    for (name, column) in columns {
        let count = column.missing_count();
        if count > 0 {
            missing_by_variable.insert(*name, count);
        }
    }
    if missing_by_variable.is_empty() {
        return None;
    }
    let missing_rows = (0..n_rows)
        .filter(|&row| columns.iter().any(|(_, column)| column.is_missing(row)))
        .count();
    Some(MissingDataReport {
        missing_by_variable,
        missing_rows,
    })
}
