//! Dynamically-kinded covariate vectors.
//!
//! Covariates reach the engine from loosely typed sources (tabular files, foreign
//! callers), so each one is carried as a `RawColumn` whose runtime kind is checked
//! before anything is computed. `None` entries are missing values.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RawColumn {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Logical(Vec<Option<bool>>),
}

/// The runtime kind of a column. `Integer` and `Float` are both numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Logical,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "double",
            ColumnKind::Text => "character",
            ColumnKind::Logical => "logical",
        };
        f.write_str(label)
    }
}

impl RawColumn {
    pub fn kind(&self) -> ColumnKind {
        match self {
            RawColumn::Integer(_) => ColumnKind::Integer,
            RawColumn::Float(_) => ColumnKind::Float,
            RawColumn::Text(_) => ColumnKind::Text,
            RawColumn::Logical(_) => ColumnKind::Logical,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawColumn::Integer(v) => v.len(),
            RawColumn::Float(v) => v.len(),
            RawColumn::Text(v) => v.len(),
            RawColumn::Logical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            RawColumn::Integer(v) => v[row].is_none(),
            RawColumn::Float(v) => v[row].map_or(true, f64::is_nan),
            RawColumn::Text(v) => v[row].is_none(),
            RawColumn::Logical(v) => v[row].is_none(),
        }
    }

    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&row| self.is_missing(row)).count()
    }

    /// Numeric view of the column. Integers are widened; NaN is treated as missing.
    /// Returns `None` for non-numeric kinds.
    pub fn as_numeric(&self) -> Option<Vec<Option<f64>>> {
        match self {
            RawColumn::Integer(v) => Some(v.iter().map(|x| x.map(|i| i as f64)).collect()),
            RawColumn::Float(v) => Some(
                v.iter()
                    .map(|x| x.filter(|value| !value.is_nan()))
                    .collect(),
            ),
            RawColumn::Text(_) | RawColumn::Logical(_) => None,
        }
    }

    /// Text rendering used for alias matching of categorical columns.
    /// Returns `None` for floating-point columns.
    pub fn as_labels(&self) -> Option<Vec<Option<String>>> {
        match self {
            RawColumn::Text(v) => Some(v.clone()),
            RawColumn::Integer(v) => Some(v.iter().map(|x| x.map(|i| i.to_string())).collect()),
            RawColumn::Logical(v) => Some(v.iter().map(|x| x.map(|b| b.to_string())).collect()),
            RawColumn::Float(_) => None,
        }
    }

    /// Repeats a length-1 column `n` times. Columns of any other length are returned
    /// unchanged, so unequal lengths still surface in validation.
    pub fn broadcast(self, n: usize) -> RawColumn {
        if self.len() != 1 {
            return self;
        }
        match self {
            RawColumn::Integer(v) => RawColumn::Integer(vec![v[0]; n]),
            RawColumn::Float(v) => RawColumn::Float(vec![v[0]; n]),
            RawColumn::Text(v) => RawColumn::Text(vec![v[0].clone(); n]),
            RawColumn::Logical(v) => RawColumn::Logical(vec![v[0]; n]),
        }
    }

    /// Reorders rows so that row `i` of the result is row `order[i]` of `self`.
    pub fn take(&self, order: &[usize]) -> RawColumn {
        match self {
            RawColumn::Integer(v) => RawColumn::Integer(order.iter().map(|&i| v[i]).collect()),
            RawColumn::Float(v) => RawColumn::Float(order.iter().map(|&i| v[i]).collect()),
            RawColumn::Text(v) => {
                RawColumn::Text(order.iter().map(|&i| v[i].clone()).collect())
            }
            RawColumn::Logical(v) => RawColumn::Logical(order.iter().map(|&i| v[i]).collect()),
        }
    }
}

impl From<Vec<f64>> for RawColumn {
    fn from(values: Vec<f64>) -> Self {
        RawColumn::Float(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<f64>>> for RawColumn {
    fn from(values: Vec<Option<f64>>) -> Self {
        RawColumn::Float(values)
    }
}

impl From<Vec<i64>> for RawColumn {
    fn from(values: Vec<i64>) -> Self {
        RawColumn::Integer(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<bool>> for RawColumn {
    fn from(values: Vec<bool>) -> Self {
        RawColumn::Logical(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for RawColumn {
    fn from(values: Vec<&str>) -> Self {
        RawColumn::Text(values.into_iter().map(|v| Some(v.to_string())).collect())
    }
}

impl From<Vec<Option<&str>>> for RawColumn {
    fn from(values: Vec<Option<&str>>) -> Self {
        RawColumn::Text(values.into_iter().map(|v| v.map(str::to_string)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_view_unifies_integer_and_float() {
        let ints = RawColumn::from(vec![40_i64, 55]);
        let floats = RawColumn::from(vec![40.0, 55.0]);
        assert_eq!(ints.as_numeric(), floats.as_numeric());
        assert!(RawColumn::from(vec!["a"]).as_numeric().is_none());
    }

    #[test]
    fn nan_counts_as_missing() {
        let column = RawColumn::Float(vec![Some(1.0), Some(f64::NAN), None]);
        assert_eq!(column.missing_count(), 2);
        assert_eq!(column.as_numeric().unwrap(), vec![Some(1.0), None, None]);
    }

    #[test]
    fn broadcast_only_expands_length_one() {
        let single = RawColumn::from(vec!["female"]).broadcast(3);
        assert_eq!(single.len(), 3);
        let pair = RawColumn::from(vec!["female", "male"]).broadcast(3);
        assert_eq!(pair.len(), 2);
    }

    #[test]
    fn labels_render_integers_and_logicals() {
        let ints = RawColumn::Integer(vec![Some(1), None]);
        assert_eq!(
            ints.as_labels().unwrap(),
            vec![Some("1".to_string()), None]
        );
        let flags = RawColumn::from(vec![true]);
        assert_eq!(flags.as_labels().unwrap(), vec![Some("true".to_string())]);
        assert!(RawColumn::from(vec![1.0]).as_labels().is_none());
    }
}
