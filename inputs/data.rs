//! # Covariate File Loading
//!
//! Reads a tab-separated covariate file into `RiskInputs`. Column names are not
//! configurable: each header must equal a covariate name (`age_years`, `sex`,
//! `chol_total_mgdl`, ...). Columns for covariates every equation reads must be
//! present; the others are picked up when present and left out otherwise. Empty and
//! `NA` cells are missing values. An optional `sample_id` column is carried through
//! for labelling the output.
//!
//! The file is only parsed here. Kinds, lengths, levels and ranges are checked by the
//! validator exactly as for in-memory callers.

use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

use super::column::RawColumn;
use super::prepare::RiskInputs;
use crate::types::Covariate;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "Required column '{0}' not found in the input file. Column names must match covariate names exactly."
    )]
    ColumnNotFound(String),
    #[error("Column '{column}' has type {dtype}, which is neither numeric, text nor logical.")]
    UnsupportedColumnType { column: String, dtype: String },
    #[error("The input file contains no rows.")]
    EmptyFile,
}

/// Covariates read from one file.
#[derive(Debug, Clone)]
pub struct CovariateTable {
    pub inputs: RiskInputs,
    /// Contents of the `sample_id` column, when the file has one.
    pub sample_ids: Option<Vec<String>>,
}

impl CovariateTable {
    pub fn len(&self) -> usize {
        self.inputs.age_years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn load_covariates(path: &Path) -> Result<CovariateTable, DataError> {
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(
                    CsvParseOptions::default()
                        .with_separator(b'\t')
                        .with_null_values(Some(NullValues::AllColumns(vec!["NA".into()]))),
                ),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyFile);
    }

    let present: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let has = |name: &str| present.iter().any(|column| column == name);

    let required = |covariate: Covariate| -> Result<RawColumn, DataError> {
        if !has(covariate.name()) {
            return Err(DataError::ColumnNotFound(covariate.name().to_string()));
        }
        to_raw_column(&df, covariate)
    };
    let optional = |covariate: Covariate| -> Result<Option<RawColumn>, DataError> {
        if has(covariate.name()) {
            to_raw_column(&df, covariate).map(Some)
        } else {
            Ok(None)
        }
    };

    let inputs = RiskInputs {
        age_years: required(Covariate::AgeYears)?,
        sex: required(Covariate::Sex)?,
        smoke_current: required(Covariate::SmokeCurrent)?,
        chol_total_mgdl: required(Covariate::CholTotal)?,
        chol_hdl_mgdl: required(Covariate::CholHdl)?,
        bp_sys_mmhg: required(Covariate::BpSys)?,
        bp_meds: required(Covariate::BpMeds)?,
        diabetes: required(Covariate::Diabetes)?,
        race: optional(Covariate::Race)?,
        statin_meds: optional(Covariate::StatinMeds)?,
        bmi: optional(Covariate::Bmi)?,
        egfr_mlminm2: optional(Covariate::Egfr)?,
        acr: optional(Covariate::Acr)?,
        hba1c: optional(Covariate::Hba1c)?,
        sdi: optional(Covariate::Sdi)?,
    };

    let sample_ids = if has("sample_id") {
        Some(build_sample_ids(&df)?)
    } else {
        None
    };

    Ok(CovariateTable { inputs, sample_ids })
}

/// Converts one column to its runtime kind. A column with no values at all carries no
/// type information and is read as the kind its covariate expects.
fn to_raw_column(df: &DataFrame, covariate: Covariate) -> Result<RawColumn, DataError> {
    let series = df.column(covariate.name())?.as_materialized_series();
    let n = series.len();
    if series.null_count() == n {
        return Ok(if covariate.is_categorical() {
            RawColumn::Text(vec![None; n])
        } else {
            RawColumn::Float(vec![None; n])
        });
    }

    let dtype = series.dtype();
    let column = match dtype {
        DataType::Float32 | DataType::Float64 => {
            let casted = series.cast(&DataType::Float64)?;
            RawColumn::Float(casted.f64()?.into_iter().collect())
        }
        dtype if dtype.is_integer() => {
            let casted = series.cast(&DataType::Int64)?;
            RawColumn::Integer(casted.i64()?.into_iter().collect())
        }
        DataType::Boolean => RawColumn::Logical(series.bool()?.into_iter().collect()),
        DataType::String => RawColumn::Text(
            series
                .str()?
                .into_iter()
                .map(|value| value.map(str::to_string))
                .collect(),
        ),
        other => {
            return Err(DataError::UnsupportedColumnType {
                column: covariate.name().to_string(),
                dtype: format!("{other:?}"),
            });
        }
    };
    Ok(column)
}

/// Missing identifiers fall back to the 1-based row number.
fn build_sample_ids(df: &DataFrame) -> Result<Vec<String>, DataError> {
    let series = df.column("sample_id")?.as_materialized_series();
    let mut ids = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        let value = series.get(i)?;
        ids.push(match value {
            AnyValue::Null => (i + 1).to_string(),
            AnyValue::String(text) => text.to_string(),
            AnyValue::StringOwned(text) => text.to_string(),
            other => other.to_string(),
        });
    }
    Ok(ids)
}
