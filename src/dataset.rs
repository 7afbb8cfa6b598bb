//! Tabular input and the typed records produced from it.
//!
//! [`RawTable`] is what the data-source collaborator hands over: a header and
//! string cells. [`crate::validate::RecordValidator`] turns it into a
//! [`ValidatedDataset`] of [`IndicatorRecord`]s, where every indicator value is
//! either a number or explicitly absent.

use std::{collections::BTreeMap, io::Read, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use serde::Serialize;

use crate::{io_utils, validate::ValidationReport};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<H, S>(headers: H) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; short rows are read as if padded with empty cells.
    pub fn push_row<R, S>(&mut self, row: R)
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn with_row<R, S>(mut self, row: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_row(row);
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn from_csv_reader<R: Read>(
        reader: &mut csv::Reader<R>,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let headers = io_utils::reader_headers(reader, encoding)?;
        let mut table = RawTable {
            headers,
            rows: Vec::new(),
        };
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {}", row_idx + 2))?;
            table.rows.push(decoded);
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        Self::from_csv_reader(&mut reader, encoding)
            .with_context(|| format!("Reading indicator table {path:?}"))
    }
}

/// One country-year observation. A `None` value means the source reported
/// no data for that indicator; it is never treated as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRecord {
    pub country: String,
    pub year: i32,
    pub indicators: BTreeMap<String, Option<f64>>,
}

impl IndicatorRecord {
    pub fn new(country: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            year,
            indicators: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, indicator: impl Into<String>, value: impl Into<Option<f64>>) -> Self {
        self.indicators.insert(indicator.into(), value.into());
        self
    }

    /// Present value of `indicator`, or `None` when absent or not recorded.
    pub fn value(&self, indicator: &str) -> Option<f64> {
        self.indicators.get(indicator).copied().flatten()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedDataset {
    /// Indicator columns in input header order.
    pub indicators: Vec<String>,
    pub records: Vec<IndicatorRecord>,
    pub report: ValidationReport,
}
