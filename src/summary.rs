//! Final summary table handed to the charting layer.
//!
//! The column set is fixed by configuration, not by the data: `region`,
//! `year`, then every requested indicator in order, even when a filter left
//! an indicator with no present values. Absent cells render as empty CSV
//! fields, `null` in JSON and blank table cells.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    aggregate::{AggregatedRecord, RESERVED_COLUMNS},
    error::SchemaError,
    region::Region,
    table::{self, Alignment},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub region: Region,
    pub year: i32,
    /// One value per indicator column, in column order.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    indicators: Vec<String>,
    rows: Vec<SummaryRow>,
}

pub struct SummaryBuilder;

impl SummaryBuilder {
    /// Lays `aggregated` out under `region`, `year` and `required_columns`.
    ///
    /// Repeated names are kept once. An indicator missing from an aggregated
    /// record yields an absent cell.
    pub fn build(
        aggregated: &[AggregatedRecord],
        required_columns: &[String],
    ) -> Result<SummaryTable, SchemaError> {
        let mut indicators: Vec<String> = Vec::with_capacity(required_columns.len());
        for column in required_columns {
            if RESERVED_COLUMNS
                .iter()
                .any(|reserved| column.eq_ignore_ascii_case(reserved))
            {
                return Err(SchemaError::ReservedColumn(column.clone()));
            }
            if !indicators.contains(column) {
                indicators.push(column.clone());
            }
        }

        let rows = aggregated
            .iter()
            .map(|record| SummaryRow {
                region: record.region(),
                year: record.year(),
                values: indicators.iter().map(|name| record.value(name)).collect(),
            })
            .collect();
        Ok(SummaryTable { indicators, rows })
    }
}

impl SummaryTable {
    pub fn headers(&self) -> Vec<String> {
        RESERVED_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .chain(self.indicators.iter().cloned())
            .collect()
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one indicator column, top to bottom.
    pub fn column(&self, indicator: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.indicators.iter().position(|name| name == indicator)?;
        Some(self.rows.iter().map(|row| row.values[idx]).collect())
    }

    pub fn get(&self, region: Region, year: i32, indicator: &str) -> Option<f64> {
        let idx = self.indicators.iter().position(|name| name == indicator)?;
        self.rows
            .iter()
            .find(|row| row.region == region && row.year == year)
            .and_then(|row| row.values[idx])
    }

    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                let mut cells = Vec::with_capacity(row.values.len() + 2);
                cells.push(row.region.to_string());
                cells.push(row.year.to_string());
                cells.extend(row.values.iter().map(|value| format_value(*value)));
                cells
            })
            .collect()
    }

    pub fn render_table(&self) -> String {
        let headers = self.headers();
        let mut alignments = vec![Alignment::Right; headers.len()];
        alignments[0] = Alignment::Left;
        table::render_table_aligned(&headers, &self.render_rows(), &alignments)
    }

    pub fn to_json(&self) -> JsonValue {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                object.insert("region".into(), JsonValue::String(row.region.to_string()));
                object.insert("year".into(), JsonValue::from(row.year));
                for (name, value) in self.indicators.iter().zip(&row.values) {
                    let cell = value.map(JsonValue::from).unwrap_or(JsonValue::Null);
                    object.insert(name.clone(), cell);
                }
                JsonValue::Object(object)
            })
            .collect();
        JsonValue::Array(rows)
    }
}

/// Whole numbers print without a fractional part; absent prints as empty.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => v.to_string(),
    }
}
