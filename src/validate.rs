//! Schema checks and row-level validation of raw indicator tables.
//!
//! Structural problems (no country column, no date/year column, no indicator
//! columns) fail with a [`SchemaError`] before any row is read. Row problems
//! never fail the run:
//!
//! - a row without a country or a usable date is dropped and listed in
//!   [`ValidationReport::dropped`]
//! - an indicator cell holding a missing-value sentinel becomes absent
//! - an indicator cell that is neither a sentinel nor a number becomes absent
//!   and is listed in [`ValidationReport::flagged`]
//!
//! A row missing one indicator still contributes to every other indicator.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;

use crate::{
    dataset::{IndicatorRecord, RawTable, ValidatedDataset},
    error::SchemaError,
};

pub const DEFAULT_COUNTRY_COLUMN: &str = "country";
pub const DATE_COLUMN_CANDIDATES: &[&str] = &["date", "year"];
pub const DEFAULT_MISSING_VALUES: &[&str] =
    &["", "NA", "N/A", "n.a.", "null", "none", "NaN", ".."];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Matched against headers ignoring case and surrounding whitespace.
    pub country_column: String,
    /// Explicit date/year column, matched like `country_column`; when unset
    /// the first header matching [`DATE_COLUMN_CANDIDATES`] is used.
    pub date_column: Option<String>,
    /// Explicit indicator columns, matched exactly since they name output
    /// columns. When unset every remaining all-numeric column with a
    /// non-blank header is treated as an indicator.
    pub indicator_columns: Option<Vec<String>>,
    pub missing_values: Vec<String>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            country_column: DEFAULT_COUNTRY_COLUMN.to_string(),
            date_column: None,
            indicator_columns: None,
            missing_values: DEFAULT_MISSING_VALUES
                .iter()
                .map(|token| token.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DropReason {
    MissingCountry,
    MissingDate,
    InvalidDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    /// Line number in the source file, counting the header as line 1.
    pub line: usize,
    pub reason: DropReason,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedCell {
    pub line: usize,
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub absent_values: usize,
    pub dropped: Vec<DroppedRow>,
    pub flagged: Vec<FlaggedCell>,
    /// Non-indicator columns skipped during indicator inference.
    pub ignored_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RecordValidator {
    options: ValidatorOptions,
    missing: HashSet<String>,
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new(ValidatorOptions::default())
    }
}

struct ColumnLayout {
    country: usize,
    date: usize,
    indicators: Vec<(usize, String)>,
    ignored: Vec<String>,
}

impl RecordValidator {
    pub fn new(options: ValidatorOptions) -> Self {
        let missing = options
            .missing_values
            .iter()
            .map(|token| token.trim().to_ascii_lowercase())
            .collect();
        Self { options, missing }
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn is_missing(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        trimmed.is_empty() || self.missing.contains(&trimmed.to_ascii_lowercase())
    }

    pub fn validate(&self, table: &RawTable) -> Result<ValidatedDataset, SchemaError> {
        let layout = self.resolve_layout(table)?;
        let mut report = ValidationReport {
            rows_read: table.len(),
            ignored_columns: layout.ignored.clone(),
            ..ValidationReport::default()
        };
        let mut records = Vec::with_capacity(table.len());

        for row_idx in 0..table.len() {
            let line = row_idx + 2;
            let country = table.cell(row_idx, layout.country);
            if self.is_missing(country) {
                report.dropped.push(DroppedRow {
                    line,
                    reason: DropReason::MissingCountry,
                    value: country.to_string(),
                });
                continue;
            }
            let raw_date = table.cell(row_idx, layout.date);
            if self.is_missing(raw_date) {
                report.dropped.push(DroppedRow {
                    line,
                    reason: DropReason::MissingDate,
                    value: raw_date.to_string(),
                });
                continue;
            }
            let Some(year) = parse_year(raw_date) else {
                report.dropped.push(DroppedRow {
                    line,
                    reason: DropReason::InvalidDate,
                    value: raw_date.to_string(),
                });
                continue;
            };

            let mut record = IndicatorRecord::new(country, year);
            for (column, name) in &layout.indicators {
                let raw = table.cell(row_idx, *column);
                let value = if self.is_missing(raw) {
                    None
                } else {
                    let parsed = parse_number(raw);
                    if parsed.is_none() {
                        report.flagged.push(FlaggedCell {
                            line,
                            column: name.clone(),
                            value: raw.to_string(),
                        });
                    }
                    parsed
                };
                if value.is_none() {
                    report.absent_values += 1;
                }
                record.indicators.insert(name.clone(), value);
            }
            records.push(record);
        }

        report.rows_kept = records.len();
        info!(
            "Validated {} of {} row(s): {} dropped, {} flagged cell(s), {} absent value(s)",
            report.rows_kept,
            report.rows_read,
            report.dropped.len(),
            report.flagged.len(),
            report.absent_values
        );
        Ok(ValidatedDataset {
            indicators: layout.indicators.into_iter().map(|(_, name)| name).collect(),
            records,
            report,
        })
    }

    fn resolve_layout(&self, table: &RawTable) -> Result<ColumnLayout, SchemaError> {
        if table.headers.is_empty() {
            return Err(SchemaError::NoHeaders);
        }
        if let Some(duplicate) = table.headers.iter().duplicates().next() {
            return Err(SchemaError::DuplicateColumn(duplicate.clone()));
        }

        let country = find_column(table, &self.options.country_column)
            .ok_or_else(|| SchemaError::MissingCountryColumn(self.options.country_column.clone()))?;

        let date = match &self.options.date_column {
            Some(name) => find_column(table, name)
                .ok_or_else(|| SchemaError::MissingDateColumn(vec![name.clone()]))?,
            None => DATE_COLUMN_CANDIDATES
                .iter()
                .find_map(|candidate| find_column(table, candidate))
                .ok_or_else(|| {
                    SchemaError::MissingDateColumn(
                        DATE_COLUMN_CANDIDATES.iter().map(|c| c.to_string()).collect(),
                    )
                })?,
        };

        let mut indicators = Vec::new();
        let mut ignored = Vec::new();
        match &self.options.indicator_columns {
            Some(names) => {
                for name in names {
                    let idx = table
                        .column_index(name)
                        .ok_or_else(|| SchemaError::MissingIndicatorColumn(name.clone()))?;
                    indicators.push((idx, name.clone()));
                }
            }
            None => {
                for (idx, header) in table.headers.iter().enumerate() {
                    if idx == country || idx == date || is_date_like_header(header) {
                        continue;
                    }
                    if header.trim().is_empty() {
                        debug!("Column {} has a blank header; not an indicator", idx + 1);
                        ignored.push(header.clone());
                        continue;
                    }
                    if self.column_is_numeric(table, idx) {
                        indicators.push((idx, header.clone()));
                    } else {
                        debug!("Column '{header}' holds non-numeric values; not an indicator");
                        ignored.push(header.clone());
                    }
                }
            }
        }
        if indicators.is_empty() {
            return Err(SchemaError::NoIndicatorColumns);
        }
        debug!(
            "Country column '{}', date column '{}', indicators [{}]",
            table.headers[country],
            table.headers[date],
            indicators.iter().map(|(_, name)| name.as_str()).join(", ")
        );
        Ok(ColumnLayout {
            country,
            date,
            indicators,
            ignored,
        })
    }

    fn column_is_numeric(&self, table: &RawTable, column: usize) -> bool {
        (0..table.len()).all(|row| {
            let raw = table.cell(row, column);
            self.is_missing(raw) || parse_number(raw).is_some()
        })
    }
}

fn find_column(table: &RawTable, name: &str) -> Option<usize> {
    let name = name.trim();
    table
        .headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn is_date_like_header(header: &str) -> bool {
    DATE_COLUMN_CANDIDATES
        .iter()
        .any(|candidate| header.trim().eq_ignore_ascii_case(candidate))
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Extracts a calendar year from an integer year (`2018`, `2018.0`), a date
/// (`2018-01-01`, `01/02/2018`), a year-month (`2018-01`) or a timestamp.
pub fn parse_year(raw: &str) -> Option<i32> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(year) = value.parse::<i32>() {
        return Some(year);
    }
    if let Some((whole, fraction)) = value.split_once('.') {
        if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') {
            return whole.parse::<i32>().ok();
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date.year());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(datetime.year());
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.year());
    }
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
        .ok()
        .map(|date| date.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration_table() -> RawTable {
        RawTable::new(["country", "date", "Net Migration", "Urban Population Growth"])
            .with_row(["Canada", "2018-01-01", "1000", "1.2"])
            .with_row(["Mexico", "2018", "..", "1.8"])
            .with_row(["", "2018", "5", "5"])
            .with_row(["Chile", "", "5", "5"])
            .with_row(["Peru", "someday", "5", "5"])
            .with_row(["Brazil", "2019", "lots", "0.9"])
    }

    fn explicit_validator() -> RecordValidator {
        RecordValidator::new(ValidatorOptions {
            indicator_columns: Some(vec!["Net Migration".into(), "Urban Population Growth".into()]),
            ..ValidatorOptions::default()
        })
    }

    #[test]
    fn parse_year_accepts_integers_dates_and_timestamps() {
        assert_eq!(parse_year("2018"), Some(2018));
        assert_eq!(parse_year(" 2018.0 "), Some(2018));
        assert_eq!(parse_year("2018-01-01"), Some(2018));
        assert_eq!(parse_year("25/12/2018"), Some(2018));
        assert_eq!(parse_year("12/25/2018"), Some(2018));
        assert_eq!(parse_year("2018-01-01T00:00:00"), Some(2018));
        assert_eq!(parse_year("2018-06-30T12:00:00+02:00"), Some(2018));
        assert_eq!(parse_year("2018-06"), Some(2018));
        assert_eq!(parse_year("2018.5"), None);
        assert_eq!(parse_year("someday"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn parse_year_rejects_exponent_notation() {
        assert_eq!(parse_year("2018.00"), Some(2018));
        assert_eq!(parse_year("1e3"), None);
        assert_eq!(parse_year("2.018e3"), None);
        assert_eq!(parse_year("2018e0"), None);
        assert_eq!(parse_year(".0"), None);
    }

    #[test]
    fn drops_rows_without_country_or_usable_date() {
        let dataset = explicit_validator()
            .validate(&migration_table())
            .expect("valid schema");
        let reasons: Vec<_> = dataset
            .report
            .dropped
            .iter()
            .map(|row| (row.line, row.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (4, DropReason::MissingCountry),
                (5, DropReason::MissingDate),
                (6, DropReason::InvalidDate),
            ]
        );
        assert_eq!(dataset.report.rows_read, 6);
        assert_eq!(dataset.report.rows_kept, 3);
        assert_eq!(dataset.records.len(), 3);
    }

    #[test]
    fn sentinel_marks_only_that_indicator_absent() {
        let dataset = explicit_validator()
            .validate(&migration_table())
            .unwrap();
        let mexico = &dataset.records[1];
        assert_eq!(mexico.country, "Mexico");
        assert_eq!(mexico.year, 2018);
        assert_eq!(mexico.value("Net Migration"), None);
        assert_eq!(mexico.value("Urban Population Growth"), Some(1.8));
        assert!(mexico.indicators.contains_key("Net Migration"));
    }

    #[test]
    fn unparseable_indicator_is_flagged_with_explicit_columns() {
        let dataset = explicit_validator()
            .validate(&migration_table())
            .unwrap();
        assert_eq!(
            dataset.report.flagged,
            vec![FlaggedCell {
                line: 7,
                column: "Net Migration".into(),
                value: "lots".into(),
            }]
        );
        let brazil = &dataset.records[2];
        assert_eq!(brazil.value("Net Migration"), None);
        assert_eq!(brazil.value("Urban Population Growth"), Some(0.9));
        assert_eq!(dataset.report.absent_values, 2);
    }

    #[test]
    fn inference_skips_text_columns_and_year_helpers() {
        let table = RawTable::new(["country", "date", "Net Migration", "Year", "id"])
            .with_row(["Canada", "2018-01-01", "1000", "2018", "CAN"])
            .with_row(["Mexico", "2018-01-01", "2000", "2018", "MEX"]);
        let dataset = RecordValidator::default().validate(&table).unwrap();
        assert_eq!(dataset.indicators, vec!["Net Migration"]);
        assert_eq!(dataset.report.ignored_columns, vec!["id"]);
    }

    #[test]
    fn inference_ignores_blank_headers() {
        let table = RawTable::new(["", "country", "date", "Net Migration"])
            .with_row(["0", "Canada", "2018", "1000"])
            .with_row(["1", "Mexico", "2018", "2000"]);
        let dataset = RecordValidator::default().validate(&table).unwrap();
        assert_eq!(dataset.indicators, vec!["Net Migration"]);
        assert_eq!(dataset.report.ignored_columns, vec![""]);
        assert!(!dataset.records[0].indicators.contains_key(""));
    }

    #[test]
    fn structural_columns_match_ignoring_case() {
        let table = RawTable::new(["Country", " DATE ", "Net Migration"])
            .with_row(["Kenya", "2018", "-1200"]);
        let dataset = RecordValidator::default().validate(&table).unwrap();
        assert_eq!(dataset.records[0].country, "Kenya");
        assert_eq!(dataset.records[0].year, 2018);
        assert_eq!(dataset.indicators, vec!["Net Migration"]);

        let options = ValidatorOptions {
            country_column: "Nation".into(),
            date_column: Some("period".into()),
            ..ValidatorOptions::default()
        };
        let table = RawTable::new(["NATION", "Period", "Net Migration"]).with_row(["Chad", "2011", "-40"]);
        let dataset = RecordValidator::new(options).validate(&table).unwrap();
        assert_eq!(dataset.records[0].country, "Chad");
        assert_eq!(dataset.records[0].year, 2011);
    }

    #[test]
    fn year_column_is_found_without_date() {
        let table = RawTable::new(["country", "Year", "Net Migration"]).with_row(["Chad", "2011", "-40"]);
        let dataset = RecordValidator::default().validate(&table).unwrap();
        assert_eq!(dataset.records[0].year, 2011);
        assert_eq!(dataset.records[0].value("Net Migration"), Some(-40.0));
    }

    #[test]
    fn schema_errors_are_reported_before_rows() {
        let validator = RecordValidator::default();
        assert_eq!(
            validator.validate(&RawTable::default()).unwrap_err(),
            SchemaError::NoHeaders
        );
        assert_eq!(
            validator
                .validate(&RawTable::new(["nation", "date", "x"]))
                .unwrap_err(),
            SchemaError::MissingCountryColumn("country".into())
        );
        assert_eq!(
            validator
                .validate(&RawTable::new(["country", "when", "x"]))
                .unwrap_err(),
            SchemaError::MissingDateColumn(vec!["date".into(), "year".into()])
        );
        assert_eq!(
            validator
                .validate(&RawTable::new(["country", "date"]))
                .unwrap_err(),
            SchemaError::NoIndicatorColumns
        );
        assert_eq!(
            validator
                .validate(&RawTable::new(["country", "date", "x", "x"]))
                .unwrap_err(),
            SchemaError::DuplicateColumn("x".into())
        );
    }

    #[test]
    fn explicit_indicator_must_exist() {
        let options = ValidatorOptions {
            indicator_columns: Some(vec!["Net Migration".into()]),
            ..ValidatorOptions::default()
        };
        let err = RecordValidator::new(options)
            .validate(&RawTable::new(["country", "date", "GDP"]))
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingIndicatorColumn("Net Migration".into()));
    }

    #[test]
    fn empty_table_with_headers_is_valid() {
        let table = RawTable::new(["country", "date", "Net Migration"]);
        let dataset = RecordValidator::default().validate(&table).unwrap();
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.indicators, vec!["Net Migration"]);
        assert_eq!(dataset.report, ValidationReport::default());
    }
}
