//! End-to-end run: validate → classify → filter → aggregate → summarize.
//!
//! An [`Engine`] owns its catalog and settings and holds no state between
//! runs; the same engine can summarize any number of tables, including from
//! several threads at once.

use std::collections::BTreeSet;

use anyhow::Result;
use log::info;
use serde_json::{Map, Value as JsonValue};

use crate::{
    aggregate::{AggregationPlan, Aggregator, Reducer},
    catalog::RegionCatalog,
    classify::{ClassifiedRecord, classify_all},
    config::EngineConfig,
    dataset::{RawTable, ValidatedDataset},
    error::EngineResult,
    filter::{YearRange, filter, filter_years},
    region::Region,
    summary::{SummaryBuilder, SummaryTable, format_value},
    validate::{RecordValidator, ValidationReport, ValidatorOptions},
};

#[derive(Debug, Clone)]
pub struct Engine {
    catalog: RegionCatalog,
    options: ValidatorOptions,
    plan: Option<AggregationPlan>,
    default_reducer: Reducer,
    regions: Option<BTreeSet<Region>>,
    years: YearRange,
}

/// Everything a run produces besides the summary itself is kept for
/// inspection: which countries were unmatched and which rows were dropped.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub summary: SummaryTable,
    pub unmatched: Vec<String>,
    pub unmatched_rows: usize,
    pub validation: ValidationReport,
}

/// Matched records after filtering, before aggregation.
#[derive(Debug, Clone)]
pub struct ClassifiedView {
    pub indicators: Vec<String>,
    pub records: Vec<ClassifiedRecord>,
    pub unmatched: Vec<String>,
    pub unmatched_rows: usize,
    pub validation: ValidationReport,
}

impl Engine {
    pub fn new(catalog: RegionCatalog) -> Self {
        Self {
            catalog,
            options: ValidatorOptions::default(),
            plan: None,
            default_reducer: Reducer::default(),
            regions: None,
            years: YearRange::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let catalog = config.load_catalog()?;
        let mut engine = Engine::new(catalog)
            .with_validator_options(config.validator_options())
            .with_default_reducer(config.default_reducer)
            .with_years(config.years.unwrap_or_default());
        if let Some(plan) = config.plan()? {
            engine = engine.with_plan(plan);
        }
        if let Some(regions) = config.region_selection()? {
            engine = engine.with_regions(regions);
        }
        Ok(engine)
    }

    /// Fixes the indicator columns and their reducers. Without a plan every
    /// numeric column is aggregated with the default reducer.
    pub fn with_plan(mut self, plan: AggregationPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_validator_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_default_reducer(mut self, reducer: Reducer) -> Self {
        self.default_reducer = reducer;
        self
    }

    pub fn with_regions(mut self, regions: BTreeSet<Region>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn validate(&self, table: &RawTable) -> EngineResult<ValidatedDataset> {
        let mut options = self.options.clone();
        if let Some(plan) = &self.plan {
            options.indicator_columns = Some(plan.names());
        }
        Ok(RecordValidator::new(options).validate(table)?)
    }

    pub fn classify(&self, table: &RawTable) -> EngineResult<ClassifiedView> {
        let validated = self.validate(table)?;
        let classification = classify_all(validated.records, &self.catalog);
        let mut records = classification.classified;
        if let Some(regions) = &self.regions {
            records = filter(records, regions);
        }
        records = filter_years(records, self.years);
        Ok(ClassifiedView {
            indicators: validated.indicators,
            records,
            unmatched: classification.unmatched,
            unmatched_rows: classification.unmatched_rows,
            validation: validated.report,
        })
    }

    pub fn run(&self, table: &RawTable) -> EngineResult<EngineOutput> {
        let view = self.classify(table)?;
        let plan = match &self.plan {
            Some(plan) => plan.clone(),
            None => AggregationPlan::uniform(view.indicators.iter().cloned(), self.default_reducer)?,
        };
        let aggregated = Aggregator::new(&self.catalog, &plan).aggregate(&view.records);
        let summary = SummaryBuilder::build(&aggregated, &plan.names())?;
        info!(
            "Summarized {} matched row(s) into {} (region, year) row(s) across {} indicator(s)",
            view.records.len(),
            summary.len(),
            plan.indicators().len()
        );
        Ok(EngineOutput {
            summary,
            unmatched: view.unmatched,
            unmatched_rows: view.unmatched_rows,
            validation: view.validation,
        })
    }
}

impl ClassifiedView {
    pub fn headers(&self) -> Vec<String> {
        ["country", "region", "year"]
            .iter()
            .map(|column| column.to_string())
            .chain(self.indicators.iter().cloned())
            .collect()
    }

    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|record| {
                let mut cells = vec![
                    record.country().to_string(),
                    record.region.to_string(),
                    record.year().to_string(),
                ];
                cells.extend(
                    self.indicators
                        .iter()
                        .map(|name| format_value(record.value(name))),
                );
                cells
            })
            .collect()
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(
            self.records
                .iter()
                .map(|record| {
                    let mut object = Map::new();
                    object.insert("country".into(), JsonValue::from(record.country()));
                    object.insert("region".into(), JsonValue::from(record.region.name()));
                    object.insert("year".into(), JsonValue::from(record.year()));
                    for name in &self.indicators {
                        let cell = record
                            .value(name)
                            .map(JsonValue::from)
                            .unwrap_or(JsonValue::Null);
                        object.insert(name.clone(), cell);
                    }
                    JsonValue::Object(object)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::IndicatorSpec,
        error::{ConfigurationError, EngineError, SchemaError},
    };

    fn catalog() -> RegionCatalog {
        RegionCatalog::new([
            (Region::NorthAmerica, vec!["United States", "Canada", "Mexico"]),
            (Region::SouthAmerica, vec!["Brazil", "Chile"]),
        ])
        .unwrap()
    }

    fn table() -> RawTable {
        RawTable::new(["country", "date", "Net Migration", "Urban Population Growth"])
            .with_row(["Canada", "2018-01-01", "1000", "1.0"])
            .with_row(["Mexico", "2018-01-01", "2000", ".."])
            .with_row(["United States", "2018-01-01", "1500", "2.0"])
            .with_row(["Brazil", "2018-01-01", "..", ".."])
            .with_row(["World", "2018-01-01", "99999", "9"])
            .with_row(["Canada", "2019-01-01", "1100", "1.5"])
    }

    #[test]
    fn runs_the_whole_pipeline() {
        let plan = AggregationPlan::new(vec![
            IndicatorSpec::new("Net Migration", Reducer::Sum),
            IndicatorSpec::new("Urban Population Growth", Reducer::Mean),
        ])
        .unwrap();
        let output = Engine::new(catalog()).with_plan(plan).run(&table()).unwrap();
        let summary = &output.summary;
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.get(Region::NorthAmerica, 2018, "Net Migration"), Some(4500.0));
        assert_eq!(
            summary.get(Region::NorthAmerica, 2018, "Urban Population Growth"),
            Some(1.5)
        );
        assert_eq!(summary.get(Region::SouthAmerica, 2018, "Net Migration"), None);
        assert_eq!(summary.get(Region::NorthAmerica, 2019, "Net Migration"), Some(1100.0));
        assert_eq!(output.unmatched, vec!["World"]);
        assert_eq!(output.unmatched_rows, 1);
    }

    #[test]
    fn inferred_plan_uses_default_reducer() {
        let output = Engine::new(catalog())
            .with_default_reducer(Reducer::Mean)
            .run(&table())
            .unwrap();
        assert_eq!(
            output.summary.headers(),
            vec!["region", "year", "Net Migration", "Urban Population Growth"]
        );
        assert_eq!(
            output.summary.get(Region::NorthAmerica, 2018, "Net Migration"),
            Some(1500.0)
        );
    }

    #[test]
    fn region_and_year_filters_apply_before_aggregation() {
        let output = Engine::new(catalog())
            .with_regions(BTreeSet::from([Region::SouthAmerica]))
            .with_years(YearRange::single(2018))
            .run(&table())
            .unwrap();
        assert_eq!(output.summary.len(), 1);
        assert_eq!(output.summary.rows()[0].region, Region::SouthAmerica);
        assert_eq!(output.summary.column("Net Migration"), Some(vec![None]));
    }

    #[test]
    fn year_without_data_yields_empty_summary() {
        let output = Engine::new(catalog())
            .with_years(YearRange::single(2030))
            .run(&table())
            .unwrap();
        assert!(output.summary.is_empty());
        assert_eq!(output.summary.headers().len(), 4);
    }

    #[test]
    fn schema_problems_fail_before_classification() {
        let err = Engine::new(catalog())
            .run(&RawTable::new(["nation", "date", "x"]))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Schema(SchemaError::MissingCountryColumn("country".into()))
        );
    }

    #[test]
    fn planned_indicator_missing_from_input_is_a_schema_error() {
        let plan = AggregationPlan::uniform(["GDP"], Reducer::Sum).unwrap();
        let err = Engine::new(catalog()).with_plan(plan).run(&table()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Schema(SchemaError::MissingIndicatorColumn("GDP".into()))
        );
    }

    #[test]
    fn from_config_rejects_unknown_region() {
        let config = EngineConfig {
            regions: vec!["Oceania".into()],
            ..EngineConfig::default()
        };
        let err = Engine::from_config(&config).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigurationError>(),
            Some(&ConfigurationError::UnknownRegion("Oceania".into()))
        );
    }

    #[test]
    fn classified_view_lists_matched_rows() {
        let view = Engine::new(catalog()).classify(&table()).unwrap();
        assert_eq!(view.records.len(), 5);
        assert_eq!(
            view.headers(),
            vec!["country", "region", "year", "Net Migration", "Urban Population Growth"]
        );
        assert_eq!(
            view.render_rows()[1],
            vec!["Mexico", "North America", "2018", "2000", ""]
        );
        assert_eq!(view.to_json()[3]["region"], "South America");
    }

    #[test]
    fn classified_json_keys_follow_header_order() {
        let view = Engine::new(catalog()).classify(&table()).unwrap();
        let json = view.to_json();
        let keys: Vec<_> = json[0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, view.headers());
    }
}
