//! (region, year) aggregation of classified records.
//!
//! Each requested indicator is reduced with its own [`Reducer`] over the
//! records of a group where that indicator is present. Absent values count
//! towards neither the sum nor the mean's denominator, and a group with no
//! present values yields an absent aggregate rather than zero.
//!
//! Output rows are ordered by ascending year, then by the region's position
//! in the [`RegionCatalog`], so chart legends and test expectations are
//! stable across runs.

use std::{collections::BTreeMap, fmt, str::FromStr};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::RegionCatalog, classify::ClassifiedRecord, error::ConfigurationError, region::Region,
};

/// Column names every summary carries ahead of the indicators.
pub const RESERVED_COLUMNS: &[&str] = &["region", "year"];

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Sum,
    Mean,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Sum => f.write_str("sum"),
            Reducer::Mean => f.write_str("mean"),
        }
    }
}

impl FromStr for Reducer {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sum" | "total" => Ok(Reducer::Sum),
            "mean" | "avg" | "average" => Ok(Reducer::Mean),
            _ => Err(ConfigurationError::UnknownReducer(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    #[serde(default)]
    pub reducer: Reducer,
}

impl IndicatorSpec {
    pub fn new(name: impl Into<String>, reducer: Reducer) -> Self {
        Self {
            name: name.into(),
            reducer,
        }
    }

    /// Parses `name` or `name=reducer`, e.g. `Net Migration=sum`.
    pub fn parse(raw: &str, default: Reducer) -> Result<Self, ConfigurationError> {
        match raw.rsplit_once('=') {
            Some((name, reducer)) => Ok(Self::new(name.trim(), reducer.parse()?)),
            None => Ok(Self::new(raw.trim(), default)),
        }
    }
}

/// Ordered indicator → reducer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationPlan {
    indicators: Vec<IndicatorSpec>,
}

impl AggregationPlan {
    pub fn new(indicators: Vec<IndicatorSpec>) -> Result<Self, ConfigurationError> {
        for (idx, spec) in indicators.iter().enumerate() {
            if RESERVED_COLUMNS
                .iter()
                .any(|reserved| spec.name.eq_ignore_ascii_case(reserved))
            {
                return Err(ConfigurationError::ReservedIndicator(spec.name.clone()));
            }
            if indicators[..idx].iter().any(|other| other.name == spec.name) {
                return Err(ConfigurationError::DuplicateIndicator(spec.name.clone()));
            }
        }
        Ok(Self { indicators })
    }

    /// Applies one reducer to every indicator in `names`.
    pub fn uniform<I, S>(names: I, reducer: Reducer) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|name| IndicatorSpec::new(name, reducer))
                .collect(),
        )
    }

    pub fn indicators(&self) -> &[IndicatorSpec] {
        &self.indicators
    }

    pub fn names(&self) -> Vec<String> {
        self.indicators.iter().map(|spec| spec.name.clone()).collect()
    }

    pub fn reducer(&self, indicator: &str) -> Option<Reducer> {
        self.indicators
            .iter()
            .find(|spec| spec.name == indicator)
            .map(|spec| spec.reducer)
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

/// One output row: reduced indicator values for a (region, year) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    region: Region,
    year: i32,
    record_count: usize,
    values: Vec<(String, Option<f64>)>,
}

impl AggregatedRecord {
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Classified records that fell into this group, present values or not.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn value(&self, indicator: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == indicator)
            .and_then(|(_, value)| *value)
    }

    /// Indicator values in plan order.
    pub fn values(&self) -> &[(String, Option<f64>)] {
        &self.values
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IndicatorAccumulator {
    sum: f64,
    count: usize,
}

impl IndicatorAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn finish(&self, reducer: Reducer) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match reducer {
            Reducer::Sum => Some(self.sum),
            Reducer::Mean => Some(self.sum / self.count as f64),
        }
    }
}

struct GroupAccumulator {
    region: Region,
    records: usize,
    indicators: Vec<IndicatorAccumulator>,
}

pub struct Aggregator<'a> {
    catalog: &'a RegionCatalog,
    plan: &'a AggregationPlan,
}

impl<'a> Aggregator<'a> {
    pub fn new(catalog: &'a RegionCatalog, plan: &'a AggregationPlan) -> Self {
        Self { catalog, plan }
    }

    pub fn aggregate(&self, classified: &[ClassifiedRecord]) -> Vec<AggregatedRecord> {
        let specs = self.plan.indicators();
        // Regions outside the catalog sort after every catalog region.
        let mut groups: BTreeMap<(i32, usize, Region), GroupAccumulator> = BTreeMap::new();
        for record in classified {
            let rank = self.catalog.rank(record.region).unwrap_or(usize::MAX);
            let group = groups
                .entry((record.year(), rank, record.region))
                .or_insert_with(|| GroupAccumulator {
                    region: record.region,
                    records: 0,
                    indicators: vec![IndicatorAccumulator::default(); specs.len()],
                });
            group.records += 1;
            for (spec, acc) in specs.iter().zip(group.indicators.iter_mut()) {
                if let Some(value) = record.value(&spec.name) {
                    acc.add(value);
                }
            }
        }

        let aggregated: Vec<AggregatedRecord> = groups
            .into_iter()
            .map(|((year, _, _), group)| AggregatedRecord {
                region: group.region,
                year,
                record_count: group.records,
                values: specs
                    .iter()
                    .zip(group.indicators)
                    .map(|(spec, acc)| (spec.name.clone(), acc.finish(spec.reducer)))
                    .collect(),
            })
            .collect();
        debug!(
            "Aggregated {} record(s) into {} (region, year) group(s)",
            classified.len(),
            aggregated.len()
        );
        aggregated
    }
}

pub fn aggregate(
    classified: &[ClassifiedRecord],
    plan: &AggregationPlan,
    catalog: &RegionCatalog,
) -> Vec<AggregatedRecord> {
    Aggregator::new(catalog, plan).aggregate(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::IndicatorRecord;

    const NET_MIGRATION: &str = "Net Migration";

    fn classified(region: Region, country: &str, year: i32, value: Option<f64>) -> ClassifiedRecord {
        ClassifiedRecord {
            region,
            record: IndicatorRecord::new(country, year).with_value(NET_MIGRATION, value),
        }
    }

    fn catalog() -> RegionCatalog {
        RegionCatalog::new([
            (Region::NorthAmerica, vec!["Canada", "Mexico", "United States"]),
            (Region::Europe, vec!["France", "Spain"]),
            (Region::Africa, vec!["Kenya"]),
        ])
        .unwrap()
    }

    #[test]
    fn sums_a_single_group() {
        let records = vec![
            classified(Region::NorthAmerica, "Canada", 2018, Some(1000.0)),
            classified(Region::NorthAmerica, "Mexico", 2018, Some(2000.0)),
            classified(Region::NorthAmerica, "United States", 2018, Some(1500.0)),
        ];
        let plan = AggregationPlan::uniform([NET_MIGRATION], Reducer::Sum).unwrap();
        let rows = aggregate(&records, &plan, &catalog());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region(), Region::NorthAmerica);
        assert_eq!(rows[0].year(), 2018);
        assert_eq!(rows[0].value(NET_MIGRATION), Some(4500.0));
        assert_eq!(rows[0].record_count(), 3);
    }

    #[test]
    fn sums_per_year() {
        let records = vec![
            classified(Region::NorthAmerica, "Canada", 2010, Some(1000.0)),
            classified(Region::NorthAmerica, "United States", 2010, Some(2000.0)),
            classified(Region::NorthAmerica, "Mexico", 2010, Some(1500.0)),
            classified(Region::NorthAmerica, "Canada", 2011, Some(1100.0)),
            classified(Region::NorthAmerica, "Mexico", 2011, Some(1600.0)),
        ];
        let plan = AggregationPlan::uniform([NET_MIGRATION], Reducer::Sum).unwrap();
        let rows = aggregate(&records, &plan, &catalog());
        let totals: Vec<_> = rows
            .iter()
            .map(|row| (row.year(), row.value(NET_MIGRATION)))
            .collect();
        assert_eq!(totals, vec![(2010, Some(4500.0)), (2011, Some(2700.0))]);
    }

    #[test]
    fn mean_ignores_absent_values() {
        let records = vec![
            classified(Region::Europe, "France", 2015, Some(10.0)),
            classified(Region::Europe, "Spain", 2015, None),
            classified(Region::Europe, "Italy", 2015, Some(30.0)),
        ];
        let plan = AggregationPlan::uniform([NET_MIGRATION], Reducer::Mean).unwrap();
        let rows = aggregate(&records, &plan, &catalog());
        assert_eq!(rows[0].value(NET_MIGRATION), Some(20.0));
        assert_eq!(rows[0].record_count(), 3);
    }

    #[test]
    fn group_without_present_values_is_absent_not_zero() {
        let records = vec![
            classified(Region::Africa, "Kenya", 2012, None),
            classified(Region::Africa, "Kenya", 2012, None),
        ];
        for reducer in [Reducer::Sum, Reducer::Mean] {
            let plan = AggregationPlan::uniform([NET_MIGRATION], reducer).unwrap();
            let rows = aggregate(&records, &plan, &catalog());
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].value(NET_MIGRATION), None);
        }
    }

    #[test]
    fn orders_by_year_then_catalog_position() {
        let records = vec![
            classified(Region::Africa, "Kenya", 2011, Some(1.0)),
            classified(Region::Europe, "France", 2010, Some(1.0)),
            classified(Region::NorthAmerica, "Canada", 2011, Some(1.0)),
            classified(Region::Africa, "Kenya", 2010, Some(1.0)),
            classified(Region::MiddleEast, "Oman", 2010, Some(1.0)),
        ];
        let plan = AggregationPlan::uniform([NET_MIGRATION], Reducer::Sum).unwrap();
        let keys: Vec<_> = aggregate(&records, &plan, &catalog())
            .iter()
            .map(|row| (row.year(), row.region()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (2010, Region::Europe),
                (2010, Region::Africa),
                (2010, Region::MiddleEast),
                (2011, Region::NorthAmerica),
                (2011, Region::Africa),
            ]
        );
    }

    #[test]
    fn reducers_are_chosen_per_indicator() {
        let records = vec![
            ClassifiedRecord {
                region: Region::Europe,
                record: IndicatorRecord::new("France", 2020)
                    .with_value("Net Migration", 100.0)
                    .with_value("Urban Population Growth", 1.0),
            },
            ClassifiedRecord {
                region: Region::Europe,
                record: IndicatorRecord::new("Spain", 2020)
                    .with_value("Net Migration", 300.0)
                    .with_value("Urban Population Growth", 2.0),
            },
        ];
        let plan = AggregationPlan::new(vec![
            IndicatorSpec::new("Urban Population Growth", Reducer::Mean),
            IndicatorSpec::new("Net Migration", Reducer::Sum),
        ])
        .unwrap();
        let rows = aggregate(&records, &plan, &catalog());
        assert_eq!(rows[0].value("Net Migration"), Some(400.0));
        assert_eq!(rows[0].value("Urban Population Growth"), Some(1.5));
        let order: Vec<_> = rows[0].values().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(order, vec!["Urban Population Growth", "Net Migration"]);
    }

    #[test]
    fn plan_rejects_duplicates_and_reserved_names() {
        assert_eq!(
            AggregationPlan::uniform(["a", "a"], Reducer::Sum).unwrap_err(),
            ConfigurationError::DuplicateIndicator("a".into())
        );
        assert_eq!(
            AggregationPlan::uniform(["Year"], Reducer::Sum).unwrap_err(),
            ConfigurationError::ReservedIndicator("Year".into())
        );
    }

    #[test]
    fn indicator_spec_parsing() {
        assert_eq!(
            IndicatorSpec::parse("Net Migration=mean", Reducer::Sum).unwrap(),
            IndicatorSpec::new("Net Migration", Reducer::Mean)
        );
        assert_eq!(
            IndicatorSpec::parse(" Net Migration ", Reducer::Mean).unwrap(),
            IndicatorSpec::new("Net Migration", Reducer::Mean)
        );
        assert_eq!(
            IndicatorSpec::parse("x=median", Reducer::Sum).unwrap_err(),
            ConfigurationError::UnknownReducer("median".into())
        );
    }

    #[test]
    fn empty_input_aggregates_to_nothing() {
        let plan = AggregationPlan::uniform([NET_MIGRATION], Reducer::Sum).unwrap();
        assert!(aggregate(&[], &plan, &catalog()).is_empty());
    }
}
