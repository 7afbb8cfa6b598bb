use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{classify::ClassifiedRecord, error::ConfigurationError, region::Region};

/// Inclusive year bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    #[serde(default)]
    pub from: Option<i32>,
    #[serde(default)]
    pub to: Option<i32>,
}

impl YearRange {
    pub fn single(year: i32) -> Self {
        Self {
            from: Some(year),
            to: Some(year),
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.from.is_none_or(|from| year >= from) && self.to.is_none_or(|to| year <= to)
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Keeps the records whose region is in `regions`. An empty set keeps nothing.
pub fn filter(classified: Vec<ClassifiedRecord>, regions: &BTreeSet<Region>) -> Vec<ClassifiedRecord> {
    classified
        .into_iter()
        .filter(|record| regions.contains(&record.region))
        .collect()
}

pub fn filter_years(classified: Vec<ClassifiedRecord>, years: YearRange) -> Vec<ClassifiedRecord> {
    if years.is_unbounded() {
        return classified;
    }
    classified
        .into_iter()
        .filter(|record| years.contains(record.year()))
        .collect()
}

/// Parses region selections such as `["Africa", "europe,middle-east"]`.
pub fn parse_regions<S: AsRef<str>>(values: &[S]) -> Result<BTreeSet<Region>, ConfigurationError> {
    values
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::parse)
        .collect()
}
