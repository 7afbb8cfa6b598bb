use std::collections::HashSet;

use log::{debug, warn};
use serde::Serialize;

use crate::{catalog::RegionCatalog, dataset::IndicatorRecord, region::Region};

/// An [`IndicatorRecord`] whose country resolved to a region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    pub region: Region,
    #[serde(flatten)]
    pub record: IndicatorRecord,
}

impl ClassifiedRecord {
    pub fn country(&self) -> &str {
        &self.record.country
    }

    pub fn year(&self) -> i32 {
        self.record.year
    }

    pub fn value(&self, indicator: &str) -> Option<f64> {
        self.record.value(indicator)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Matched records in input order.
    pub classified: Vec<ClassifiedRecord>,
    /// Countries with no catalog entry, each listed once in first-seen order.
    pub unmatched: Vec<String>,
    /// Number of input records excluded because their country was unmatched.
    pub unmatched_rows: usize,
}

/// Attaches a region to every record whose country is in `catalog`.
///
/// Records for unknown countries are excluded rather than defaulted and the
/// country is reported in [`Classification::unmatched`].
pub fn classify_all<I>(records: I, catalog: &RegionCatalog) -> Classification
where
    I: IntoIterator<Item = IndicatorRecord>,
{
    let mut result = Classification::default();
    let mut seen_unmatched = HashSet::new();
    for record in records {
        match catalog.classify(&record.country) {
            Some(region) => result.classified.push(ClassifiedRecord { region, record }),
            None => {
                result.unmatched_rows += 1;
                if seen_unmatched.insert(record.country.clone()) {
                    result.unmatched.push(record.country);
                }
            }
        }
    }
    debug!(
        "Classified {} record(s) against {} region(s)",
        result.classified.len(),
        catalog.regions().count()
    );
    if !result.unmatched.is_empty() {
        warn!(
            "{} row(s) from {} country name(s) not in the region catalog: {}",
            result.unmatched_rows,
            result.unmatched.len(),
            result.unmatched.join("; ")
        );
    }
    result
}
