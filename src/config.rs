//! Engine configuration file.
//!
//! ```yaml
//! catalog: regions.yml          # optional; the built-in catalog otherwise
//! country_column: country
//! date_column: date             # optional; `date` then `year` are tried
//! missing_values: ["", "..", "NA"]
//! default_reducer: sum          # for indicators inferred from the input
//! indicators:
//!   - name: Net Migration
//!     reducer: sum
//!   - name: Urban Population Growth
//!     reducer: mean
//! regions: [Asia-Pacific]
//! years: { from: 2000, to: 2020 }
//! ```
//!
//! Command-line flags override file values field by field.

use std::{collections::BTreeSet, fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{AggregationPlan, IndicatorSpec, Reducer},
    catalog::RegionCatalog,
    cli::EngineArgs,
    error::ConfigurationError,
    filter::{YearRange, parse_regions},
    region::Region,
    validate::ValidatorOptions,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub catalog: Option<PathBuf>,
    pub country_column: Option<String>,
    pub date_column: Option<String>,
    pub missing_values: Option<Vec<String>>,
    pub default_reducer: Reducer,
    pub indicators: Vec<IndicatorSpec>,
    pub regions: Vec<String>,
    pub years: Option<YearRange>,
}

impl EngineConfig {
    /// Loads a YAML config. A relative `catalog` path is resolved against the
    /// directory holding the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading engine config {path:?}"))?;
        let mut config: EngineConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing engine config {path:?}"))?;
        if let (Some(catalog), Some(parent)) = (&config.catalog, path.parent()) {
            if catalog.is_relative() {
                config.catalog = Some(parent.join(catalog));
            }
        }
        Ok(config)
    }

    /// Applies command-line overrides. Repeated list flags replace the
    /// file's list rather than extending it.
    pub fn merge_cli(&mut self, args: &EngineArgs) {
        if let Some(catalog) = &args.catalog {
            self.catalog = Some(catalog.clone());
        }
        if let Some(column) = &args.country_column {
            self.country_column = Some(column.clone());
        }
        if let Some(column) = &args.date_column {
            self.date_column = Some(column.clone());
        }
        if !args.missing_values.is_empty() {
            self.missing_values = Some(args.missing_values.clone());
        }
        if !args.regions.is_empty() {
            self.regions = args.regions.clone();
        }
        if args.from_year.is_some() || args.to_year.is_some() {
            let mut years = self.years.unwrap_or_default();
            if args.from_year.is_some() {
                years.from = args.from_year;
            }
            if args.to_year.is_some() {
                years.to = args.to_year;
            }
            self.years = Some(years);
        }
    }

    pub fn validator_options(&self) -> ValidatorOptions {
        let mut options = ValidatorOptions::default();
        if let Some(column) = &self.country_column {
            options.country_column = column.clone();
        }
        options.date_column = self.date_column.clone();
        if let Some(tokens) = &self.missing_values {
            options.missing_values = tokens.clone();
        }
        options
    }

    /// The configured plan, or `None` when indicators are to be inferred.
    pub fn plan(&self) -> Result<Option<AggregationPlan>, ConfigurationError> {
        if self.indicators.is_empty() {
            return Ok(None);
        }
        AggregationPlan::new(self.indicators.clone()).map(Some)
    }

    pub fn region_selection(&self) -> Result<Option<BTreeSet<Region>>, ConfigurationError> {
        if self.regions.is_empty() {
            return Ok(None);
        }
        parse_regions(&self.regions).map(Some)
    }

    pub fn load_catalog(&self) -> Result<RegionCatalog> {
        match &self.catalog {
            Some(path) => RegionCatalog::load(path),
            None => RegionCatalog::builtin(),
        }
    }
}
