//! Error types for the region classification and aggregation engine.
//!
//! Two kinds of problem stop a run before any data is touched:
//!
//! - [`ConfigurationError`] - the region catalog or aggregation plan is inconsistent
//! - [`SchemaError`] - the input table lacks a column the engine needs
//!
//! Sparse data (missing indicator values, unmatched countries, empty
//! region/year groups) is never reported through these types; it is carried
//! in the data model as absence.

use thiserror::Error;

use crate::region::Region;

/// Problems with the region catalog or the aggregation plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A country is listed under two different regions.
    #[error("Country '{country}' is assigned to both {first} and {second}")]
    ConflictingAssignment {
        country: String,
        first: Region,
        second: Region,
    },

    /// The same region has more than one entry in the catalog.
    #[error("Region {0} is declared more than once in the catalog")]
    DuplicateRegion(Region),

    /// A region name could not be resolved to a known region.
    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    /// A blank country name was listed under a region.
    #[error("Empty country name listed under {0}")]
    EmptyCountry(Region),

    #[error("Unsupported catalog version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The same indicator was given two reducers.
    #[error("Indicator '{0}' is configured more than once")]
    DuplicateIndicator(String),

    /// An indicator name shadows one of the fixed summary columns.
    #[error("Indicator name '{0}' collides with a reserved summary column")]
    ReservedIndicator(String),

    #[error("Unknown reducer '{0}' (expected 'sum' or 'mean')")]
    UnknownReducer(String),
}

/// Problems with the shape of the input or output table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Input table has no header row")]
    NoHeaders,

    #[error("Country column '{0}' not found in input")]
    MissingCountryColumn(String),

    /// None of the candidate date/year columns are present.
    #[error("No date or year column found (looked for {})", .0.join(", "))]
    MissingDateColumn(Vec<String>),

    #[error("Input has no numeric indicator columns")]
    NoIndicatorColumns,

    #[error("Indicator column '{0}' not found in input")]
    MissingIndicatorColumn(String),

    #[error("Column '{0}' appears more than once in the input header")]
    DuplicateColumn(String),

    /// A requested summary column shadows `region` or `year`.
    #[error("Summary column '{0}' is reserved")]
    ReservedColumn(String),
}

/// Umbrella error returned by [`crate::pipeline::Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

pub type EngineResult<T> = Result<T, EngineError>;
