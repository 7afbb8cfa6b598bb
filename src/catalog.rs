//! Country to region membership.
//!
//! A [`RegionCatalog`] is built once from an ordered list of
//! `(region, countries)` entries and never changes afterwards. Construction
//! rejects any country listed under two regions; there is no "first match
//! wins" fallback. Lookups are exact string matches against the canonical
//! spelling used by the data source (`"Korea, Rep."`, `"Egypt, Arab Rep."`).
//!
//! Catalogs are stored as versioned YAML:
//!
//! ```yaml
//! version: 1
//! regions:
//!   - region: North America
//!     countries: [United States, Canada, Mexico]
//! ```
//!
//! The repository's own catalog lives in `config/regions.yml` and is compiled
//! in as [`RegionCatalog::builtin`].

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::ConfigurationError, region::Region};

pub const CATALOG_VERSION: u32 = 1;

const BUILTIN_CATALOG: &str = include_str!("../config/regions.yml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub version: u32,
    pub regions: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub region: Region,
    #[serde(default)]
    pub countries: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegionCatalog {
    entries: Vec<CatalogEntry>,
    lookup: HashMap<String, Region>,
    ranks: HashMap<Region, usize>,
}

impl RegionCatalog {
    /// Builds a catalog from `(region, countries)` pairs in declaration order.
    ///
    /// A country repeated under the same region is kept once. A country
    /// under two regions, a region declared twice, or a blank country name
    /// is a [`ConfigurationError`].
    pub fn new<I, C, S>(entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (Region, C)>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = RegionCatalog {
            entries: Vec::new(),
            lookup: HashMap::new(),
            ranks: HashMap::new(),
        };
        for (region, countries) in entries {
            if catalog.ranks.contains_key(&region) {
                return Err(ConfigurationError::DuplicateRegion(region));
            }
            catalog.ranks.insert(region, catalog.entries.len());

            let mut seen = HashSet::new();
            let mut members = Vec::new();
            for country in countries {
                let country = country.into();
                if country.trim().is_empty() {
                    return Err(ConfigurationError::EmptyCountry(region));
                }
                if let Some(existing) = catalog.lookup.get(&country) {
                    if *existing != region {
                        return Err(ConfigurationError::ConflictingAssignment {
                            country,
                            first: *existing,
                            second: region,
                        });
                    }
                }
                if seen.insert(country.clone()) {
                    catalog.lookup.insert(country.clone(), region);
                    members.push(country);
                } else {
                    debug!("Ignoring repeated country '{country}' under {region}");
                }
            }
            catalog.entries.push(CatalogEntry {
                region,
                countries: members,
            });
        }
        Ok(catalog)
    }

    pub fn from_file(file: CatalogFile) -> Result<Self, ConfigurationError> {
        if file.version != CATALOG_VERSION {
            return Err(ConfigurationError::UnsupportedVersion {
                found: file.version,
                expected: CATALOG_VERSION,
            });
        }
        Self::new(
            file.regions
                .into_iter()
                .map(|entry| (entry.region, entry.countries)),
        )
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(raw).context("Parsing region catalog")?;
        Ok(Self::from_file(file)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading region catalog {path:?}"))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Loading region catalog {path:?}"))
    }

    /// The catalog shipped in `config/regions.yml`.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_CATALOG).context("Loading built-in region catalog")
    }

    pub fn classify(&self, country: &str) -> Option<Region> {
        self.lookup.get(country).copied()
    }

    /// Regions in declaration order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.entries.iter().map(|entry| entry.region)
    }

    /// Position of `region` in declaration order.
    pub fn rank(&self, region: Region) -> Option<usize> {
        self.ranks.get(&region).copied()
    }

    pub fn countries(&self, region: Region) -> &[String] {
        self.rank(region)
            .map(|idx| self.entries[idx].countries.as_slice())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of distinct countries across all regions.
    pub fn country_count(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Hex SHA-256 over the ordered region/country pairs. Two catalogs with
    /// the same fingerprint classify every country identically and order
    /// regions the same way.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(CATALOG_VERSION.to_le_bytes());
        for entry in &self.entries {
            hasher.update(entry.region.name().as_bytes());
            hasher.update(b"\n");
            for country in &entry.countries {
                hasher.update(b"\t");
                hasher.update(country.as_bytes());
                hasher.update(b"\n");
            }
        }
        format!("{:x}", hasher.finalize())
    }
}
