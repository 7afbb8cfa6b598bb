use std::{fmt, str::FromStr};

use heck::ToKebabCase;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::ConfigurationError;

/// Geopolitical grouping used as the first half of every aggregation key.
///
/// The derived ordering is only a tie-breaker; summaries are ordered by the
/// position a region holds in its [`crate::catalog::RegionCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    NorthAmerica,
    CentralAmerica,
    SouthAmerica,
    Europe,
    Africa,
    AsiaPacific,
    MiddleEast,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::NorthAmerica,
        Region::CentralAmerica,
        Region::SouthAmerica,
        Region::Europe,
        Region::Africa,
        Region::AsiaPacific,
        Region::MiddleEast,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "North America",
            Region::CentralAmerica => "Central America",
            Region::SouthAmerica => "South America",
            Region::Europe => "Europe",
            Region::Africa => "Africa",
            Region::AsiaPacific => "Asia-Pacific",
            Region::MiddleEast => "Middle East",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = ConfigurationError;

    /// Accepts the display name in any case or separator style, so
    /// `Asia-Pacific`, `asia_pacific` and `AsiaPacific` all resolve.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_kebab_case();
        if wanted.is_empty() {
            return Err(ConfigurationError::UnknownRegion(value.to_string()));
        }
        Region::ALL
            .into_iter()
            .find(|region| region.name().to_kebab_case() == wanted)
            .ok_or_else(|| ConfigurationError::UnknownRegion(value.to_string()))
    }
}

impl Serialize for Region {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
