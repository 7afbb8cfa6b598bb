#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use region_summary::{
    catalog::RegionCatalog, classify::ClassifiedRecord, dataset::IndicatorRecord, region::Region,
};
use tempfile::{TempDir, tempdir};

pub const NET_MIGRATION: &str = "Net Migration";
pub const URBAN_GROWTH: &str = "Urban Population Growth";

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

pub fn americas_catalog() -> RegionCatalog {
    RegionCatalog::load(&fixture_path("americas.yml")).expect("americas catalog")
}

pub fn classified(region: Region, country: &str, year: i32, value: Option<f64>) -> ClassifiedRecord {
    ClassifiedRecord {
        region,
        record: IndicatorRecord::new(country, year).with_value(NET_MIGRATION, value),
    }
}
