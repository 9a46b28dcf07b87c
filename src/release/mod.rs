//! The interface every survey data-release accessor implements.
//!
//! A combined dataset only talks to releases through [`DataRelease`], so any
//! survey-specific parser can be plugged in by implementing the trait.
//! [`DirectoryRelease`] is a generic implementation backed by a local
//! directory of per-object table files.

mod directory;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::model::DataTable;
use crate::error::{Result, SnDataError};

pub use directory::{Bandpass, DirectoryRelease, MANIFEST_FILE, ReleaseManifest};

/// What kind of observations a release publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Photometric,
    Spectroscopic,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Photometric => write!(f, "photometric"),
            DataType::Spectroscopic => write!(f, "spectroscopic"),
        }
    }
}

/// Descriptive metadata of a data release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub survey_name: String,
    pub survey_abbrev: String,
    pub release: String,
    #[serde(default)]
    pub survey_url: Option<String>,
    #[serde(default)]
    pub publications: Vec<String>,
    #[serde(default)]
    pub ads_url: Option<String>,
}

/// A photometric band and its zero point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub zero_point: f64,
    /// Transmission curve file, relative to the release's `filters/` dir.
    #[serde(default)]
    pub filter_file: Option<String>,
}

/// Band passes published by a photometric release.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandPasses {
    bands: Vec<Band>,
}

impl BandPasses {
    pub fn new(bands: Vec<Band>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn zero_points(&self) -> Vec<f64> {
        self.bands.iter().map(|b| b.zero_point).collect()
    }

    pub fn zero_point_for(&self, band: &str) -> Option<f64> {
        self.bands
            .iter()
            .find(|b| b.name == band)
            .map(|b| b.zero_point)
    }
}

/// Identifier of a published (Vizier-style) table: a number or a name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableId {
    Number(u32),
    Name(String),
}

impl TableId {
    /// Parse the part of a file stem after its `table` prefix.
    pub fn parse(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(n) => TableId::Number(n),
            Err(_) => TableId::Name(s.to_string()),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableId::Number(n) => write!(f, "{n}"),
            TableId::Name(s) => write!(f, "{s}"),
        }
    }
}

impl From<u32> for TableId {
    fn from(n: u32) -> Self {
        TableId::Number(n)
    }
}

impl From<&str> for TableId {
    fn from(s: &str) -> Self {
        TableId::parse(s)
    }
}

/// Uniform access to one survey's data release.
pub trait DataRelease {
    fn info(&self) -> &ReleaseInfo;

    fn survey_abbrev(&self) -> &str {
        &self.info().survey_abbrev
    }

    fn release(&self) -> &str {
        &self.info().release
    }

    /// Human readable name used in error messages and logs.
    fn name(&self) -> String {
        format!("{} {}", self.survey_abbrev(), self.release())
    }

    /// Band passes of a photometric release, `None` for spectroscopic ones.
    fn band_passes(&self) -> Option<&BandPasses> {
        None
    }

    fn data_type(&self) -> DataType {
        match self.band_passes() {
            Some(_) => DataType::Photometric,
            None => DataType::Spectroscopic,
        }
    }

    fn get_available_tables(&self) -> Result<Vec<TableId>>;

    /// Fails with [`SnDataError::InvalidTableId`] for unknown tables.
    fn load_table(&self, table_id: &TableId) -> Result<DataTable>;

    /// Local ids of every object in the release.
    fn get_available_ids(&self) -> Result<Vec<String>>;

    /// Data for one object. The returned table's meta carries at least
    /// `obj_id`. Fails with [`SnDataError::InvalidObjId`] for unknown ids.
    fn get_data_for_id(&self, local_id: &str, format_table: bool) -> Result<DataTable>;

    fn download_module_data(&self, force: bool) -> Result<()>;

    fn delete_module_data(&self) -> Result<()>;

    /// Register the release's filter transmission curves. Fails with
    /// [`SnDataError::NoDownloadedData`] when local data is missing.
    fn register_filters(&self, force: bool) -> Result<()>;
}

/// Fail with [`SnDataError::NoDownloadedData`] unless every path exists.
pub fn require_data_path(paths: &[&Path]) -> Result<()> {
    if paths.iter().all(|p| p.exists()) {
        Ok(())
    } else {
        Err(SnDataError::no_downloaded_data())
    }
}
