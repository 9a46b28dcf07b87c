use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{Band, BandPasses, DataRelease, ReleaseInfo, TableId, require_data_path};
use crate::config::Config;
use crate::data::loader::{self, SUPPORTED_EXTENSIONS};
use crate::data::model::{DataTable, MetadataValue, OBJ_ID_KEY};
use crate::error::{Result, SnDataError};

/// Name of the manifest describing a release mirror.
pub const MANIFEST_FILE: &str = "release.json";

const OBJECTS_DIR: &str = "objects";
const TABLES_DIR: &str = "tables";
const FILTERS_DIR: &str = "filters";
const TABLE_DESCRIPTIONS_FILE: &str = "descriptions.json";

/// Contents of `release.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    #[serde(flatten)]
    pub info: ReleaseInfo,
    /// Empty for spectroscopic releases.
    #[serde(default)]
    pub bands: Vec<Band>,
}

/// A registered filter transmission curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Bandpass {
    pub wavelength: Vec<f64>,
    pub transmission: Vec<f64>,
}

/// A data release stored as plain files on disk.
///
/// Layout of the data directory:
///
/// ```text
/// <data_dir>/
///   objects/<local_id>.{parquet,json,csv}   one table per object
///   tables/table<id>.csv                    published tables
///   tables/descriptions.json                optional {"<id>": "<description>"}
///   filters/<file>                          two-column transmission curves
/// ```
///
/// "Downloading" copies a local mirror with the same layout into the data
/// directory.
pub struct DirectoryRelease {
    info: ReleaseInfo,
    bands: Option<BandPasses>,
    data_dir: PathBuf,
    mirror: Option<PathBuf>,
    /// local id → object file, filled on first use.
    object_files: RefCell<Option<BTreeMap<String, PathBuf>>>,
    filters: RefCell<BTreeMap<String, Bandpass>>,
}

impl DirectoryRelease {
    pub fn new(info: ReleaseInfo, bands: Option<BandPasses>, config: &Config) -> Self {
        let data_dir = config.release_dir(&info.survey_abbrev, &info.release);
        Self {
            info,
            bands,
            data_dir,
            mirror: None,
            object_files: RefCell::new(None),
            filters: RefCell::new(BTreeMap::new()),
        }
    }

    /// Build a release from the `release.json` manifest of a mirror directory.
    pub fn from_manifest(mirror: &Path, config: &Config) -> Result<Self> {
        let text = fs::read_to_string(mirror.join(MANIFEST_FILE))?;
        let manifest: ReleaseManifest = serde_json::from_str(&text)?;
        let bands = if manifest.bands.is_empty() {
            None
        } else {
            Some(BandPasses::new(manifest.bands))
        };
        Ok(Self::new(manifest.info, bands, config).with_mirror(mirror))
    }

    pub fn with_mirror(mut self, mirror: impl Into<PathBuf>) -> Self {
        self.mirror = Some(mirror.into());
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_downloaded(&self) -> bool {
        self.data_dir.exists()
    }

    /// A filter curve registered by [`DataRelease::register_filters`].
    pub fn registered_filter(&self, band: &str) -> Option<Bandpass> {
        self.filters.borrow().get(band).cloned()
    }

    /// Run `f` over the local id → object file map, scanning `objects/` on
    /// first use.
    fn with_object_files<T>(&self, f: impl FnOnce(&BTreeMap<String, PathBuf>) -> T) -> Result<T> {
        if let Some(files) = self.object_files.borrow().as_ref() {
            return Ok(f(files));
        }

        let files = self.scan_object_files()?;
        let out = f(&files);
        *self.object_files.borrow_mut() = Some(files);
        Ok(out)
    }

    fn object_file(&self, local_id: &str) -> Result<Option<PathBuf>> {
        self.with_object_files(|files| files.get(local_id).cloned())
    }

    fn scan_object_files(&self) -> Result<BTreeMap<String, PathBuf>> {
        let objects_dir = self.data_dir.join(OBJECTS_DIR);
        require_data_path(&[&objects_dir])?;

        let mut files: BTreeMap<String, (usize, PathBuf)> = BTreeMap::new();
        for entry in fs::read_dir(&objects_dir)? {
            let path = entry?.path();
            let Some(rank) = extension_rank(&path) else {
                continue;
            };
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Several formats for one object: keep the preferred one.
            let keep_existing = files
                .get(stem)
                .is_some_and(|(existing, _)| *existing <= rank);
            if !keep_existing {
                files.insert(stem.to_string(), (rank, path.clone()));
            }
        }

        let files: BTreeMap<String, PathBuf> =
            files.into_iter().map(|(id, (_, path))| (id, path)).collect();
        debug!("{}: indexed {} object files", self.name(), files.len());
        Ok(files)
    }

    fn table_files(&self) -> Result<BTreeMap<TableId, PathBuf>> {
        let table_dir = self.data_dir.join(TABLES_DIR);
        require_data_path(&[&self.data_dir])?;
        if !table_dir.exists() {
            return Ok(BTreeMap::new());
        }

        let mut tables = BTreeMap::new();
        for entry in fs::read_dir(&table_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("table"))
            else {
                continue;
            };
            tables.insert(TableId::parse(id), path.clone());
        }
        Ok(tables)
    }

    fn table_description(&self, table_id: &TableId) -> Result<Option<String>> {
        let path = self.data_dir.join(TABLES_DIR).join(TABLE_DESCRIPTIONS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        let mut descriptions: BTreeMap<String, String> = serde_json::from_str(&text)?;
        Ok(descriptions.remove(&table_id.to_string()))
    }

    /// Standardize band names and add flux columns.
    fn format_photometry(&self, table: &mut DataTable, bands: &BandPasses) {
        let prefix = format!(
            "{}_{}_",
            self.info.survey_abbrev.to_lowercase(),
            self.info.release.to_lowercase()
        );

        if table.has_column("band") {
            let names: Vec<MetadataValue> = table
                .column("band")
                .into_iter()
                .map(|band| match band.as_str() {
                    Some(b) if !b.starts_with(&prefix) => MetadataValue::String(format!("{prefix}{b}")),
                    _ => band.clone(),
                })
                .collect();
            table.set_column("band", names);
        }

        if !(table.has_column("mag") && table.has_column("mag_err")) {
            return;
        }

        let mut zp = Vec::with_capacity(table.len());
        let mut flux = Vec::with_capacity(table.len());
        let mut fluxerr = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let band_zp = table
                .value(row, "band")
                .as_str()
                .and_then(|b| bands.zero_point_for(b));
            let mag = table.value(row, "mag").as_f64();
            let mag_err = table.value(row, "mag_err").as_f64();

            match (band_zp, mag, mag_err) {
                (Some(z), Some(m), Some(e)) => {
                    let f = 10f64.powf((m - z) / -2.5);
                    zp.push(MetadataValue::Float(z));
                    flux.push(MetadataValue::Float(f));
                    fluxerr.push(MetadataValue::Float(std::f64::consts::LN_10 * f * e / 2.5));
                }
                (z, _, _) => {
                    zp.push(z.map_or(MetadataValue::Null, MetadataValue::Float));
                    flux.push(MetadataValue::Null);
                    fluxerr.push(MetadataValue::Null);
                }
            }
        }

        table.set_column("zp", zp);
        table.set_column("zpsys", std::iter::repeat(MetadataValue::from("ab")).take(table.len()));
        table.set_column("flux", flux);
        table.set_column("fluxerr", fluxerr);
    }
}

impl DataRelease for DirectoryRelease {
    fn info(&self) -> &ReleaseInfo {
        &self.info
    }

    fn band_passes(&self) -> Option<&BandPasses> {
        self.bands.as_ref()
    }

    fn get_available_tables(&self) -> Result<Vec<TableId>> {
        let mut ids: Vec<TableId> = self.table_files()?.into_keys().collect();
        ids.sort_by_key(|id| id.to_string());
        Ok(ids)
    }

    fn load_table(&self, table_id: &TableId) -> Result<DataTable> {
        let tables = self.table_files()?;
        let path = tables
            .get(table_id)
            .ok_or_else(|| SnDataError::InvalidTableId(format!("Table {table_id} is not available.")))?;

        let mut table = loader::load_file(path)?;
        if let Some(description) = self.table_description(table_id)? {
            table.meta.insert("description".into(), description.into());
        }
        Ok(table)
    }

    fn get_available_ids(&self) -> Result<Vec<String>> {
        self.with_object_files(|files| files.keys().cloned().collect())
    }

    fn get_data_for_id(&self, local_id: &str, format_table: bool) -> Result<DataTable> {
        let path = self
            .object_file(local_id)?
            .ok_or_else(|| SnDataError::InvalidObjId(format!("Object Id not available: {local_id}")))?;

        let mut table = loader::load_file(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        table.meta.insert(OBJ_ID_KEY.into(), local_id.into());

        if format_table {
            if let Some(bands) = &self.bands {
                self.format_photometry(&mut table, bands);
            }
        }
        Ok(table)
    }

    fn download_module_data(&self, force: bool) -> Result<()> {
        let Some(mirror) = &self.mirror else {
            return Err(SnDataError::Unsupported(format!(
                "{} does not support downloading remote data",
                self.name()
            )));
        };

        if self.is_downloaded() {
            if !force {
                debug!("{}: data already present in {}", self.name(), self.data_dir.display());
                return Ok(());
            }
            fs::remove_dir_all(&self.data_dir)?;
        }

        info!("{}: copying {} → {}", self.name(), mirror.display(), self.data_dir.display());
        copy_dir(mirror, &self.data_dir)?;
        *self.object_files.borrow_mut() = None;
        Ok(())
    }

    fn delete_module_data(&self) -> Result<()> {
        *self.object_files.borrow_mut() = None;
        match fs::remove_dir_all(&self.data_dir) {
            Ok(()) => {
                info!("{}: deleted {}", self.name(), self.data_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn register_filters(&self, force: bool) -> Result<()> {
        let Some(bands) = &self.bands else {
            debug!("{}: spectroscopic release, no filters to register", self.name());
            return Ok(());
        };

        require_data_path(&[&self.data_dir])?;
        let filter_dir = self.data_dir.join(FILTERS_DIR);

        for band in bands.bands() {
            let Some(file) = &band.filter_file else {
                continue;
            };
            if !force && self.filters.borrow().contains_key(&band.name) {
                continue;
            }
            let bandpass = read_bandpass(&filter_dir.join(file))?;
            debug!("{}: registered {} ({} points)", self.name(), band.name, bandpass.wavelength.len());
            self.filters.borrow_mut().insert(band.name.clone(), bandpass);
        }
        Ok(())
    }
}

fn extension_rank(path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.iter().position(|e| *e == ext)
}

/// Parse a whitespace-delimited (wavelength, transmission) file, dropping
/// rows with NaN in either column.
fn read_bandpass(path: &Path) -> Result<Bandpass> {
    let text = fs::read_to_string(path)?;
    let mut wavelength = Vec::new();
    let mut transmission = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(w), Some(t)) = (fields.next(), fields.next()) else {
            return Err(anyhow::anyhow!("{}:{}: expected two columns", path.display(), line_no + 1).into());
        };
        let w: f64 = w
            .parse()
            .with_context(|| format!("{}:{}: bad wavelength '{w}'", path.display(), line_no + 1))?;
        let t: f64 = t
            .parse()
            .with_context(|| format!("{}:{}: bad transmission '{t}'", path.display(), line_no + 1))?;
        if w.is_nan() || t.is_nan() {
            continue;
        }
        wavelength.push(w);
        transmission.push(t);
    }

    Ok(Bandpass {
        wavelength,
        transmission,
    })
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
