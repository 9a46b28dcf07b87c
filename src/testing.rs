//! In-memory release used by unit tests.

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::data::model::{DataTable, Meta, MetadataValue, OBJ_ID_KEY, Row};
use crate::error::{Result, SnDataError};
use crate::release::{Band, BandPasses, DataRelease, ReleaseInfo, TableId};

pub(crate) struct StubRelease {
    info: ReleaseInfo,
    bands: Option<BandPasses>,
    objects: BTreeMap<String, DataTable>,
    downloaded: Cell<bool>,
    pub downloads: Cell<usize>,
    pub id_requests: Cell<usize>,
}

impl StubRelease {
    pub fn new(survey: &str, release: &str) -> Self {
        Self {
            info: ReleaseInfo {
                survey_name: format!("{survey} survey"),
                survey_abbrev: survey.to_string(),
                release: release.to_string(),
                ..ReleaseInfo::default()
            },
            bands: None,
            objects: BTreeMap::new(),
            downloaded: Cell::new(true),
            downloads: Cell::new(0),
            id_requests: Cell::new(0),
        }
    }

    /// Add an object with `n_rows` rows; each row records its owner.
    pub fn with_object(mut self, local_id: &str, n_rows: usize) -> Self {
        let rows = (0..n_rows)
            .map(|i| {
                Row::from([
                    ("time".to_string(), MetadataValue::Float(i as f64)),
                    ("owner".to_string(), MetadataValue::from(local_id)),
                ])
            })
            .collect();
        let meta = Meta::from([
            (OBJ_ID_KEY.to_string(), MetadataValue::from(local_id)),
            ("survey".to_string(), MetadataValue::from(self.info.survey_abbrev.as_str())),
        ]);
        let table = DataTable::new(vec!["time".into(), "owner".into()], rows).with_meta(meta);
        self.objects.insert(local_id.to_string(), table);
        self
    }

    pub fn photometric(mut self, bands: &[(&str, f64)]) -> Self {
        let bands = bands
            .iter()
            .map(|(name, zp)| Band {
                name: name.to_string(),
                zero_point: *zp,
                filter_file: None,
            })
            .collect();
        self.bands = Some(BandPasses::new(bands));
        self
    }

    pub fn with_references(mut self, survey_url: &str, ads_url: &str, publications: &[&str]) -> Self {
        self.info.survey_url = Some(survey_url.to_string());
        self.info.ads_url = Some(ads_url.to_string());
        self.info.publications = publications.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn not_downloaded(self) -> Self {
        self.downloaded.set(false);
        self
    }

    fn require_downloaded(&self) -> Result<()> {
        if self.downloaded.get() {
            Ok(())
        } else {
            Err(SnDataError::no_downloaded_data())
        }
    }
}

impl DataRelease for StubRelease {
    fn info(&self) -> &ReleaseInfo {
        &self.info
    }

    fn band_passes(&self) -> Option<&BandPasses> {
        self.bands.as_ref()
    }

    fn get_available_tables(&self) -> Result<Vec<TableId>> {
        self.require_downloaded()?;
        Ok(vec![TableId::Number(1)])
    }

    fn load_table(&self, table_id: &TableId) -> Result<DataTable> {
        self.require_downloaded()?;
        if *table_id != TableId::Number(1) {
            return Err(SnDataError::InvalidTableId(table_id.to_string()));
        }
        let meta = Meta::from([("description".to_string(), MetadataValue::from(self.name()))]);
        Ok(DataTable::default().with_meta(meta))
    }

    fn get_available_ids(&self) -> Result<Vec<String>> {
        self.require_downloaded()?;
        self.id_requests.set(self.id_requests.get() + 1);
        Ok(self.objects.keys().cloned().collect())
    }

    fn get_data_for_id(&self, local_id: &str, format_table: bool) -> Result<DataTable> {
        self.require_downloaded()?;
        let mut table = self
            .objects
            .get(local_id)
            .cloned()
            .ok_or_else(|| SnDataError::InvalidObjId(local_id.to_string()))?;
        table
            .meta
            .insert("formatted".to_string(), MetadataValue::Bool(format_table));
        Ok(table)
    }

    fn download_module_data(&self, _force: bool) -> Result<()> {
        self.downloads.set(self.downloads.get() + 1);
        self.downloaded.set(true);
        Ok(())
    }

    fn delete_module_data(&self) -> Result<()> {
        self.downloaded.set(false);
        Ok(())
    }

    fn register_filters(&self, _force: bool) -> Result<()> {
        self.require_downloaded()
    }
}
