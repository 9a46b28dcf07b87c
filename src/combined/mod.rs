//! Several data releases presented as one catalog.
//!
//! A [`CombinedDataset`] indexes the object ids of every member release and
//! forwards data requests to the release owning each id. Ids from different
//! releases can be joined to declare that they observe the same object; data
//! requested for any member of a joined cluster comes back as one table
//! stacking every member's rows:
//!
//! ```text
//!   get_data_for_id(id)
//!        │
//!        ├── id in a cluster? ── yes ──► fetch each member (sorted order)
//!        │                               vstack rows, nest member meta
//!        │
//!        └── no ──► owning release.get_data_for_id(local_id)
//! ```

mod clusterer;
mod index;

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use log::{debug, info, warn};

pub use clusterer::{Cluster, IdentityClusterer, reduce_clusters};
pub use index::IdentifierIndex;

use crate::data::model::{DataTable, MetadataValue, OBJ_ID_KEY, ObjectId, release_key};
use crate::error::{Result, SnDataError};
use crate::release::{DataRelease, DataType, TableId};

/// Records between progress lines when iterating verbosely.
const PROGRESS_EVERY: usize = 100;

/// Predicate deciding which records [`CombinedDataset::iter_data`] yields.
pub type FilterFn = Box<dyn Fn(&DataTable) -> bool>;

/// Options for [`CombinedDataset::iter_data`].
pub struct IterOptions {
    /// Only iterate ids of this survey.
    pub survey: Option<String>,
    /// Only iterate ids of this release.
    pub release: Option<String>,
    /// Log progress at `info` level.
    pub verbose: bool,
    pub format_table: bool,
    /// Skip records for which this returns false.
    pub filter: Option<FilterFn>,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            survey: None,
            release: None,
            verbose: false,
            format_table: true,
            filter: None,
        }
    }
}

impl IterOptions {
    pub fn survey(mut self, survey: impl Into<String>) -> Self {
        self.survey = Some(survey.into());
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn format_table(mut self, format_table: bool) -> Self {
        self.format_table = format_table;
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&DataTable) -> bool + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }
}

/// Data from several survey releases behind one accessor-like interface.
pub struct CombinedDataset {
    /// Member releases in registration order, unique by `survey:release`.
    releases: Vec<(String, Rc<dyn DataRelease>)>,
    /// Built on first use: releases may not be downloaded at construction.
    index: OnceCell<IdentifierIndex>,
    clusterer: IdentityClusterer,
}

impl CombinedDataset {
    /// Combine `releases`. The same release instance given twice is kept
    /// once; a later release reusing a `survey:release` key replaces the
    /// earlier one.
    pub fn new<I>(releases: I) -> Result<Self>
    where
        I: IntoIterator<Item = Rc<dyn DataRelease>>,
    {
        let mut members: Vec<(String, Rc<dyn DataRelease>)> = Vec::new();
        for release in releases {
            if members.iter().any(|(_, r)| Rc::ptr_eq(r, &release)) {
                continue;
            }
            let key = release_key(release.survey_abbrev(), release.release());
            match members.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => {
                    warn!("release {key} registered twice, keeping the last one");
                    slot.1 = release;
                }
                None => members.push((key, release)),
            }
        }

        if members.is_empty() {
            return Err(SnDataError::InvalidArgument(
                "a combined dataset needs at least one data release".into(),
            ));
        }

        debug!(
            "combined dataset over {}",
            members.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>().join(", ")
        );
        Ok(Self {
            releases: members,
            index: OnceCell::new(),
            clusterer: IdentityClusterer::new(),
        })
    }

    pub fn releases(&self) -> impl Iterator<Item = &Rc<dyn DataRelease>> {
        self.releases.iter().map(|(_, r)| r)
    }

    fn release_for(&self, survey: &str, release: &str) -> Option<&Rc<dyn DataRelease>> {
        let key = release_key(survey, release);
        self.releases.iter().find(|(k, _)| *k == key).map(|(_, r)| r)
    }

    // -- aggregated release metadata --

    pub fn survey_names(&self) -> Vec<&str> {
        self.releases().map(|r| r.info().survey_name.as_str()).collect()
    }

    pub fn survey_abbrevs(&self) -> Vec<&str> {
        self.releases().map(|r| r.survey_abbrev()).collect()
    }

    pub fn release_names(&self) -> Vec<&str> {
        self.releases().map(|r| r.release()).collect()
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.releases().map(|r| r.data_type()).collect()
    }

    pub fn survey_urls(&self) -> Vec<Option<&str>> {
        self.releases().map(|r| r.info().survey_url.as_deref()).collect()
    }

    /// Publications of each release, in registration order.
    pub fn publications(&self) -> Vec<&[String]> {
        self.releases().map(|r| r.info().publications.as_slice()).collect()
    }

    pub fn ads_urls(&self) -> Vec<Option<&str>> {
        self.releases().map(|r| r.info().ads_url.as_deref()).collect()
    }

    /// Sorted, de-duplicated band names of every member release.
    ///
    /// Fails with [`SnDataError::ObservedDataType`] when any member is
    /// spectroscopic.
    pub fn band_names(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for release in self.releases() {
            let bands = release.band_passes().ok_or_else(|| {
                SnDataError::ObservedDataType(format!(
                    "Survey {} does not have registered photometric band passes.",
                    release.name()
                ))
            })?;
            names.extend(bands.band_names().into_iter().map(str::to_string));
        }
        Ok(names.into_iter().collect())
    }

    /// Zero point of each band in [`band_names`](Self::band_names).
    pub fn zero_point(&self) -> Result<Vec<f64>> {
        self.band_names()?
            .iter()
            .map(|band| {
                self.releases()
                    .find_map(|r| r.band_passes().and_then(|b| b.zero_point_for(band)))
                    .ok_or_else(|| {
                        SnDataError::ObservedDataType(format!("no zero point for band {band}"))
                    })
            })
            .collect()
    }

    // -- published tables --

    /// `(survey, release, table id)` of every table published by a member.
    pub fn get_available_tables(&self) -> Result<Vec<(String, String, TableId)>> {
        let mut tables = Vec::new();
        for release in self.releases() {
            for table_id in release.get_available_tables()? {
                tables.push((
                    release.survey_abbrev().to_string(),
                    release.release().to_string(),
                    table_id,
                ));
            }
        }
        Ok(tables)
    }

    pub fn load_table(&self, survey: &str, release: &str, table_id: &TableId) -> Result<DataTable> {
        let data_release = self.release_for(survey, release).ok_or_else(|| {
            SnDataError::InvalidTableId(format!("{survey} {release} table {table_id}"))
        })?;
        data_release.load_table(table_id)
    }

    // -- object ids --

    fn index(&self) -> Result<&IdentifierIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let built = IdentifierIndex::build(self.releases().map(Rc::as_ref))?;
        info!("indexed {} object ids from {} releases", built.len(), self.releases.len());
        Ok(self.index.get_or_init(|| built))
    }

    /// Every object id of every member release, sorted by
    /// `(local_id, release, survey)`.
    pub fn get_available_ids(&self) -> Result<Vec<ObjectId>> {
        Ok(self.index()?.ids().to_vec())
    }

    /// Available ids with each joined cluster reduced to its base member,
    /// so every physical object appears once.
    pub fn get_representative_ids(&self) -> Result<Vec<ObjectId>> {
        let index = self.index()?;
        Ok(index
            .ids()
            .iter()
            .filter(|id| match self.clusterer.cluster_of(id) {
                Some(cluster) => cluster.first() == Some(*id),
                None => true,
            })
            .cloned()
            .collect())
    }

    /// Full id of an object known only by its local id.
    pub fn resolve_id(&self, local_id: &str) -> Result<ObjectId> {
        match self.index()?.lookup_local(local_id) {
            [] => Err(SnDataError::InvalidObjId(local_id.to_string())),
            [id] => Ok(id.clone()),
            _ => Err(SnDataError::AmbiguousObjId(local_id.to_string())),
        }
    }

    // -- data access --

    /// Data for `obj_id`.
    ///
    /// For an id in a joined cluster the result stacks every member's rows.
    /// Its meta holds `obj_id`, the list of members in merge order, plus one
    /// map per member (keyed `survey:release:local_id`) with that member's own
    /// meta minus its `obj_id`. Members merge in ascending id order; the first
    /// is the base record.
    pub fn get_data_for_id(&self, obj_id: &ObjectId, format_table: bool) -> Result<DataTable> {
        match self.clusterer.cluster_of(obj_id) {
            Some(cluster) => self.get_data_for_cluster(cluster, format_table),
            None => self.get_data_single_id(obj_id, format_table),
        }
    }

    fn get_data_single_id(&self, obj_id: &ObjectId, format_table: bool) -> Result<DataTable> {
        let release = self
            .release_for(&obj_id.survey, &obj_id.release)
            .ok_or_else(|| SnDataError::InvalidObjId(obj_id.to_string()))?;
        release
            .get_data_for_id(&obj_id.local_id, format_table)
            .map_err(|e| match e {
                SnDataError::InvalidObjId(_) => SnDataError::InvalidObjId(obj_id.to_string()),
                other => other,
            })
    }

    fn get_data_for_cluster(&self, cluster: &Cluster, format_table: bool) -> Result<DataTable> {
        let mut members = cluster.iter();
        let base_id = members
            .next()
            .ok_or_else(|| SnDataError::InvalidArgument("empty id cluster".into()))?;

        let mut combined = self.get_data_single_id(base_id, format_table)?;
        let mut base_meta = std::mem::take(&mut combined.meta);
        base_meta.remove(OBJ_ID_KEY);
        combined
            .meta
            .insert(base_id.to_string(), MetadataValue::Map(base_meta));
        let mut obj_ids = vec![MetadataValue::Id(base_id.clone())];

        for obj_id in members {
            let mut table = self.get_data_single_id(obj_id, format_table)?;
            let mut meta = std::mem::take(&mut table.meta);
            meta.remove(OBJ_ID_KEY);

            combined.vstack(table);
            combined
                .meta
                .insert(obj_id.to_string(), MetadataValue::Map(meta));
            obj_ids.push(MetadataValue::Id(obj_id.clone()));
        }

        combined
            .meta
            .insert(OBJ_ID_KEY.to_string(), MetadataValue::List(obj_ids));
        Ok(combined)
    }

    /// Lazily yield [`get_data_for_id`](Self::get_data_for_id) for each
    /// indexed id, in index order. Iteration stops after the first error.
    pub fn iter_data(&self, options: IterOptions) -> DataIter<'_> {
        DataIter {
            dataset: self,
            options,
            ids: None,
            position: 0,
            yielded: 0,
            done: false,
        }
    }

    // -- joined ids --

    /// Declare that `obj_ids` are the same object.
    pub fn join_ids<I>(&mut self, obj_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = ObjectId>,
    {
        self.clusterer.join(obj_ids)
    }

    /// Undo joins involving `obj_ids`.
    pub fn separate_ids<I>(&mut self, obj_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = ObjectId>,
    {
        self.clusterer.separate(obj_ids)
    }

    pub fn get_joined_ids(&self) -> Vec<Cluster> {
        self.clusterer.clusters()
    }

    // -- local data management --

    pub fn download_module_data(&self, force: bool) -> Result<()> {
        for release in self.releases() {
            debug!("downloading {}", release.name());
            release.download_module_data(force)?;
        }
        Ok(())
    }

    pub fn delete_module_data(&self) -> Result<()> {
        for release in self.releases() {
            debug!("deleting data for {}", release.name());
            release.delete_module_data()?;
        }
        Ok(())
    }

    /// Register filters of every member; a member without local data fails
    /// with [`SnDataError::NoDownloadedData`] naming it.
    pub fn register_filters(&self, force: bool) -> Result<()> {
        for release in self.releases() {
            release.register_filters(force).map_err(|e| {
                if e.is_not_downloaded() {
                    SnDataError::NoDownloadedData(format!("No data downloaded for {}", release.name()))
                } else {
                    e
                }
            })?;
        }
        Ok(())
    }
}

/// Iterator returned by [`CombinedDataset::iter_data`].
pub struct DataIter<'a> {
    dataset: &'a CombinedDataset,
    options: IterOptions,
    /// Ids to visit, resolved on the first call to `next`.
    ids: Option<Vec<ObjectId>>,
    position: usize,
    yielded: usize,
    done: bool,
}

impl DataIter<'_> {
    fn load_ids(&self) -> Result<Vec<ObjectId>> {
        let index = self.dataset.index()?;
        Ok(index
            .filtered(self.options.survey.as_deref(), self.options.release.as_deref())
            .cloned()
            .collect())
    }
}

impl Iterator for DataIter<'_> {
    type Item = Result<DataTable>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.ids.is_none() {
            match self.load_ids() {
                Ok(ids) => self.ids = Some(ids),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        let total = self.ids.as_ref().map_or(0, Vec::len);

        while let Some(obj_id) = self.ids.as_ref().and_then(|ids| ids.get(self.position)).cloned() {
            self.position += 1;
            if self.options.verbose && self.position % PROGRESS_EVERY == 0 {
                info!("iter_data: {}/{total} ids visited", self.position);
            }

            let data = match self.dataset.get_data_for_id(&obj_id, self.options.format_table) {
                Ok(data) => data,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let keep = self.options.filter.as_ref().map_or(true, |f| f(&data));
            if keep {
                self.yielded += 1;
                return Some(Ok(data));
            }
        }

        if self.options.verbose {
            info!("iter_data: finished, {} of {total} records yielded", self.yielded);
        }
        self.done = true;
        None
    }
}
