use std::collections::BTreeSet;

use log::debug;

use crate::data::model::ObjectId;
use crate::error::Result;
use crate::release::DataRelease;

/// Every object id published by a set of releases, sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierIndex {
    ids: Vec<ObjectId>,
}

impl IdentifierIndex {
    /// Ask each release for its ids. Any release error aborts the build.
    pub fn build<'a, I, R>(releases: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a R>,
        R: DataRelease + ?Sized + 'a,
    {
        let mut ids = BTreeSet::new();
        for release in releases {
            let survey = release.survey_abbrev();
            let name = release.release();
            let local_ids = release.get_available_ids()?;
            debug!("index: {} ids from {}", local_ids.len(), release.name());
            ids.extend(
                local_ids
                    .into_iter()
                    .map(|local_id| ObjectId::new(local_id, name, survey)),
            );
        }
        Ok(Self::from_ids(ids))
    }

    pub fn from_ids<I: IntoIterator<Item = ObjectId>>(ids: I) -> Self {
        let ids: BTreeSet<ObjectId> = ids.into_iter().collect();
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn ids(&self) -> &[ObjectId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.ids.binary_search(id).is_ok()
    }

    /// All ids whose local part is `local_id`, across releases.
    pub fn lookup_local(&self, local_id: &str) -> &[ObjectId] {
        let start = self.ids.partition_point(|id| id.local_id.as_str() < local_id);
        let end = self.ids.partition_point(|id| id.local_id.as_str() <= local_id);
        &self.ids[start..end]
    }

    /// Ids restricted to a survey and/or release, in index order.
    pub fn filtered<'a>(
        &'a self,
        survey: Option<&'a str>,
        release: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ObjectId> + 'a {
        self.ids.iter().filter(move |id| {
            survey.map_or(true, |s| id.survey == s) && release.map_or(true, |r| id.release == r)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> IdentifierIndex {
        IdentifierIndex::from_ids([
            ObjectId::new("2004ef", "DR3", "CSP"),
            ObjectId::new("2004dt", "DR3", "CSP"),
            ObjectId::new("2004dt", "DR1", "CSP"),
            ObjectId::new("des_01", "SN3YR", "DES"),
            ObjectId::new("2004dt", "DR3", "CSP"),
        ])
    }

    #[test]
    fn ids_are_sorted_and_unique() {
        let index = index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.ids()[0], ObjectId::new("2004dt", "DR1", "CSP"));
        assert_eq!(index.ids()[3], ObjectId::new("des_01", "SN3YR", "DES"));
        assert!(index.contains(&ObjectId::new("2004ef", "DR3", "CSP")));
        assert!(!index.contains(&ObjectId::new("2004ef", "DR1", "CSP")));
    }

    #[test]
    fn lookup_local_spans_releases() {
        let index = index();
        assert_eq!(index.lookup_local("2004dt").len(), 2);
        assert_eq!(index.lookup_local("2004ef").len(), 1);
        assert!(index.lookup_local("2004").is_empty());
    }

    #[test]
    fn filters_by_survey_and_release() {
        let index = index();
        assert_eq!(index.filtered(Some("CSP"), None).count(), 3);
        assert_eq!(index.filtered(Some("CSP"), Some("DR1")).count(), 1);
        assert_eq!(index.filtered(None, Some("SN3YR")).count(), 1);
        assert_eq!(index.filtered(None, None).count(), 4);
    }
}
