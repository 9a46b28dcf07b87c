use std::collections::BTreeSet;
use std::mem;

use log::debug;

use crate::data::model::ObjectId;
use crate::error::{Result, SnDataError};

/// Object ids known to refer to the same physical object.
pub type Cluster = BTreeSet<ObjectId>;

/// Merge every group of sets that share an element, transitively.
///
/// The first remaining candidate seeds a cluster and absorbs any candidate
/// it intersects, pass after pass, until it stops growing. Seeds with fewer
/// than two members are dropped. Output clusters keep the relative order of
/// their seeds.
pub fn reduce_clusters<T: Ord>(candidates: Vec<BTreeSet<T>>) -> Vec<BTreeSet<T>> {
    let mut remaining = candidates;
    let mut reduced = Vec::new();

    while !remaining.is_empty() {
        let mut seed = remaining.remove(0);

        loop {
            let size = seed.len();
            let mut rest = Vec::with_capacity(remaining.len());
            for candidate in mem::take(&mut remaining) {
                if seed.is_disjoint(&candidate) {
                    rest.push(candidate);
                } else {
                    seed.extend(candidate);
                }
            }
            remaining = rest;

            if seed.len() == size {
                break;
            }
        }

        if seed.len() > 1 {
            reduced.push(seed);
        }
    }

    reduced
}

/// A partition of object ids into joined clusters.
///
/// After every call the clusters are pairwise disjoint and each holds at
/// least two ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityClusterer {
    clusters: Vec<Cluster>,
}

impl IdentityClusterer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `ids` as the same object, merging with any overlapping cluster.
    pub fn join<I>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = ObjectId>,
    {
        let ids: Vec<ObjectId> = ids.into_iter().collect();
        if ids.len() < 2 {
            return Err(SnDataError::InvalidArgument(
                "Object IDs can only be joined in sets of 2 or more.".into(),
            ));
        }

        debug!("joining {} object ids", ids.len());
        let mut clusters = mem::take(&mut self.clusters);
        clusters.push(ids.into_iter().collect());
        self.clusters = reduce_clusters(clusters);
        Ok(())
    }

    /// Remove `ids` from every cluster. Remnants smaller than two are dropped.
    pub fn separate<I>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = ObjectId>,
    {
        let ids: Vec<ObjectId> = ids.into_iter().collect();
        if ids.len() < 2 {
            return Err(SnDataError::InvalidArgument(
                "Object IDs can only be separated in sets of 2 or more.".into(),
            ));
        }

        debug!("separating {} object ids", ids.len());
        let ids: Cluster = ids.into_iter().collect();
        let clusters: Vec<Cluster> = mem::take(&mut self.clusters)
            .into_iter()
            .map(|cluster| cluster.difference(&ids).cloned().collect())
            .collect();
        self.clusters = reduce_clusters(clusters);
        Ok(())
    }

    /// A copy of the current partition.
    pub fn clusters(&self) -> Vec<Cluster> {
        self.clusters.clone()
    }

    pub fn cluster_of(&self, id: &ObjectId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.contains(id))
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}
