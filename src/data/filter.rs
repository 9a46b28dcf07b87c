use std::collections::{BTreeMap, BTreeSet};

use super::model::{DataTable, MetadataValue};

// ---------------------------------------------------------------------------
// Metadata predicate: which values are selected per metadata key
// ---------------------------------------------------------------------------

/// Per-key selection over table metadata: key → set of accepted values.
///
/// A table passes when, for every key in the filter:
/// * the selected set is non-empty (an empty set rejects everything), and
/// * the table's value for that key is in the set, or the table lacks the
///   key and `Null` is selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaFilter {
    selected: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl MetaFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `value` for `key` in addition to anything already selected.
    pub fn select(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.selected
            .entry(key.to_string())
            .or_default()
            .insert(value.into());
        self
    }

    /// Toggle a single value in a key's selection.
    pub fn toggle(&mut self, key: &str, value: &MetadataValue) {
        let selected = self.selected.entry(key.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
    }

    /// Reject every table, whatever its value for `key`.
    pub fn select_none(&mut self, key: &str) {
        self.selected.insert(key.to_string(), BTreeSet::new());
    }

    /// Drop any constraint on `key`.
    pub fn clear(&mut self, key: &str) {
        self.selected.remove(key);
    }

    pub fn matches(&self, table: &DataTable) -> bool {
        self.selected.iter().all(|(key, selected)| {
            if selected.is_empty() {
                return false;
            }
            match table.meta.get(key) {
                Some(val) => selected.contains(val),
                None => selected.contains(&MetadataValue::Null),
            }
        })
    }

    /// Boxed predicate for [`IterOptions::filter`](crate::IterOptions).
    pub fn into_fn(self) -> Box<dyn Fn(&DataTable) -> bool> {
        Box::new(move |table| self.matches(table))
    }
}

/// Keep only tables with at least one row.
pub fn non_empty(table: &DataTable) -> bool {
    !table.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Meta;

    fn table_with_meta(pairs: &[(&str, MetadataValue)]) -> DataTable {
        let meta: Meta = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        DataTable::default().with_meta(meta)
    }

    #[test]
    fn empty_filter_accepts_everything() {
        assert!(MetaFilter::new().matches(&DataTable::default()));
    }

    #[test]
    fn selects_by_value() {
        let filter = MetaFilter::new().select("survey", "CSP");
        assert!(filter.matches(&table_with_meta(&[("survey", "CSP".into())])));
        assert!(!filter.matches(&table_with_meta(&[("survey", "DES".into())])));
    }

    #[test]
    fn missing_key_passes_only_with_null_selected() {
        let table = table_with_meta(&[]);
        let filter = MetaFilter::new().select("z", 0.1);
        assert!(!filter.matches(&table));

        let filter = filter.select("z", MetadataValue::Null);
        assert!(filter.matches(&table));
    }

    #[test]
    fn select_none_rejects_all() {
        let mut filter = MetaFilter::new().select("survey", "CSP");
        filter.select_none("survey");
        assert!(!filter.matches(&table_with_meta(&[("survey", "CSP".into())])));

        filter.clear("survey");
        assert!(filter.matches(&table_with_meta(&[("survey", "CSP".into())])));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut filter = MetaFilter::new();
        let csp = MetadataValue::from("CSP");
        filter.toggle("survey", &csp);
        assert!(filter.matches(&table_with_meta(&[("survey", csp.clone())])));
        filter.toggle("survey", &csp);
        assert!(!filter.matches(&table_with_meta(&[("survey", csp)])));
    }

    #[test]
    fn non_empty_rejects_tables_without_rows() {
        assert!(!non_empty(&DataTable::default()));
    }
}
