use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ObjectId – one target in one survey's data release
// ---------------------------------------------------------------------------

/// Identifies one observed object within one survey's data release.
///
/// The derived ordering is lexicographic over `(local_id, release, survey)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub local_id: String,
    pub release: String,
    pub survey: String,
}

impl ObjectId {
    pub fn new(
        local_id: impl Into<String>,
        release: impl Into<String>,
        survey: impl Into<String>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            release: release.into(),
            survey: survey.into(),
        }
    }

    /// Key of the owning release, `"{survey}:{release}"`.
    pub fn release_key(&self) -> String {
        release_key(&self.survey, &self.release)
    }
}

/// Renders as `survey:release:local_id`.
impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.survey, self.release, self.local_id)
    }
}

impl<A, B, C> From<(A, B, C)> for ObjectId
where
    A: Into<String>,
    B: Into<String>,
    C: Into<String>,
{
    fn from((local_id, release, survey): (A, B, C)) -> Self {
        Self::new(local_id, release, survey)
    }
}

pub(crate) fn release_key(survey_abbrev: &str, release: &str) -> String {
    format!("{survey_abbrev}:{release}")
}

// ---------------------------------------------------------------------------
// MetadataValue – a single table cell or metadata entry
// ---------------------------------------------------------------------------

/// A dynamically-typed value used for table cells and record metadata.
/// Kept `Ord` so values can live in `BTreeMap` / `BTreeSet`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    Id(ObjectId),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
    Null,
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
                Id(_) => 6,
                List(_) => 7,
                Map(_) => 8,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            (Id(a), Id(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Id(id) => id.hash(state),
            MetadataValue::List(items) => items.hash(state),
            MetadataValue::Map(map) => map.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Id(id) => write!(f, "{id}"),
            MetadataValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            MetadataValue::Map(map) => write!(f, "<{} keys>", map.len()),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, MetadataValue>> {
        match self {
            MetadataValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<ObjectId> for MetadataValue {
    fn from(id: ObjectId) -> Self {
        MetadataValue::Id(id)
    }
}

// ---------------------------------------------------------------------------
// DataTable – the data returned for one object (or one joined cluster)
// ---------------------------------------------------------------------------

/// One table row: column name → cell.
pub type Row = BTreeMap<String, MetadataValue>;

/// Table-level metadata.
pub type Meta = BTreeMap<String, MetadataValue>;

/// Metadata key holding an object's id.
pub const OBJ_ID_KEY: &str = "obj_id";

static NULL: MetadataValue = MetadataValue::Null;

/// A row-oriented table with free-form metadata.
///
/// Rows need not carry every column; a missing cell reads as `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    /// Ordered column names.
    pub column_names: Vec<String>,
    pub rows: Vec<Row>,
    pub meta: Meta,
}

impl DataTable {
    pub fn new(column_names: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            column_names,
            rows,
            meta: Meta::new(),
        }
    }

    /// Build a table whose columns are every key seen in `rows`, sorted.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let names: BTreeSet<&String> = rows.iter().flat_map(|r| r.keys()).collect();
        let column_names = names.into_iter().cloned().collect();
        Self::new(column_names, rows)
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names.iter().any(|c| c == name)
    }

    /// Cell at `row` / `column`, `Null` when the row lacks that column.
    pub fn value(&self, row: usize, column: &str) -> &MetadataValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Vec<&MetadataValue> {
        self.rows
            .iter()
            .map(|r| r.get(name).unwrap_or(&NULL))
            .collect()
    }

    /// Set (or add) a column from one value per row.
    pub fn set_column<I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = MetadataValue>,
    {
        if !self.has_column(name) {
            self.column_names.push(name.to_string());
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(name.to_string(), value);
        }
    }

    /// Append the rows of `other` below this table.
    ///
    /// Columns unknown to `self` are appended to the column list in the
    /// order `other` declares them. `other.meta` is discarded.
    pub fn vstack(&mut self, other: DataTable) {
        for name in other.column_names {
            if !self.has_column(&name) {
                self.column_names.push(name);
            }
        }
        self.rows.extend(other.rows);
    }

    /// Object id recorded in the metadata, if it is a string.
    pub fn obj_id(&self) -> Option<&str> {
        self.meta.get(OBJ_ID_KEY).and_then(MetadataValue::as_str)
    }
}
