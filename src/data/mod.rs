/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv   (one file per object)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → DataTable (rows + meta)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ DataTable │  rows of MetadataValue cells, table meta
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  metadata predicates for iteration
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
