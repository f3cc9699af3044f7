/// Data layer: record parsing, point storage, ingestion and filtering.
///
/// Architecture:
/// ```text
///  delimited text
///        │
///        ▼
///   ┌──────────┐
///   │  reader   │  header → FieldSchema, lines → Record (one at a time)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  bind columns once, feed chunks, publish
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  store    │  center-relative columnar buffers, published window
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  range + set predicates → visible indices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod reader;
pub mod store;
