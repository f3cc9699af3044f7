//! Streaming ingestion of measure-while-drilling exports into a growable,
//! center-relative columnar point store, with range and set filtering over
//! the published points.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use mwd_cloud::{Config, Session};
//!
//! let mut session = Session::open_path(Path::new("drill.csv"), &Config::default())?;
//! session.load_all()?;
//! session.set_filter_field(Some("rop"));
//! session.set_range(10.0, 40.0);
//! println!("{} of {} points visible", session.visible.len(), session.store.number_of_points());
//! # Ok::<(), mwd_cloud::Error>(())
//! ```

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use config::Config;
pub use data::filter::{FilterParams, FilterResult, RangeSetFilter};
pub use data::loader::{ChunkReport, IngestSummary, Ingestor};
pub use data::model::{FieldSchema, FieldValue, Record};
pub use data::reader::RecordReader;
pub use data::store::{AttributeSpec, DataView, PointStore, StoreOptions};
pub use error::{Error, Result};
pub use state::{Session, SessionSummary};
