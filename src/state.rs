use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::color::ScalarColorMap;
use crate::config::Config;
use crate::data::filter::{FilterParams, FilterResult, RangeSetFilter};
use crate::data::loader::{self, ChunkReport, IngestSummary, Ingestor};
use crate::data::reader::RecordReader;
use crate::data::store::{PointCloudBounds, PointInfo, PointStore};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Host-side state of one ingestion session, independent of rendering.
///
/// The store only grows; restarting means building a new session. Every
/// filter change and every published chunk recomputes `visible` in full.
pub struct Session<R = File> {
    /// Point buffers.
    pub store: PointStore,

    /// `None` once the input is exhausted or ingestion was stopped.
    ingestor: Option<Ingestor<R>>,

    pub filter: RangeSetFilter,

    /// Points passing the current filter (primitive-index layout).
    pub visible: FilterResult,

    /// Attribute used for coloring.
    pub color_column: Option<String>,

    pub color_map: Option<ScalarColorMap>,

    /// Totals of the last ingestion.
    pub ingest: IngestSummary,
}

/// Snapshot of a session, suitable for printing as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub published_points: usize,
    pub visible_points: usize,
    pub capacity: usize,
    pub ingest: IngestSummary,
    pub fields: Vec<String>,
    pub center: Option<[f64; 3]>,
    /// Bounds in input coordinates.
    pub bounds: Option<PointCloudBounds>,
    pub filter: FilterParams,
    pub color_column: Option<String>,
    pub color_range: Option<(f64, f64)>,
}

impl Session<File> {
    /// Start a session over a delimited file.
    pub fn open_path(path: &Path, config: &Config) -> Result<Self> {
        Self::from_reader(loader::open_reader(path, config)?, config)
    }
}

impl<R: Read> Session<R> {
    /// Start a session over any reader of delimited text.
    pub fn open(input: R, config: &Config) -> Result<Self> {
        Self::from_reader(RecordReader::new(input, config.delimiter)?, config)
    }

    /// Start a session over an already opened record reader. The store is
    /// only allocated once the input is known to be readable.
    pub fn from_reader(reader: RecordReader<R>, config: &Config) -> Result<Self> {
        let mut store = PointStore::new(config.store)?;
        let ingestor = Ingestor::new(reader, config, &mut store)?;
        let filter = RangeSetFilter::new(config.filter.clone())
            .with_columns(config.bench_column.as_str(), config.pattern_column.as_str());
        let color_column = config
            .color_column
            .clone()
            .or_else(|| store.field_names().next().map(str::to_string));

        let mut session = Session {
            store,
            ingestor: Some(ingestor),
            filter,
            visible: FilterResult::default(),
            color_column,
            color_map: None,
            ingest: IngestSummary::default(),
        };
        session.refilter();
        Ok(session)
    }

    /// Whether more input remains to be ingested.
    pub fn loading(&self) -> bool {
        self.ingestor.as_ref().is_some_and(Ingestor::has_more)
    }

    /// Ingest one chunk, then refresh the filter and color range.
    pub fn step(&mut self) -> Result<Option<ChunkReport>> {
        let Some(ingestor) = self.ingestor.as_mut() else {
            return Ok(None);
        };
        let report = ingestor.process_chunk(&mut self.store)?;
        self.ingest = ingestor.summary();
        if report.finished {
            self.ingestor = None;
        }

        self.refilter();
        self.rebuild_color_map();
        Ok(Some(report))
    }

    /// Run [`step`](Self::step) until the input is exhausted.
    pub fn load_all(&mut self) -> Result<IngestSummary> {
        while let Some(report) = self.step()? {
            log::info!(
                "{} points published ({} skipped so far)",
                report.published,
                self.ingest.skipped
            );
        }
        Ok(self.ingest)
    }

    /// Stop before the next chunk. Points already published stay.
    pub fn stop(&mut self) {
        if let Some(ingestor) = self.ingestor.take() {
            ingestor
                .stop_handle()
                .store(true, std::sync::atomic::Ordering::Relaxed);
            self.ingest = ingestor.summary();
        }
    }

    /// Recompute `visible` from the published points.
    pub fn refilter(&mut self) {
        self.visible = self.filter.apply(&self.store.view());
    }

    /// Recompute the color map range from the published values.
    pub fn rebuild_color_map(&mut self) {
        let view = self.store.view();
        self.color_map = self.color_column.as_deref().and_then(|column| {
            let (lo, hi) = view.attribute(column)?.range(0)?;
            Some(ScalarColorMap::new(column, (f64::from(lo), f64::from(hi))))
        });
    }

    pub fn set_color_column(&mut self, column: &str) {
        self.color_column = Some(column.to_string());
        self.rebuild_color_map();
    }

    pub fn set_filter_field(&mut self, field: Option<&str>) {
        self.filter.set_field_to_filter(field);
        self.refilter();
    }

    pub fn set_range(&mut self, min: f64, max: f64) {
        self.filter.set_range(min, max);
        self.refilter();
    }

    pub fn set_min(&mut self, min: f64) {
        self.filter.set_min(min);
        self.refilter();
    }

    pub fn set_max(&mut self, max: f64) {
        self.filter.set_max(max);
        self.refilter();
    }

    pub fn set_selected_blocks(&mut self, list: Option<&str>) {
        self.filter.set_selected_blocks(list);
        self.refilter();
    }

    pub fn set_selected_patterns(&mut self, list: Option<&str>) {
        self.filter.set_selected_patterns(list);
        self.refilter();
    }

    /// Everything known about one published point.
    pub fn pick(&self, index: usize) -> Option<PointInfo> {
        self.store.view().point(index)
    }

    /// Bounds of the published points in input coordinates.
    pub fn bounds(&self) -> Option<PointCloudBounds> {
        let view = self.store.view();
        let bounds = view.bounds()?;
        Some(bounds.translated(view.center().unwrap_or_default()))
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            published_points: self.store.number_of_points(),
            visible_points: self.visible.len(),
            capacity: self.store.capacity(),
            ingest: self.ingest,
            fields: self.store.field_names().map(str::to_string).collect(),
            center: self.store.center(),
            bounds: self.bounds(),
            filter: self.filter.params().clone(),
            color_column: self.color_column.clone(),
            color_range: self.color_map.as_ref().map(|m| m.range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttributeBinding, PositionColumns};
    use crate::data::store::StoreOptions;

    const CSV: &str = "\
Hole,E,N,Elev,Bench,Pattern,rop
h1,500,100,10,1200,7,12
h2,501,101,11,1200,8,25
h3,502,102,12,1215,7,31
h4,503,103,13,1215,8,18
";

    fn config() -> Config {
        Config {
            numeric_fields: ["E", "N", "Elev", "Bench", "Pattern", "rop"]
                .map(String::from)
                .to_vec(),
            position: PositionColumns {
                x: "E".into(),
                y: "N".into(),
                z: "Elev".into(),
            },
            attributes: ["rop", "Bench", "Pattern"]
                .map(AttributeBinding::scalar)
                .to_vec(),
            store: StoreOptions {
                initial_capacity: 2,
                growth_increment: 2,
                generate_cells: true,
            },
            chunk_size: 2,
            filter: FilterParams {
                field_to_filter: Some("rop".into()),
                range: [0.0, 100.0],
                ..FilterParams::default()
            },
            ..Config::default()
        }
    }

    fn session() -> Session<&'static [u8]> {
        Session::open(CSV.as_bytes(), &config()).unwrap()
    }

    #[test]
    fn visible_set_follows_each_chunk() {
        let mut session = session();
        assert!(session.loading());
        assert!(session.visible.is_empty());

        session.step().unwrap();
        assert_eq!(session.visible.indices(), [0, 1]);

        let last = session.step().unwrap().unwrap();
        assert!(last.finished);
        assert!(!session.loading());
        assert_eq!(session.visible.indices(), [0, 1, 2, 3]);
        assert!(session.step().unwrap().is_none());
    }

    #[test]
    fn parameter_changes_refilter() {
        let mut session = session();
        session.load_all().unwrap();

        session.set_range(15.0, 30.0);
        assert_eq!(session.visible.indices(), [1, 3]);

        session.set_max(40.0);
        assert_eq!(session.visible.indices(), [1, 2, 3]);

        session.set_selected_blocks(Some("1215"));
        assert_eq!(session.visible.indices(), [2, 3]);

        session.set_selected_patterns(Some("8"));
        assert_eq!(session.visible.indices(), [3]);

        session.set_filter_field(None);
        session.set_selected_blocks(None);
        assert_eq!(session.visible.indices(), [1, 3]);
        assert_eq!(session.visible.as_cells(), [2, 1, 3]);
    }

    #[test]
    fn color_map_tracks_data_range() {
        let mut session = session();
        assert_eq!(session.color_column.as_deref(), Some("rop"));
        session.load_all().unwrap();
        assert_eq!(session.color_map.as_ref().unwrap().range, (12.0, 31.0));

        session.set_color_column("Bench");
        assert_eq!(session.color_map.as_ref().unwrap().range, (1200.0, 1215.0));

        session.set_color_column("nope");
        assert!(session.color_map.is_none());
    }

    #[test]
    fn picking_and_summary() {
        let mut session = session();
        session.load_all().unwrap();

        let info = session.pick(2).unwrap();
        assert_eq!(info.absolute_position, [502.0, 102.0, 12.0]);
        assert_eq!(info.attributes[0], ("rop".to_string(), vec![31.0]));

        let summary = session.summary();
        assert_eq!(summary.published_points, 4);
        assert_eq!(summary.visible_points, 4);
        assert_eq!(summary.ingest.accepted, 4);
        let bounds = summary.bounds.unwrap();
        assert_eq!((bounds.min_x, bounds.max_x), (500.0, 503.0));
        assert_eq!(summary.fields, ["rop", "Bench", "Pattern"]);
    }

    #[test]
    fn stopping_keeps_published_points() {
        let mut session = session();
        session.step().unwrap();
        session.stop();
        assert!(!session.loading());
        assert!(session.step().unwrap().is_none());
        assert_eq!(session.store.number_of_points(), 2);
        assert!(session.ingest.stopped);
    }
}
