use std::fs::File;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::model::{FieldSchema, Record};
use super::reader::RecordReader;
use super::store::{DataView, PointStore};
use crate::config::Config;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Open a delimited file with the configured delimiter.
pub fn open_reader(path: &Path, config: &Config) -> Result<RecordReader<File>> {
    let reader = RecordReader::from_path(path, config.delimiter)?;
    log::info!(
        "opened {} with {} columns",
        path.display(),
        reader.fields().len()
    );
    Ok(reader)
}

/// Open a delimited file for chunked ingestion into `store`.
pub fn open_file(path: &Path, config: &Config, store: &mut PointStore) -> Result<Ingestor<File>> {
    Ingestor::new(open_reader(path, config)?, config, store)
}

// ---------------------------------------------------------------------------
// RecordBinding – record columns → point slots, resolved once
// ---------------------------------------------------------------------------

/// Positions of the record fields feeding each point coordinate and each
/// attribute component, looked up once per schema/configuration pair.
#[derive(Debug, Clone)]
pub struct RecordBinding {
    position: [Option<usize>; 3],
    components: Vec<Option<usize>>,
    row: Vec<f64>,
}

impl RecordBinding {
    /// Resolve column names against `schema`. Unknown columns are reported
    /// once here; at read time they yield `NaN` (coordinates) or the store's
    /// missing-value default (attributes).
    pub fn resolve(schema: &FieldSchema, config: &Config) -> Self {
        let lookup = |name: &str| {
            let position = schema.position(name);
            if position.is_none() {
                log::warn!("column {name:?} not found in header, its values will be missing");
            }
            position
        };

        let position = [
            lookup(config.position.x.as_str()),
            lookup(config.position.y.as_str()),
            lookup(config.position.z.as_str()),
        ];
        let components: Vec<Option<usize>> = config
            .attributes
            .iter()
            .flat_map(|binding| binding.sources())
            .map(|source| source.and_then(lookup))
            .collect();
        let row = Vec::with_capacity(components.len());

        RecordBinding {
            position,
            components,
            row,
        }
    }

    /// Coordinates and the flat attribute row of one record. The row buffer
    /// is reused between calls.
    pub fn extract(&mut self, record: &Record) -> ([f64; 3], &[f64]) {
        let coordinate = |slot: Option<usize>| slot.map_or(f64::NAN, |p| record.number_at(p));
        let xyz = [
            coordinate(self.position[0]),
            coordinate(self.position[1]),
            coordinate(self.position[2]),
        ];

        self.row.clear();
        self.row
            .extend(self.components.iter().map(|&slot| coordinate(slot)));
        (xyz, &self.row)
    }
}

// ---------------------------------------------------------------------------
// Ingestor – cooperative chunk loop
// ---------------------------------------------------------------------------

/// Outcome of one [`Ingestor::process_chunk`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkReport {
    /// Records consumed from the reader.
    pub records: usize,
    /// Records that became points.
    pub accepted: usize,
    /// Records dropped for invalid coordinates.
    pub skipped: usize,
    /// Published point count after the chunk.
    pub published: usize,
    /// No further chunk will be processed.
    pub finished: bool,
}

/// Totals over a whole ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub chunks: usize,
    pub records: u64,
    pub accepted: u64,
    pub skipped: u64,
    pub stopped: bool,
}

/// Feeds records into a [`PointStore`] in bounded chunks.
///
/// Each chunk reads at most `chunk_size` records, then publishes and
/// materializes the store so the new points become visible. Between chunks
/// control returns to the caller, which is where a host event loop gets to
/// run. The stop flag is only checked between chunks.
pub struct Ingestor<R> {
    reader: RecordReader<R>,
    binding: RecordBinding,
    chunk_size: usize,
    stop: Arc<AtomicBool>,
    summary: IngestSummary,
}

impl<R: Read> Ingestor<R> {
    /// Declare numeric fields on `reader`, configure the store's attributes
    /// and resolve the column binding.
    pub fn new(mut reader: RecordReader<R>, config: &Config, store: &mut PointStore) -> Result<Self> {
        config.validate()?;
        reader.declare_numeric_fields(config.numeric_fields.iter().cloned());
        store.configure_attributes(config.attribute_spec())?;
        let binding = RecordBinding::resolve(reader.fields(), config);

        Ok(Ingestor {
            reader,
            binding,
            chunk_size: config.chunk_size.max(1),
            stop: Arc::new(AtomicBool::new(false)),
            summary: IngestSummary::default(),
        })
    }

    /// Shared flag; set it to stop before the next chunk.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Whether another chunk would do any work.
    pub fn has_more(&self) -> bool {
        !self.is_stopped() && self.reader.has_next()
    }

    pub fn summary(&self) -> IngestSummary {
        IngestSummary {
            stopped: self.is_stopped(),
            ..self.summary
        }
    }

    pub fn reader(&self) -> &RecordReader<R> {
        &self.reader
    }

    /// Read up to one chunk of records into `store`, then publish.
    pub fn process_chunk(&mut self, store: &mut PointStore) -> Result<ChunkReport> {
        let mut report = ChunkReport::default();

        if !self.is_stopped() {
            while report.records < self.chunk_size {
                let Some(record) = self.reader.next()? else {
                    break;
                };
                report.records += 1;
                let ([x, y, z], row) = self.binding.extract(record);
                if store.add_point(x, y, z, row)? {
                    report.accepted += 1;
                } else {
                    report.skipped += 1;
                }
            }
            self.summary.chunks += 1;
        }

        if store.publish() {
            store.materialize();
        }
        report.published = store.number_of_points();
        report.finished = !self.has_more();

        self.summary.records += report.records as u64;
        self.summary.accepted += report.accepted as u64;
        self.summary.skipped += report.skipped as u64;
        log::debug!(
            "chunk {}: {} records, {} points published",
            self.summary.chunks,
            report.records,
            report.published
        );
        Ok(report)
    }

    /// Process chunks until the input is exhausted, the stop flag is set or
    /// `between_chunks` breaks. The callback sees each report and the freshly
    /// published view.
    pub fn run<F>(&mut self, store: &mut PointStore, mut between_chunks: F) -> Result<IngestSummary>
    where
        F: FnMut(&ChunkReport, DataView<'_>) -> ControlFlow<()>,
    {
        loop {
            let report = self.process_chunk(store)?;
            if between_chunks(&report, store.view()).is_break() {
                self.stop.store(true, Ordering::Relaxed);
            }
            if report.finished || self.is_stopped() {
                break;
            }
        }

        let summary = self.summary();
        log::info!(
            "ingestion {}: {} records, {} points, {} skipped",
            if summary.stopped { "stopped" } else { "done" },
            summary.records,
            summary.accepted,
            summary.skipped
        );
        Ok(summary)
    }
}
