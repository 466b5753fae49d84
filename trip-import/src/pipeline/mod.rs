use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    dedup::{DuplicateDetector, InMemoryDuplicateDetector},
    emit::{duplicates::DuplicateSink, BulkLoader},
    error::{ConfigError, PipelineError},
    metrics_consts::{
        BATCH_FLUSH_TIME, BATCH_SIZE, DUPLICATE_SINK_FAILURES, ROWS_DUPLICATE, ROWS_INVALID,
        ROWS_LOADED, ROWS_READ,
    },
    metrics_utils::timing_guard,
    normalize::RecordNormalizer,
    parse::FieldParser,
    source::RecordSource,
    types::RawRow,
};

pub mod batch;
pub mod stats;

use batch::BatchAccumulator;
pub use stats::ImportStats;

/// Drives rows from a source through parsing, normalization and
/// deduplication, loading new trips in batches and handing duplicates to the
/// sink. One row is fully handled before the next is read.
pub struct TripImportPipeline {
    parser: FieldParser,
    normalizer: RecordNormalizer,
    detector: Box<dyn DuplicateDetector>,
    loader: Box<dyn BulkLoader>,
    duplicates: Box<dyn DuplicateSink>,
    batch: BatchAccumulator,
    stats: ImportStats,
}

impl TripImportPipeline {
    pub fn new(
        config: &PipelineConfig,
        loader: Box<dyn BulkLoader>,
        duplicates: Box<dyn DuplicateSink>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            parser: FieldParser::new(config.datetime_format.clone()),
            normalizer: RecordNormalizer::new(config)?,
            detector: Box::new(InMemoryDuplicateDetector::with_capacity(config.batch_size)),
            loader,
            duplicates,
            batch: BatchAccumulator::new(config.batch_size),
            stats: ImportStats::default(),
        })
    }

    pub fn with_detector(mut self, detector: Box<dyn DuplicateDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Consumes the source to the end. Either every accepted trip has been
    /// handed to the loader and the stats are returned, or the run failed and
    /// nothing further is flushed.
    pub async fn run<S>(
        mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<ImportStats, PipelineError>
    where
        S: RecordSource + ?Sized,
    {
        info!("Starting trip import");

        loop {
            if cancel.is_cancelled() {
                warn!(
                    "Import cancelled after {} rows, {} buffered trips discarded",
                    self.stats.total_rows_read,
                    self.batch.len()
                );
                return Err(PipelineError::Cancelled);
            }

            let Some(row) = source.next_row().await? else {
                break;
            };
            self.process_row(row).await?;
        }

        if !self.batch.is_empty() {
            self.flush().await?;
        }

        info!(
            "Trip import finished: read {}, parsed {}, invalid {}, duplicates {}, inserted {}, duplicates written {}",
            self.stats.total_rows_read,
            self.stats.parsed_rows,
            self.stats.invalid_rows,
            self.stats.duplicate_rows,
            self.stats.inserted_rows,
            self.stats.duplicates_file_rows
        );
        Ok(self.stats)
    }

    async fn process_row(&mut self, row: RawRow) -> Result<(), PipelineError> {
        self.stats.total_rows_read += 1;
        metrics::counter!(ROWS_READ).increment(1);

        let parsed = match self.parser.parse(&row) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping line {}: {}", row.line_number, e);
                self.stats.invalid_rows += 1;
                metrics::counter!(ROWS_INVALID, &[("stage", "parse")]).increment(1);
                return Ok(());
            }
        };
        self.stats.parsed_rows += 1;

        let trip = match self.normalizer.normalize(parsed) {
            Ok(trip) => trip,
            Err(e) => {
                warn!("Skipping line {}: {}", row.line_number, e);
                self.stats.invalid_rows += 1;
                metrics::counter!(ROWS_INVALID, &[("stage", "normalize")]).increment(1);
                return Ok(());
            }
        };

        if !self.detector.try_register(&trip) {
            debug!("Line {} duplicates an earlier trip", row.line_number);
            self.stats.duplicate_rows += 1;
            metrics::counter!(ROWS_DUPLICATE).increment(1);
            match self.duplicates.write(&row).await {
                Ok(()) => self.stats.duplicates_file_rows += 1,
                Err(e) => {
                    warn!(
                        "Failed to record duplicate line {}: {}",
                        row.line_number, e
                    );
                    metrics::counter!(DUPLICATE_SINK_FAILURES).increment(1);
                }
            }
            return Ok(());
        }

        if self.batch.push(trip) {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), PipelineError> {
        let size = self.batch.len();
        let timer = timing_guard(BATCH_FLUSH_TIME);
        self.loader.load(self.batch.records()).await?;
        timer.label("outcome", "success").fin();

        self.stats.inserted_rows += size as u64;
        self.batch.clear();
        metrics::histogram!(BATCH_SIZE).record(size as f64);
        metrics::counter!(ROWS_LOADED).increment(size as u64);
        info!(
            "Loaded batch of {} trips, {} loaded so far",
            size, self.stats.inserted_rows
        );
        Ok(())
    }
}
