//! Fixtures and collaborator doubles shared by the pipeline integration tests.
#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tokio_util::sync::CancellationToken;
use trip_import::{
    config::PipelineConfig,
    emit::{duplicates::DuplicateSink, BulkLoader},
    error::{LoadError, SinkError, SourceError},
    source::RecordSource,
    types::{RawRow, TripRecord},
};

pub const HEADER: &str = "tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,store_and_fwd_flag,PULocationID,DOLocationID,fare_amount,tip_amount";

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

/// A valid comma separated row whose pickup is `minutes` after the base time.
pub fn trip_line(minutes: i64, passengers: u8, fare: &str) -> String {
    let pickup = base_time() + Duration::minutes(minutes);
    let dropoff = pickup + Duration::minutes(10);
    format!(
        "{},{},{passengers},2.50,N,{},{},{fare},1.25",
        pickup.format("%Y-%m-%d %H:%M:%S"),
        dropoff.format("%Y-%m-%d %H:%M:%S"),
        100 + minutes % 50,
        200 + minutes % 30,
    )
}

pub fn write_input(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join("trips.csv");
    let mut contents = String::from(HEADER);
    contents.push('\n');
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    fs::write(&path, contents).unwrap();
    path
}

pub fn pipeline_config(dir: &Path, batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        input_path: dir.join("trips.csv"),
        duplicates_path: dir.join("out").join("duplicates.csv"),
        batch_size,
        input_time_zone: None,
        delimiter: b',',
        datetime_format: None,
    }
}

/// Fails every load.
pub struct FailingLoader;

#[async_trait]
impl BulkLoader for FailingLoader {
    async fn load(&mut self, batch: &[TripRecord]) -> Result<(), LoadError> {
        Err(LoadError::RowCountMismatch {
            expected: batch.len() as u64,
            actual: 0,
        })
    }
}

/// Fails every write.
pub struct FailingSink;

#[async_trait]
impl DuplicateSink for FailingSink {
    async fn write(&mut self, _row: &RawRow) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
}

/// Wraps a source and trips the token once `after` rows have been handed out.
pub struct CancellingSource<S> {
    pub inner: S,
    pub cancel: CancellationToken,
    pub after: usize,
    pub yielded: usize,
}

#[async_trait]
impl<S: RecordSource> RecordSource for CancellingSource<S> {
    async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        let row = self.inner.next_row().await?;
        if row.is_some() {
            self.yielded += 1;
            if self.yielded >= self.after {
                self.cancel.cancel();
            }
        }
        Ok(row)
    }
}
