use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use csv::{QuoteStyle, Terminator};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::info;

use crate::{
    error::SinkError,
    types::{Column, RawRow},
};

pub const LINE_NUMBER_HEADER: &str = "line_number";

/// Somewhere to keep rows rejected as duplicates. Failures are reported to the
/// caller, which decides whether they matter.
#[async_trait]
pub trait DuplicateSink: Send {
    async fn write(&mut self, row: &RawRow) -> Result<(), SinkError>;
}

/// Appends duplicate rows to a delimited file: the data line number followed by
/// the input columns in their canonical order. The header is only written when
/// the file is new (or empty), so repeated runs keep appending to one file.
pub struct CsvDuplicateSink {
    path: PathBuf,
    delimiter: u8,
    file: Option<File>,
}

impl CsvDuplicateSink {
    pub fn new(path: PathBuf, delimiter: u8) -> Self {
        Self {
            path,
            delimiter,
            file: None,
        }
    }

    async fn open(&self) -> Result<File, SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        if file.metadata().await?.len() == 0 {
            info!("Creating duplicates file at {}", self.path.display());
            let header = std::iter::once(LINE_NUMBER_HEADER)
                .chain(Column::ALL.iter().map(|c| c.header_name()));
            file.write_all(&encode_record(self.delimiter, header)?)
                .await?;
        }

        Ok(file)
    }
}

#[async_trait]
impl DuplicateSink for CsvDuplicateSink {
    async fn write(&mut self, row: &RawRow) -> Result<(), SinkError> {
        let line = encode_row(self.delimiter, row)?;

        // Opened lazily so a run without duplicates leaves no file behind. On a
        // failed write the handle is dropped and reopened on the next call.
        let mut file = match self.file.take() {
            Some(file) => file,
            None => self.open().await?,
        };
        file.write_all(&line).await?;
        file.flush().await?;
        self.file = Some(file);
        Ok(())
    }
}

pub fn encode_row(delimiter: u8, row: &RawRow) -> Result<Vec<u8>, SinkError> {
    let line_number = row.line_number.to_string();
    let fields = std::iter::once(line_number.as_str())
        .chain(row.fields.iter().map(|f| f.as_deref().unwrap_or_default()));
    encode_record(delimiter, fields)
}

/// RFC4180 quoting: a field is quoted only when it contains the delimiter, a
/// quote, CR or LF, with inner quotes doubled.
pub fn encode_record<I, T>(delimiter: u8, fields: I) -> Result<Vec<u8>, SinkError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer.into_inner().map_err(|e| SinkError::Io(e.into_error()))
}

/// Collects duplicate rows in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryDuplicateSink {
    rows: Arc<Mutex<Vec<RawRow>>>,
}

impl MemoryDuplicateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<RawRow> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DuplicateSink for MemoryDuplicateSink {
    async fn write(&mut self, row: &RawRow) -> Result<(), SinkError> {
        if let Ok(mut rows) = self.rows.lock() {
            rows.push(row.clone());
        }
        Ok(())
    }
}
