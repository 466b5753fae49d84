use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
};
use tracing::{debug, info};

use super::RecordSource;
use crate::{
    error::SourceError,
    types::{Column, RawRow},
};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Reads a delimited text file line by line. The header is resolved when the
/// source is opened, so a file with missing columns fails before any row is
/// handed out. Bytes that are not valid UTF-8 are replaced rather than treated
/// as an I/O failure, leaving the row to fail field parsing on its own.
pub struct DelimitedFileSource<R> {
    reader: R,
    buf: Vec<u8>,
    delimiter: u8,
    positions: [usize; Column::COUNT],
    physical_line: usize,
    rows_yielded: usize,
    exhausted: bool,
}

impl DelimitedFileSource<BufReader<File>> {
    pub async fn open(path: &Path, delimiter: u8) -> Result<Self, SourceError> {
        let file = match File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        info!("Opened input file {}", path.display());
        Self::from_reader(BufReader::new(file), delimiter, path.to_path_buf()).await
    }
}

impl<R> DelimitedFileSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    // `origin` is only used to describe the input in errors
    pub async fn from_reader(
        mut reader: R,
        delimiter: u8,
        origin: PathBuf,
    ) -> Result<Self, SourceError> {
        let mut buf = Vec::new();
        let mut physical_line = 0;

        let header = loop {
            let Some(line) = read_line(&mut reader, &mut buf).await? else {
                return Err(SourceError::Empty(origin));
            };
            physical_line += 1;
            if !line.trim().is_empty() {
                break line;
            }
        };

        let header = header.trim_start_matches(BYTE_ORDER_MARK);
        let names = split_line(header, delimiter, physical_line)?;
        let positions = resolve_header(&names)?;
        debug!("Resolved header positions: {:?}", positions);

        Ok(Self {
            reader,
            buf,
            delimiter,
            positions,
            physical_line,
            rows_yielded: 0,
            exhausted: false,
        })
    }
}

#[async_trait]
impl<R> RecordSource for DelimitedFileSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }

        loop {
            let Some(line) = read_line(&mut self.reader, &mut self.buf).await? else {
                self.exhausted = true;
                return Ok(None);
            };
            self.physical_line += 1;

            if line.trim().is_empty() {
                continue;
            }

            let values = split_line(&line, self.delimiter, self.physical_line)?;
            self.rows_yielded += 1;

            let fields = self.positions.map(|pos| values.get(pos).cloned());
            return Ok(Some(RawRow {
                line_number: self.rows_yielded,
                fields,
            }));
        }
    }
}

/// Reads one physical line without its terminator, `\n` or `\r\n`. Returns
/// `None` at end of input.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Option<String>, SourceError>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf.as_slice()).into_owned()))
}

/// Maps every required column to the position of its first occurrence in the
/// header. Names are compared trimmed and case-insensitively.
pub fn resolve_header(names: &[String]) -> Result<[usize; Column::COUNT], SourceError> {
    let mut found: [Option<usize>; Column::COUNT] = [None; Column::COUNT];

    for (position, name) in names.iter().enumerate() {
        let name = name.trim();
        for column in Column::ALL {
            let slot = &mut found[column.index()];
            if slot.is_none() && name.eq_ignore_ascii_case(column.header_name()) {
                *slot = Some(position);
            }
        }
    }

    let missing: Vec<&'static str> = Column::ALL
        .iter()
        .filter(|c| found[c.index()].is_none())
        .map(|c| c.header_name())
        .collect();
    if !missing.is_empty() {
        return Err(SourceError::MissingColumns(missing));
    }

    Ok(found.map(|p| p.unwrap_or_default()))
}

/// Splits one physical line on the delimiter, honouring RFC4180 quoting within
/// the line.
pub fn split_line(
    line: &str,
    delimiter: u8,
    line_number: usize,
) -> Result<Vec<String>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    reader
        .read_record(&mut record)
        .map_err(|error| SourceError::Malformed {
            line: line_number,
            error,
        })?;

    Ok(record.iter().map(str::to_string).collect())
}
