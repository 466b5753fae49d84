use async_trait::async_trait;

use crate::{error::SourceError, types::RawRow};

pub mod delimited;

/// A finite, forward-only stream of raw rows. Once `next_row` returns
/// `Ok(None)` the source is exhausted and stays that way.
#[async_trait]
pub trait RecordSource: Send {
    async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError>;
}
