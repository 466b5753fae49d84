use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{error::LoadError, types::TripRecord};

pub mod backoff;
pub mod duplicates;
pub mod postgres;

/// Writes a whole batch of accepted trips to the store in one set-oriented
/// operation. A batch is either loaded completely or not at all; an error is
/// fatal for the run.
#[async_trait]
pub trait BulkLoader: Send {
    async fn load(&mut self, batch: &[TripRecord]) -> Result<(), LoadError>;
}

/// Keeps loaded batches in memory, in load order. Clones share the same
/// storage, so a caller can hand one clone to a pipeline and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    batches: Arc<Mutex<Vec<Vec<TripRecord>>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<TripRecord>> {
        self.batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    pub fn records(&self) -> Vec<TripRecord> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl BulkLoader for MemoryLoader {
    async fn load(&mut self, batch: &[TripRecord]) -> Result<(), LoadError> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.to_vec());
        }
        Ok(())
    }
}
