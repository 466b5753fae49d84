use crate::types::TripRecord;

/// Buffers accepted trips until there are enough for a bulk load. The buffer is
/// reused across flushes.
#[derive(Debug)]
pub struct BatchAccumulator {
    records: Vec<TripRecord>,
    capacity: usize,
}

impl BatchAccumulator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns true once the batch has reached its threshold and should be
    /// flushed.
    pub fn push(&mut self, record: TripRecord) -> bool {
        self.records.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[TripRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
