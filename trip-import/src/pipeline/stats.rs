use serde::Serialize;

/// Counters for a single import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total_rows_read: u64,
    // Rows that made it through field parsing
    pub parsed_rows: u64,
    pub invalid_rows: u64,
    pub duplicate_rows: u64,
    pub inserted_rows: u64,
    pub duplicates_file_rows: u64,
}

impl ImportStats {
    pub fn parse_failures(&self) -> u64 {
        self.total_rows_read - self.parsed_rows
    }

    pub fn normalize_failures(&self) -> u64 {
        self.invalid_rows - self.parse_failures()
    }
}
