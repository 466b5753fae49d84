pub const ROWS_READ: &str = "trip_import_rows_read";
// Labelled with the stage that rejected the row: parse or normalize
pub const ROWS_INVALID: &str = "trip_import_rows_invalid";
pub const ROWS_DUPLICATE: &str = "trip_import_rows_duplicate";
pub const DUPLICATE_SINK_FAILURES: &str = "trip_import_duplicate_sink_failures";
pub const ROWS_LOADED: &str = "trip_import_rows_loaded";
pub const BATCH_FLUSH_TIME: &str = "trip_import_batch_flush_ms";
pub const BATCH_SIZE: &str = "trip_import_batch_size";
// Labelled success/retry/failed
pub const LOAD_ATTEMPT: &str = "trip_import_load_attempt";
pub const COPY_ROWS_AFFECTED: &str = "trip_import_copy_rows_affected";
