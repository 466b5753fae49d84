use async_trait::async_trait;
use sqlx::{postgres::PgPoolCopyExt, PgPool};
use tracing::{debug, warn};

use super::{backoff::BackoffPolicy, BulkLoader};
use crate::{
    error::LoadError,
    metrics_consts::{COPY_ROWS_AFFECTED, LOAD_ATTEMPT},
    types::TripRecord,
};

// Column order here and in encode_batch must match
const COPY_TRIPS: &str = r#"
COPY taxi_trips (
    pickup_datetime, dropoff_datetime, passenger_count, trip_distance,
    store_and_fwd_flag, pu_location_id, do_location_id, fare_amount, tip_amount
)
FROM STDIN WITH (FORMAT csv)
"#;

const ESTIMATED_RECORD_SIZE: usize = 96;
const STORE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Loads batches with a single `COPY ... FROM STDIN` per batch. COPY is atomic,
/// so a failed attempt leaves nothing behind and can be retried as a whole.
pub struct PgCopyLoader {
    pool: PgPool,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl PgCopyLoader {
    pub fn new(pool: PgPool, max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            pool,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    async fn copy_once(&self, payload: &[u8]) -> Result<u64, sqlx::Error> {
        let mut copy = self.pool.copy_in_raw(COPY_TRIPS).await?;
        let sent = copy.send(payload).await.map(|_| ());
        if let Err(e) = sent {
            // Returns the connection to the pool in a usable state
            if let Err(abort_err) = copy.abort(e.to_string()).await {
                warn!("Failed to abort COPY after send error: {:?}", abort_err);
            }
            return Err(e);
        }
        copy.finish().await
    }
}

#[async_trait]
impl BulkLoader for PgCopyLoader {
    async fn load(&mut self, batch: &[TripRecord]) -> Result<(), LoadError> {
        if batch.is_empty() {
            return Ok(());
        }

        let payload = encode_batch(batch)?;
        let expected = batch.len() as u64;
        let mut attempt = 1;

        loop {
            match self.copy_once(&payload).await {
                Ok(rows) => {
                    metrics::counter!(LOAD_ATTEMPT, &[("result", "success")]).increment(1);
                    metrics::counter!(COPY_ROWS_AFFECTED).increment(rows);
                    if rows != expected {
                        return Err(LoadError::RowCountMismatch {
                            expected,
                            actual: rows,
                        });
                    }
                    return Ok(());
                }
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    metrics::counter!(LOAD_ATTEMPT, &[("result", "retry")]).increment(1);
                    let delay = self.backoff.next_delay_with_jitter(attempt - 1);
                    warn!(
                        "Bulk load attempt {} of {} failed: {}, retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    metrics::counter!(LOAD_ATTEMPT, &[("result", "failed")]).increment(1);
                    return Err(LoadError::Database {
                        attempts: attempt,
                        error: e,
                    });
                }
            }
        }
    }
}

/// Connection drops, pool exhaustion and the postgres error classes that are
/// expected to clear up on their own.
pub fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            // serialization_failure, deadlock_detected, too_many_connections, admin_shutdown
            Some("40001" | "40P01" | "53300" | "57P01")
        ),
        _ => false,
    }
}

/// Renders a batch as headerless CSV in `COPY_TRIPS` column order. Timestamps
/// are written at second precision, matching the column type.
pub fn encode_batch(batch: &[TripRecord]) -> Result<Vec<u8>, LoadError> {
    let buffer = Vec::with_capacity(batch.len() * ESTIMATED_RECORD_SIZE);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(buffer);

    for trip in batch {
        let fields = [
            ("pickup_datetime", trip.pickup().format(STORE_TIMESTAMP_FORMAT).to_string()),
            ("dropoff_datetime", trip.dropoff().format(STORE_TIMESTAMP_FORMAT).to_string()),
            ("passenger_count", trip.passenger_count().to_string()),
            ("trip_distance", trip.trip_distance().to_string()),
            ("store_and_fwd_flag", trip.store_and_fwd_flag().as_str().to_string()),
            ("pu_location_id", trip.pickup_location_id().to_string()),
            ("do_location_id", trip.dropoff_location_id().to_string()),
            ("fare_amount", trip.fare_amount().to_string()),
            ("tip_amount", trip.tip_amount().to_string()),
        ];
        for (field, value) in fields {
            writer
                .write_field(value)
                .map_err(|error| LoadError::Encode { field, error })?;
        }
        // terminate the row
        writer
            .write_record(None::<&[u8]>)
            .map_err(|error| LoadError::Encode {
                field: "csv_row",
                error,
            })?;
    }

    let payload = writer.into_inner().map_err(|e| LoadError::Encode {
        field: "csv_flush",
        error: e.into_error().into(),
    })?;
    debug!("Encoded {} trips into {} bytes for COPY", batch.len(), payload.len());
    Ok(payload)
}
