use std::str::FromStr;

use chrono::{DateTime, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{
    config::PipelineConfig,
    error::{ConfigError, NormalizeError},
    types::{Column, ParsedRecord, ParsedTimestamp, StoreAndForward, TripParts, TripRecord},
};

/// How wall-clock timestamps from the file are turned into UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZonePolicy {
    /// Local values are taken to already be UTC, no shift is applied.
    AssumeUtc,
    /// Local values are interpreted in the given zone, DST rules included.
    Convert(Tz),
}

impl TimeZonePolicy {
    pub fn resolve(zone: Option<&str>) -> Result<Self, ConfigError> {
        match zone {
            None => Ok(TimeZonePolicy::AssumeUtc),
            Some(id) => Tz::from_str(id)
                .map(TimeZonePolicy::Convert)
                .map_err(|_| ConfigError::UnknownTimeZone(id.to_string())),
        }
    }

    pub fn to_utc(
        &self,
        timestamp: ParsedTimestamp,
        column: Column,
    ) -> Result<DateTime<Utc>, NormalizeError> {
        let local = match timestamp {
            ParsedTimestamp::Utc(utc) => return Ok(utc),
            ParsedTimestamp::Unspecified(local) => local,
        };

        match self {
            TimeZonePolicy::AssumeUtc => Ok(local.and_utc()),
            TimeZonePolicy::Convert(zone) => match zone.from_local_datetime(&local) {
                LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
                // Repeated hour when clocks go back, standard time wins
                LocalResult::Ambiguous(_, standard) => Ok(standard.with_timezone(&Utc)),
                LocalResult::None => Err(NormalizeError::NonexistentLocalTime {
                    field: column.field_name(),
                    local: local.to_string(),
                    zone: zone.name().to_string(),
                }),
            },
        }
    }
}

/// Converts parsed records into validated trips.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    policy: TimeZonePolicy,
}

impl RecordNormalizer {
    /// Fails if the configured zone can't be resolved, so a bad zone is caught
    /// once rather than on every row.
    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: TimeZonePolicy::resolve(config.input_time_zone.as_deref())?,
        })
    }

    pub fn with_policy(policy: TimeZonePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TimeZonePolicy {
        self.policy
    }

    pub fn normalize(&self, record: ParsedRecord) -> Result<TripRecord, NormalizeError> {
        let pickup = self.policy.to_utc(record.pickup, Column::PickupDatetime)?;
        let dropoff = self.policy.to_utc(record.dropoff, Column::DropoffDatetime)?;
        let store_and_fwd_flag = map_flag(&record.store_and_fwd_flag)?;

        let trip = TripRecord::try_from(TripParts {
            pickup,
            dropoff,
            passenger_count: record.passenger_count,
            trip_distance: record.trip_distance,
            store_and_fwd_flag,
            pickup_location_id: record.pickup_location_id,
            dropoff_location_id: record.dropoff_location_id,
            fare_amount: record.fare_amount,
            tip_amount: record.tip_amount,
        })?;

        Ok(trip)
    }
}

pub fn map_flag(raw: &str) -> Result<StoreAndForward, NormalizeError> {
    match raw.trim().to_uppercase().as_str() {
        "N" => Ok(StoreAndForward::No),
        "Y" => Ok(StoreAndForward::Yes),
        _ => Err(NormalizeError::InvalidFlag(raw.to_string())),
    }
}
