use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::TripValidationError;

/// The fixed set of input columns, in the order they are parsed and written
/// back out to the duplicates file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    PickupDatetime,
    DropoffDatetime,
    PassengerCount,
    TripDistance,
    StoreAndFwdFlag,
    PickupLocationId,
    DropoffLocationId,
    FareAmount,
    TipAmount,
}

impl Column {
    pub const COUNT: usize = 9;

    pub const ALL: [Column; Column::COUNT] = [
        Column::PickupDatetime,
        Column::DropoffDatetime,
        Column::PassengerCount,
        Column::TripDistance,
        Column::StoreAndFwdFlag,
        Column::PickupLocationId,
        Column::DropoffLocationId,
        Column::FareAmount,
        Column::TipAmount,
    ];

    /// Name expected in the input header (matched case-insensitively).
    pub const fn header_name(self) -> &'static str {
        match self {
            Column::PickupDatetime => "tpep_pickup_datetime",
            Column::DropoffDatetime => "tpep_dropoff_datetime",
            Column::PassengerCount => "passenger_count",
            Column::TripDistance => "trip_distance",
            Column::StoreAndFwdFlag => "store_and_fwd_flag",
            Column::PickupLocationId => "PULocationID",
            Column::DropoffLocationId => "DOLocationID",
            Column::FareAmount => "fare_amount",
            Column::TipAmount => "tip_amount",
        }
    }

    /// Human readable name used in row-level diagnostics.
    pub const fn field_name(self) -> &'static str {
        match self {
            Column::PickupDatetime => "pickup timestamp",
            Column::DropoffDatetime => "dropoff timestamp",
            Column::PassengerCount => "passenger count",
            Column::TripDistance => "trip distance",
            Column::StoreAndFwdFlag => "store and forward flag",
            Column::PickupLocationId => "pickup location id",
            Column::DropoffLocationId => "dropoff location id",
            Column::FareAmount => "fare amount",
            Column::TipAmount => "tip amount",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One data line of the input, exactly as read. Line numbers count data rows
/// only, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line_number: usize,
    pub fields: [Option<String>; Column::COUNT],
}

impl RawRow {
    pub fn get(&self, column: Column) -> Option<&str> {
        self.fields[column.index()].as_deref()
    }
}

/// A timestamp as read from the file. Values carrying an explicit UTC marker or
/// offset are already absolute instants; everything else is wall-clock time in
/// whatever zone the file was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    Unspecified(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl fmt::Display for ParsedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedTimestamp::Unspecified(local) => write!(f, "{local}"),
            ParsedTimestamp::Utc(utc) => write!(f, "{}", utc.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub line_number: usize,
    pub pickup: ParsedTimestamp,
    pub dropoff: ParsedTimestamp,
    pub passenger_count: u8,
    pub trip_distance: Decimal,
    pub store_and_fwd_flag: String,
    pub pickup_location_id: i32,
    pub dropoff_location_id: i32,
    pub fare_amount: Decimal,
    pub tip_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StoreAndForward {
    No,
    Yes,
}

impl StoreAndForward {
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreAndForward::No => "No",
            StoreAndForward::Yes => "Yes",
        }
    }
}

/// Everything needed to build a [`TripRecord`]; validation happens in the
/// conversion.
#[derive(Debug, Clone)]
pub struct TripParts {
    pub pickup: DateTime<Utc>,
    pub dropoff: DateTime<Utc>,
    pub passenger_count: u8,
    pub trip_distance: Decimal,
    pub store_and_fwd_flag: StoreAndForward,
    pub pickup_location_id: i32,
    pub dropoff_location_id: i32,
    pub fare_amount: Decimal,
    pub tip_amount: Decimal,
}

/// A validated trip, ready to be deduplicated and loaded. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripRecord {
    pickup: DateTime<Utc>,
    dropoff: DateTime<Utc>,
    passenger_count: u8,
    trip_distance: Decimal,
    store_and_fwd_flag: StoreAndForward,
    pickup_location_id: i32,
    dropoff_location_id: i32,
    fare_amount: Decimal,
    tip_amount: Decimal,
}

impl TryFrom<TripParts> for TripRecord {
    type Error = TripValidationError;

    fn try_from(parts: TripParts) -> Result<Self, Self::Error> {
        if parts.dropoff < parts.pickup {
            return Err(TripValidationError::DropoffBeforePickup {
                pickup: parts.pickup.to_rfc3339(),
                dropoff: parts.dropoff.to_rfc3339(),
            });
        }

        Ok(Self {
            pickup: parts.pickup,
            dropoff: parts.dropoff,
            passenger_count: parts.passenger_count,
            trip_distance: parts.trip_distance,
            store_and_fwd_flag: parts.store_and_fwd_flag,
            pickup_location_id: parts.pickup_location_id,
            dropoff_location_id: parts.dropoff_location_id,
            fare_amount: parts.fare_amount,
            tip_amount: parts.tip_amount,
        })
    }
}

impl TripRecord {
    pub fn pickup(&self) -> DateTime<Utc> {
        self.pickup
    }

    pub fn dropoff(&self) -> DateTime<Utc> {
        self.dropoff
    }

    pub fn passenger_count(&self) -> u8 {
        self.passenger_count
    }

    pub fn trip_distance(&self) -> Decimal {
        self.trip_distance
    }

    pub fn store_and_fwd_flag(&self) -> StoreAndForward {
        self.store_and_fwd_flag
    }

    pub fn pickup_location_id(&self) -> i32 {
        self.pickup_location_id
    }

    pub fn dropoff_location_id(&self) -> i32 {
        self.dropoff_location_id
    }

    pub fn fare_amount(&self) -> Decimal {
        self.fare_amount
    }

    pub fn tip_amount(&self) -> Decimal {
        self.tip_amount
    }

    // Never negative, construction guarantees dropoff >= pickup
    pub fn travel_time_seconds(&self) -> i64 {
        (self.dropoff - self.pickup).num_seconds()
    }

    pub fn duplicate_key(&self) -> DuplicateKey {
        DuplicateKey {
            pickup: self.pickup,
            dropoff: self.dropoff,
            passenger_count: self.passenger_count,
        }
    }
}

/// Two trips with the same key are considered the same trip, whatever their
/// amounts say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub pickup: DateTime<Utc>,
    pub dropoff: DateTime<Utc>,
    pub passenger_count: u8,
}
