use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

/// A row of `taxi_trips`. Timestamps are stored without a zone and are UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StoredTrip {
    pub id: i64,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i16,
    pub trip_distance: Decimal,
    pub store_and_fwd_flag: String,
    pub pu_location_id: i32,
    pub do_location_id: i32,
    pub fare_amount: Decimal,
    pub tip_amount: Decimal,
    pub travel_time_seconds: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ZoneTip {
    pub pu_location_id: i32,
    pub average_tip: Decimal,
    pub trips: i64,
}

const TRIP_COLUMNS: &str = "id, pickup_datetime, dropoff_datetime, passenger_count, trip_distance, \
     store_and_fwd_flag, pu_location_id, do_location_id, fare_amount, tip_amount, travel_time_seconds";

/// Read side of the trips table. Each query is served by one of the secondary
/// indexes created by the migrations.
#[derive(Clone)]
pub struct TripQueries {
    pool: PgPool,
}

impl TripQueries {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM taxi_trips")
            .fetch_one(&self.pool)
            .await
    }

    /// Pickup zones with the highest average tip, ties broken by zone id.
    pub async fn top_average_tip_by_pickup_zone(
        &self,
        limit: i64,
    ) -> Result<Vec<ZoneTip>, sqlx::Error> {
        sqlx::query_as::<_, ZoneTip>(
            r#"
            SELECT pu_location_id, AVG(tip_amount) AS average_tip, COUNT(*) AS trips
            FROM taxi_trips
            GROUP BY pu_location_id
            ORDER BY average_tip DESC, pu_location_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn longest_trips_by_distance(
        &self,
        limit: i64,
    ) -> Result<Vec<StoredTrip>, sqlx::Error> {
        let query = format!(
            "SELECT {TRIP_COLUMNS} FROM taxi_trips ORDER BY trip_distance DESC, id ASC LIMIT $1"
        );
        sqlx::query_as::<_, StoredTrip>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn longest_trips_by_travel_time(
        &self,
        limit: i64,
    ) -> Result<Vec<StoredTrip>, sqlx::Error> {
        let query = format!(
            "SELECT {TRIP_COLUMNS} FROM taxi_trips ORDER BY travel_time_seconds DESC, id ASC LIMIT $1"
        );
        sqlx::query_as::<_, StoredTrip>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }
}
