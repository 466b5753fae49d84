use std::str::FromStr;

use rust_decimal::Decimal;

use crate::{
    error::FieldError,
    types::{Column, ParsedRecord, ParsedTimestamp, RawRow},
};

pub mod datetime;

use datetime::DateTimeFormat;

/// Turns a raw row into typed values. Stops at the first field that fails, so
/// the caller only ever sees one error per row.
#[derive(Debug, Clone)]
pub struct FieldParser {
    datetime_format: DateTimeFormat,
}

impl FieldParser {
    pub fn new(datetime_format: Option<String>) -> Self {
        Self {
            datetime_format: datetime_format.into(),
        }
    }

    pub fn parse(&self, row: &RawRow) -> Result<ParsedRecord, FieldError> {
        Ok(ParsedRecord {
            line_number: row.line_number,
            pickup: self.timestamp(row, Column::PickupDatetime)?,
            dropoff: self.timestamp(row, Column::DropoffDatetime)?,
            passenger_count: passenger_count(row)?,
            trip_distance: non_negative_decimal(row, Column::TripDistance)?,
            store_and_fwd_flag: flag(row)?,
            pickup_location_id: location_id(row, Column::PickupLocationId)?,
            dropoff_location_id: location_id(row, Column::DropoffLocationId)?,
            fare_amount: non_negative_decimal(row, Column::FareAmount)?,
            tip_amount: non_negative_decimal(row, Column::TipAmount)?,
        })
    }

    fn timestamp(&self, row: &RawRow, column: Column) -> Result<ParsedTimestamp, FieldError> {
        let value = required(row, column)?;
        self.datetime_format
            .parse(value)
            .map_err(|msg| FieldError::new(column.field_name(), msg))
    }
}

fn required(row: &RawRow, column: Column) -> Result<&str, FieldError> {
    match row.get(column) {
        Some(value) => Ok(value.trim()),
        None => Err(FieldError::new(column.field_name(), "value is missing")),
    }
}

fn passenger_count(row: &RawRow) -> Result<u8, FieldError> {
    let column = Column::PassengerCount;
    let value = required(row, column)?;
    u8::from_str(value).map_err(|_| {
        FieldError::new(
            column.field_name(),
            format!("expected a whole number between 0 and 255, got {value:?}"),
        )
    })
}

fn non_negative_decimal(row: &RawRow, column: Column) -> Result<Decimal, FieldError> {
    let value = required(row, column)?;
    let parsed = Decimal::from_str(value).map_err(|_| {
        FieldError::new(
            column.field_name(),
            format!("expected a decimal number, got {value:?}"),
        )
    })?;
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(FieldError::new(
            column.field_name(),
            format!("must not be negative, got {value:?}"),
        ));
    }
    Ok(parsed)
}

fn location_id(row: &RawRow, column: Column) -> Result<i32, FieldError> {
    let value = required(row, column)?;
    match i32::from_str(value) {
        Ok(id) if id >= 0 => Ok(id),
        Ok(_) => Err(FieldError::new(
            column.field_name(),
            format!("must not be negative, got {value:?}"),
        )),
        Err(_) => Err(FieldError::new(
            column.field_name(),
            format!("expected an integer, got {value:?}"),
        )),
    }
}

// Only checked for presence here, the normalizer maps it to a known value
fn flag(row: &RawRow) -> Result<String, FieldError> {
    let column = Column::StoreAndFwdFlag;
    let value = required(row, column)?;
    if value.is_empty() {
        return Err(FieldError::new(column.field_name(), "value is empty"));
    }
    Ok(value.to_string())
}
