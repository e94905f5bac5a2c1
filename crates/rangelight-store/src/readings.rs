//! Append-only reading log (`input` table).

use chrono::{DateTime, SecondsFormat, Utc};
use rangelight_types::{LightError, ReadingView};
use rusqlite::{Connection, OptionalExtension, params};

use crate::StoreError;

/// Append a reading for `sensor_id` and return its row id.
///
/// Fails with [`LightError::UnknownSensor`] when the sensor is not
/// provisioned.
pub fn append_reading(
    conn: &Connection,
    sensor_id: i64,
    distance: f64,
    at: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let known = conn
        .query_row(
            "SELECT 1 FROM sensor WHERE sensor_id = ?1",
            params![sensor_id],
            |_| Ok(()),
        )
        .optional()?;
    if known.is_none() {
        return Err(LightError::UnknownSensor(sensor_id).into());
    }
    // Fixed-width timestamps keep lexical and chronological order equal.
    conn.execute(
        "INSERT INTO input (sensor_id, distance, timestamp) VALUES (?1, ?2, ?3)",
        params![
            sensor_id,
            distance,
            at.to_rfc3339_opts(SecondsFormat::Micros, true)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The `limit` most recent readings joined with their sensor name, newest
/// first.
pub fn recent_readings(conn: &Connection, limit: usize) -> Result<Vec<ReadingView>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT i.input_id, i.sensor_id, s.sensor_name, i.distance, i.timestamp
         FROM input i
         JOIN sensor s ON i.sensor_id = s.sensor_id
         ORDER BY i.timestamp DESC, i.input_id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        let ts: String = row.get(4)?;
        let timestamp = ts.parse::<DateTime<Utc>>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(ReadingView {
            id: row.get(0)?,
            sensor_id: row.get(1)?,
            sensor_name: row.get(2)?,
            distance: row.get(3)?,
            timestamp,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
