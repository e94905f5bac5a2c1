//! Reference data: sensors, ranges, colours, strips, colour bindings and
//! light durations.

use rangelight_types::{
    Colour, LedStrip, LightDuration, LightError, Range, Rgb, Sensor, StripColorBinding, Upserted,
};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::StoreError;

// ─────────────────────────────────────────────────────────────────────────────
// Row mappers
// ─────────────────────────────────────────────────────────────────────────────

fn row_to_sensor(row: &Row<'_>) -> rusqlite::Result<Sensor> {
    Ok(Sensor {
        id: row.get(0)?,
        sensor_name: row.get(1)?,
    })
}

fn row_to_range(row: &Row<'_>) -> rusqlite::Result<Range> {
    Ok(Range {
        id: row.get(0)?,
        name: row.get(1)?,
        lower: row.get(2)?,
        upper: row.get(3)?,
    })
}

fn row_to_colour(row: &Row<'_>) -> rusqlite::Result<Colour> {
    Ok(Colour {
        id: row.get(0)?,
        colour_name: row.get(1)?,
        rgb: Rgb::new(row.get(2)?, row.get(3)?, row.get(4)?),
    })
}

pub(crate) fn row_to_strip(row: &Row<'_>) -> rusqlite::Result<LedStrip> {
    Ok(LedStrip {
        id: row.get(0)?,
        name: row.get(1)?,
        alive: row.get(2)?,
        active: row.get(3)?,
        colour_id: row.get(4)?,
    })
}

fn row_to_binding(row: &Row<'_>) -> rusqlite::Result<StripColorBinding> {
    Ok(StripColorBinding {
        strip_id: row.get(0)?,
        range_id: row.get(1)?,
        colour_id: row.get(2)?,
    })
}

pub(crate) const STRIP_COLUMNS: &str =
    "led_strip_id, led_strip_name, led_alive, led_active, colour_id";

// ─────────────────────────────────────────────────────────────────────────────
// Sensors
// ─────────────────────────────────────────────────────────────────────────────

pub fn sensors(conn: &Connection) -> Result<Vec<Sensor>, StoreError> {
    let mut stmt = conn.prepare("SELECT sensor_id, sensor_name FROM sensor ORDER BY sensor_id")?;
    let rows = stmt.query_map([], row_to_sensor)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn sensor(conn: &Connection, sensor_id: i64) -> Result<Option<Sensor>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT sensor_id, sensor_name FROM sensor WHERE sensor_id = ?1",
            params![sensor_id],
            row_to_sensor,
        )
        .optional()?)
}

pub fn sensor_by_name(conn: &Connection, name: &str) -> Result<Option<Sensor>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT sensor_id, sensor_name FROM sensor WHERE sensor_name = ?1",
            params![name],
            row_to_sensor,
        )
        .optional()?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Ranges
// ─────────────────────────────────────────────────────────────────────────────

/// All ranges in table order (by id).
pub fn ranges(conn: &Connection) -> Result<Vec<Range>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT range_id, range_name, lower_limit, upper_limit FROM sensor_range ORDER BY range_id",
    )?;
    let rows = stmt.query_map([], row_to_range)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Overwrite an existing range. Returns `false` when `range.id` is unknown.
pub fn update_range(conn: &Connection, range: &Range) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE sensor_range SET range_name = ?1, lower_limit = ?2, upper_limit = ?3
         WHERE range_id = ?4",
        params![range.name, range.lower, range.upper, range.id],
    )?;
    Ok(changed > 0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Colours
// ─────────────────────────────────────────────────────────────────────────────

pub fn colours(conn: &Connection) -> Result<Vec<Colour>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT colour_id, colour_name, red, green, blue FROM colour ORDER BY colour_id",
    )?;
    let rows = stmt.query_map([], row_to_colour)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn colour(conn: &Connection, colour_id: i64) -> Result<Option<Colour>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT colour_id, colour_name, red, green, blue FROM colour WHERE colour_id = ?1",
            params![colour_id],
            row_to_colour,
        )
        .optional()?)
}

/// The colour a newly created strip falls back to: the lowest id.
pub fn default_colour_id(conn: &Connection) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT colour_id FROM colour ORDER BY colour_id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Strips
// ─────────────────────────────────────────────────────────────────────────────

pub fn strips(conn: &Connection) -> Result<Vec<LedStrip>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STRIP_COLUMNS} FROM led_strip ORDER BY led_strip_id"
    ))?;
    let rows = stmt.query_map([], row_to_strip)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn strip(conn: &Connection, strip_id: i64) -> Result<Option<LedStrip>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {STRIP_COLUMNS} FROM led_strip WHERE led_strip_id = ?1"),
            params![strip_id],
            row_to_strip,
        )
        .optional()?)
}

pub fn strip_by_name(conn: &Connection, name: &str) -> Result<Option<LedStrip>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {STRIP_COLUMNS} FROM led_strip WHERE led_strip_name = ?1"),
            params![name],
            row_to_strip,
        )
        .optional()?)
}

/// Set a strip's fallback colour and return the updated strip, or `None`
/// when the strip does not exist.
pub fn set_strip_colour(
    conn: &Connection,
    strip_id: i64,
    colour_id: i64,
) -> Result<Option<LedStrip>, StoreError> {
    let changed = conn.execute(
        "UPDATE led_strip SET colour_id = ?1 WHERE led_strip_id = ?2",
        params![colour_id, strip_id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    strip(conn, strip_id)
}

/// The strip explicitly linked to `sensor_id`, if any.
pub fn linked_strip(conn: &Connection, sensor_id: i64) -> Result<Option<LedStrip>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT l.led_strip_id, l.led_strip_name, l.led_alive, l.led_active, l.colour_id
             FROM sensor_strip ss
             JOIN led_strip l ON l.led_strip_id = ss.led_strip_id
             WHERE ss.sensor_id = ?1",
            params![sensor_id],
            row_to_strip,
        )
        .optional()?)
}

/// Link `sensor_id` to `strip_id`, replacing any previous link.
pub fn link_sensor_strip(conn: &Connection, sensor_id: i64, strip_id: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO sensor_strip (sensor_id, led_strip_id) VALUES (?1, ?2)
         ON CONFLICT (sensor_id) DO UPDATE SET led_strip_id = excluded.led_strip_id",
        params![sensor_id, strip_id],
    )?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Bindings
// ─────────────────────────────────────────────────────────────────────────────

pub fn bindings(conn: &Connection) -> Result<Vec<StripColorBinding>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT led_strip_id, range_id, colour_id FROM sensor_light
         ORDER BY led_strip_id, range_id",
    )?;
    let rows = stmt.query_map([], row_to_binding)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn binding(
    conn: &Connection,
    strip_id: i64,
    range_id: i64,
) -> Result<Option<StripColorBinding>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT led_strip_id, range_id, colour_id FROM sensor_light
             WHERE led_strip_id = ?1 AND range_id = ?2",
            params![strip_id, range_id],
            row_to_binding,
        )
        .optional()?)
}

/// Lowest-range binding of `strip_id`.
pub fn strip_binding(conn: &Connection, strip_id: i64) -> Result<Option<StripColorBinding>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT led_strip_id, range_id, colour_id FROM sensor_light
             WHERE led_strip_id = ?1 ORDER BY range_id LIMIT 1",
            params![strip_id],
            row_to_binding,
        )
        .optional()?)
}

/// Insert a binding that must not exist yet.
pub fn create_binding(conn: &Connection, binding: StripColorBinding) -> Result<(), StoreError> {
    let inserted = conn.execute(
        "INSERT INTO sensor_light (led_strip_id, range_id, colour_id) VALUES (?1, ?2, ?3)
         ON CONFLICT (led_strip_id, range_id) DO NOTHING",
        params![binding.strip_id, binding.range_id, binding.colour_id],
    )?;
    if inserted == 0 {
        return Err(LightError::validation(format!(
            "sensor light entry for LED strip {} and range {} already exists",
            binding.strip_id, binding.range_id
        ))
        .into());
    }
    Ok(())
}

/// The RGB value bound to `(strip_id, range_id)`, resolved in one join.
pub fn binding_rgb(conn: &Connection, strip_id: i64, range_id: i64) -> Result<Option<Rgb>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT c.red, c.green, c.blue
             FROM sensor_light sl
             JOIN colour c ON sl.colour_id = c.colour_id
             WHERE sl.led_strip_id = ?1 AND sl.range_id = ?2",
            params![strip_id, range_id],
            |row| Ok(Rgb::new(row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?)
}

/// Insert the binding, or replace the colour of an existing one.
pub fn upsert_binding(
    conn: &mut Connection,
    binding: StripColorBinding,
) -> Result<Upserted, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existed: bool = tx.query_row(
        "SELECT EXISTS (SELECT 1 FROM sensor_light WHERE led_strip_id = ?1 AND range_id = ?2)",
        params![binding.strip_id, binding.range_id],
        |row| row.get(0),
    )?;
    tx.execute(
        "INSERT INTO sensor_light (led_strip_id, range_id, colour_id) VALUES (?1, ?2, ?3)
         ON CONFLICT (led_strip_id, range_id) DO UPDATE SET colour_id = excluded.colour_id",
        params![binding.strip_id, binding.range_id, binding.colour_id],
    )?;
    tx.commit()?;
    Ok(if existed {
        Upserted::Updated
    } else {
        Upserted::Inserted
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Light durations
// ─────────────────────────────────────────────────────────────────────────────

pub fn light_durations(conn: &Connection) -> Result<Vec<LightDuration>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT light_duration_id, duration FROM light_duration ORDER BY light_duration_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(LightDuration {
            id: row.get(0)?,
            duration: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// The configured light duration, if one has been set.
pub fn light_duration(conn: &Connection) -> Result<Option<LightDuration>, StoreError> {
    Ok(light_durations(conn)?.into_iter().next())
}

/// Replace every stored duration with `duration`.
pub fn replace_light_duration(
    conn: &mut Connection,
    duration: u32,
) -> Result<LightDuration, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM light_duration", [])?;
    tx.execute(
        "INSERT INTO light_duration (duration) VALUES (?1)",
        params![duration],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(LightDuration { id, duration })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
