//! Liveness records and singleton switches.
//!
//! Every write here is an upsert: insert when the subject is new (unspecified
//! flags default to `false`), otherwise update only the supplied fields. Each
//! runs inside an `IMMEDIATE` transaction so the existence check and the
//! write see the same snapshot.

use rangelight_types::{
    LedStrip, LightError, SensorLiveness, SensorStatusUpdate, StripStatusUpdate, Upserted,
};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use crate::StoreError;
use crate::catalog::{self, STRIP_COLUMNS, row_to_strip};

// ─────────────────────────────────────────────────────────────────────────────
// Sensors
// ─────────────────────────────────────────────────────────────────────────────

/// Upsert the liveness record of `sensor_id`.
///
/// Sensors need not be provisioned in the `sensor` table: devices report in
/// before they are catalogued.
pub fn upsert_sensor_status(
    conn: &mut Connection,
    sensor_id: i64,
    update: SensorStatusUpdate,
) -> Result<(Upserted, SensorLiveness), StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existed = exists(&tx, "SELECT 1 FROM alive WHERE sensor_id = ?1", sensor_id)?;
    tx.execute(
        "INSERT INTO alive (sensor_id, active, awake)
         VALUES (?1, COALESCE(?2, 0), COALESCE(?3, 0))
         ON CONFLICT (sensor_id) DO UPDATE SET
             active = COALESCE(?2, active),
             awake  = COALESCE(?3, awake)",
        params![sensor_id, update.active, update.awake],
    )?;
    let record = sensor_status(&tx, sensor_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    tx.commit()?;
    Ok((outcome(existed), record))
}

pub fn sensor_status(
    conn: &Connection,
    sensor_id: i64,
) -> Result<Option<SensorLiveness>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT sensor_id, active, awake FROM alive WHERE sensor_id = ?1",
            params![sensor_id],
            row_to_liveness,
        )
        .optional()?)
}

pub fn sensor_statuses(conn: &Connection) -> Result<Vec<SensorLiveness>, StoreError> {
    let mut stmt = conn.prepare("SELECT sensor_id, active, awake FROM alive ORDER BY sensor_id")?;
    let rows = stmt.query_map([], row_to_liveness)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn row_to_liveness(row: &rusqlite::Row<'_>) -> rusqlite::Result<SensorLiveness> {
    Ok(SensorLiveness {
        sensor_id: row.get(0)?,
        active: row.get(1)?,
        awake: row.get(2)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Strips
// ─────────────────────────────────────────────────────────────────────────────

/// Upsert the strip called `name`.
///
/// A new strip without an explicit colour takes the lowest-id colour; if the
/// colour table is empty the call fails with [`LightError::NoDefaultColour`]
/// and nothing is written.
pub fn upsert_strip_status(
    conn: &mut Connection,
    name: &str,
    update: StripStatusUpdate,
) -> Result<(Upserted, LedStrip), StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(colour_id) = update.colour_id {
        if catalog::colour(&tx, colour_id)?.is_none() {
            return Err(LightError::InvalidColour { colour_id }.into());
        }
    }

    let existing: Option<i64> = tx
        .query_row(
            "SELECT led_strip_id FROM led_strip WHERE led_strip_name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(strip_id) => {
            tx.execute(
                "UPDATE led_strip SET
                     led_active = COALESCE(?1, led_active),
                     led_alive  = COALESCE(?2, led_alive),
                     colour_id  = COALESCE(?3, colour_id)
                 WHERE led_strip_id = ?4",
                params![update.active, update.alive, update.colour_id, strip_id],
            )?;
        }
        None => {
            let colour_id = match update.colour_id {
                Some(id) => id,
                None => catalog::default_colour_id(&tx)?.ok_or(LightError::NoDefaultColour)?,
            };
            tx.execute(
                "INSERT INTO led_strip (led_strip_name, led_active, led_alive, colour_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    name,
                    update.active.unwrap_or(false),
                    update.alive.unwrap_or(false),
                    colour_id
                ],
            )?;
        }
    }

    let strip = tx.query_row(
        &format!("SELECT {STRIP_COLUMNS} FROM led_strip WHERE led_strip_name = ?1"),
        params![name],
        row_to_strip,
    )?;
    tx.commit()?;
    Ok((outcome(existing.is_some()), strip))
}

// ─────────────────────────────────────────────────────────────────────────────
// Singleton switches
// ─────────────────────────────────────────────────────────────────────────────

/// Current state of the global LED switch (`false` until first toggled).
pub fn led_switch(conn: &Connection) -> Result<bool, StoreError> {
    Ok(conn
        .query_row("SELECT led_on FROM led_switch WHERE switch_id = 1", [], |row| {
            row.get(0)
        })
        .optional()?
        .unwrap_or(false))
}

/// Flip the global LED switch and return the new state.
pub fn toggle_led_switch(conn: &mut Connection) -> Result<bool, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO led_switch (switch_id, led_on) VALUES (1, 1)
         ON CONFLICT (switch_id) DO UPDATE SET led_on = 1 - led_on",
        [],
    )?;
    let on = led_switch(&tx)?;
    tx.commit()?;
    Ok(on)
}

pub fn mute(conn: &Connection) -> Result<bool, StoreError> {
    Ok(conn
        .query_row("SELECT mute FROM mute WHERE mute_id = 1", [], |row| row.get(0))
        .optional()?
        .unwrap_or(false))
}

pub fn set_mute(conn: &Connection, muted: bool) -> Result<bool, StoreError> {
    conn.execute(
        "INSERT INTO mute (mute_id, mute) VALUES (1, ?1)
         ON CONFLICT (mute_id) DO UPDATE SET mute = excluded.mute",
        params![muted],
    )?;
    Ok(muted)
}

/// Whether the sensor fleet is switched on (`false` until first written).
pub fn sensors_on(conn: &Connection) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT sensors_on FROM all_sensors_status WHERE status_id = 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(false))
}

pub fn set_sensors_on(conn: &Connection, on: bool) -> Result<bool, StoreError> {
    conn.execute(
        "INSERT INTO all_sensors_status (status_id, sensors_on) VALUES (1, ?1)
         ON CONFLICT (status_id) DO UPDATE SET sensors_on = excluded.sensors_on",
        params![on],
    )?;
    Ok(on)
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn exists(tx: &Transaction<'_>, sql: &str, key: i64) -> Result<bool, StoreError> {
    Ok(tx.query_row(sql, params![key], |_| Ok(())).optional()?.is_some())
}

fn outcome(existed: bool) -> Upserted {
    if existed {
        Upserted::Updated
    } else {
        Upserted::Inserted
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Store, schema};

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(schema::SCHEMA).unwrap();
        conn.execute_batch(schema::DEMO_SEED).unwrap();
        conn
    }

    #[test]
    fn sensor_status_inserts_then_merges() {
        let mut conn = seeded();
        let awake = SensorStatusUpdate {
            active: None,
            awake: Some(true),
        };
        let (outcome, record) = upsert_sensor_status(&mut conn, 5, awake).unwrap();
        assert_eq!(outcome, Upserted::Inserted);
        assert_eq!(
            record,
            SensorLiveness {
                sensor_id: 5,
                active: false,
                awake: true
            }
        );

        let active = SensorStatusUpdate {
            active: Some(true),
            awake: None,
        };
        let (outcome, record) = upsert_sensor_status(&mut conn, 5, active).unwrap();
        assert_eq!(outcome, Upserted::Updated);
        assert!(record.active && record.awake);
    }

    #[test]
    fn sensor_status_upsert_is_idempotent() {
        let mut conn = seeded();
        let update = SensorStatusUpdate {
            active: Some(true),
            awake: Some(false),
        };
        let (_, first) = upsert_sensor_status(&mut conn, 1, update).unwrap();
        let (outcome, second) = upsert_sensor_status(&mut conn, 1, update).unwrap();
        assert_eq!(outcome, Upserted::Updated);
        assert_eq!(first, second);
        assert_eq!(sensor_statuses(&conn).unwrap(), vec![second]);
        assert_eq!(sensor_status(&conn, 1).unwrap(), Some(second));
    }

    #[test]
    fn empty_update_inserts_defaults() {
        let mut conn = seeded();
        let (_, record) =
            upsert_sensor_status(&mut conn, 3, SensorStatusUpdate::default()).unwrap();
        assert!(!record.active && !record.awake);
    }

    #[test]
    fn new_strip_takes_default_colour() {
        let mut conn = seeded();
        let update = StripStatusUpdate {
            active: Some(true),
            alive: None,
            colour_id: None,
        };
        let (outcome, strip) = upsert_strip_status(&mut conn, "ledstripback", update).unwrap();
        assert_eq!(outcome, Upserted::Inserted);
        assert_eq!(strip.colour_id, 1);
        assert!(strip.active && !strip.alive);
    }

    #[test]
    fn existing_strip_keeps_untouched_fields() {
        let mut conn = seeded();
        let update = StripStatusUpdate {
            active: Some(false),
            alive: None,
            colour_id: Some(2),
        };
        let (outcome, strip) = upsert_strip_status(&mut conn, "ledstripfront", update).unwrap();
        assert_eq!(outcome, Upserted::Updated);
        assert_eq!(strip.id, 1);
        assert!(!strip.active);
        assert!(strip.alive);
        assert_eq!(strip.colour_id, 2);
    }

    #[test]
    fn new_strip_without_colours_fails() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(schema::SCHEMA).unwrap();
        let err = upsert_strip_status(&mut conn, "ledstripfront", StripStatusUpdate::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(LightError::NoDefaultColour)));
        assert!(catalog::strips(&conn).unwrap().is_empty());
    }

    #[test]
    fn strip_with_unknown_colour_is_rejected() {
        let mut conn = seeded();
        let update = StripStatusUpdate {
            colour_id: Some(40),
            ..Default::default()
        };
        let err = upsert_strip_status(&mut conn, "ledstripfront", update).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(LightError::InvalidColour { colour_id: 40 })
        ));
    }

    #[test]
    fn strip_update_is_idempotent() {
        let mut conn = seeded();
        let update = StripStatusUpdate {
            active: Some(true),
            alive: Some(false),
            colour_id: Some(3),
        };
        let (_, first) = upsert_strip_status(&mut conn, "ledstripback", update).unwrap();
        let (outcome, second) = upsert_strip_status(&mut conn, "ledstripback", update).unwrap();
        assert_eq!(outcome, Upserted::Updated);
        assert_eq!(first, second);
        let named: Vec<_> = catalog::strips(&conn)
            .unwrap()
            .into_iter()
            .filter(|s| s.name == "ledstripback")
            .collect();
        assert_eq!(named, vec![second]);
    }

    #[test]
    fn led_switch_toggles() {
        let mut conn = seeded();
        assert!(!led_switch(&conn).unwrap());
        assert!(toggle_led_switch(&mut conn).unwrap());
        assert!(!toggle_led_switch(&mut conn).unwrap());
        assert!(toggle_led_switch(&mut conn).unwrap());
        assert!(led_switch(&conn).unwrap());
    }

    #[test]
    fn mute_flag_round_trips() {
        let conn = seeded();
        assert!(!mute(&conn).unwrap());
        set_mute(&conn, true).unwrap();
        assert!(mute(&conn).unwrap());
        set_mute(&conn, false).unwrap();
        assert!(!mute(&conn).unwrap());
    }

    #[test]
    fn sensors_on_flag_is_a_singleton() {
        let conn = seeded();
        assert!(!sensors_on(&conn).unwrap());
        set_sensors_on(&conn, true).unwrap();
        set_sensors_on(&conn, true).unwrap();
        assert!(sensors_on(&conn).unwrap());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM all_sensors_status", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        set_sensors_on(&conn, false).unwrap();
        assert!(!sensors_on(&conn).unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_create_one_record() {
        let store = Store::open_in_memory().unwrap();
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let update = if i % 2 == 0 {
                    SensorStatusUpdate {
                        active: Some(true),
                        awake: None,
                    }
                } else {
                    SensorStatusUpdate {
                        active: None,
                        awake: Some(true),
                    }
                };
                store
                    .call("update sensor status", move |c| {
                        upsert_sensor_status(c, 7, update)
                    })
                    .await
                    .unwrap()
                    .0
            }));
        }
        let mut inserted = 0;
        for task in tasks {
            if task.await.unwrap() == Upserted::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);

        let all = store
            .call("fetch sensor status", |c| sensor_statuses(c))
            .await
            .unwrap();
        assert_eq!(
            all,
            vec![SensorLiveness {
                sensor_id: 7,
                active: true,
                awake: true
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_strip_upserts_create_one_strip() {
        let store = Store::open_in_memory().unwrap();
        store.execute_batch(schema::DEMO_SEED).await.unwrap();
        let before = store.call("fetch LED strips", |c| catalog::strips(c)).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let update = if i % 2 == 0 {
                    StripStatusUpdate {
                        active: Some(true),
                        ..Default::default()
                    }
                } else {
                    StripStatusUpdate {
                        alive: Some(true),
                        ..Default::default()
                    }
                };
                store
                    .call("update LED strip status", move |c| {
                        upsert_strip_status(c, "ledstripside", update)
                    })
                    .await
                    .unwrap()
                    .0
            }));
        }
        let mut inserted = 0;
        for task in tasks {
            if task.await.unwrap() == Upserted::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);

        let after = store.call("fetch LED strips", |c| catalog::strips(c)).await.unwrap();
        assert_eq!(after.len(), before.len() + 1);
        let side: Vec<_> = after.iter().filter(|s| s.name == "ledstripside").collect();
        assert_eq!(side.len(), 1);
        assert!(side[0].active && side[0].alive);
        assert_eq!(side[0].colour_id, 1);
    }
}
