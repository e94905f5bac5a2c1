//! Sensor name + distance → strip colour.
//!
//! The pipeline runs four lookups against one connection snapshot:
//!
//! 1. the range bucket of the distance (fails with `InvalidDistance`);
//! 2. the strip driven by the sensor: the explicit `sensor_strip` link when
//!    present, otherwise the strip named `<prefix><sensor_name>` (fails with
//!    `UnknownStrip`);
//! 3. the colour binding of that strip for that range (`NoBinding`);
//! 4. the bound colour itself (`InvalidColour`).

use rangelight_store::{Store, StoreError, catalog};
use rangelight_types::{LedStrip, LightError, Range, Rgb};
use rusqlite::Connection;

use crate::range::{position, resolve_range};

/// Everything the pipeline found on the way to a colour.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorResolution {
    pub range: Range,
    /// Position of `range` in lower-bound order.
    pub index: usize,
    /// Number of ranges currently defined.
    pub partitions: usize,
    pub strip: LedStrip,
    pub rgb: Rgb,
}

/// Run the pipeline synchronously on `conn`.
pub fn resolve_color(
    conn: &Connection,
    sensor_name: &str,
    distance: f64,
    strip_prefix: &str,
) -> Result<ColorResolution, StoreError> {
    let ranges = catalog::ranges(conn)?;
    let invalid = LightError::InvalidDistance { distance };
    let range = resolve_range(&ranges, distance)
        .map_err(|_| invalid.clone())?
        .clone();
    let index = position(&ranges, range.id).ok_or(invalid)?;

    let strip = strip_for_sensor(conn, sensor_name, strip_prefix)?;

    let binding = catalog::binding(conn, strip.id, range.id)?.ok_or(LightError::NoBinding {
        strip_id: strip.id,
        range_id: range.id,
    })?;
    let colour = catalog::colour(conn, binding.colour_id)?.ok_or(LightError::InvalidColour {
        colour_id: binding.colour_id,
    })?;

    Ok(ColorResolution {
        range,
        index,
        partitions: ranges.len(),
        strip,
        rgb: colour.rgb,
    })
}

fn strip_for_sensor(
    conn: &Connection,
    sensor_name: &str,
    strip_prefix: &str,
) -> Result<LedStrip, StoreError> {
    if let Some(sensor) = catalog::sensor_by_name(conn, sensor_name)? {
        if let Some(strip) = catalog::linked_strip(conn, sensor.id)? {
            return Ok(strip);
        }
    }
    let name = format!("{strip_prefix}{sensor_name}");
    match catalog::strip_by_name(conn, &name)? {
        Some(strip) => Ok(strip),
        None => Err(LightError::UnknownStrip { name }.into()),
    }
}

/// Async front for [`resolve_color`] over the shared [`Store`].
#[derive(Clone)]
pub struct ColorResolver {
    store: Store,
    strip_prefix: String,
}

impl ColorResolver {
    pub fn new(store: Store, strip_prefix: impl Into<String>) -> Self {
        Self {
            store,
            strip_prefix: strip_prefix.into(),
        }
    }

    pub async fn resolve(&self, sensor_name: &str, distance: f64) -> Result<ColorResolution, LightError> {
        let sensor_name = sensor_name.to_string();
        let prefix = self.strip_prefix.clone();
        self.store
            .call("determine LED color", move |conn| {
                resolve_color(conn, &sensor_name, distance, &prefix)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangelight_store::schema;

    const PREFIX: &str = "ledstrip";

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute_batch(schema::DEMO_SEED).unwrap();
        conn
    }

    fn err_of(result: Result<ColorResolution, StoreError>) -> LightError {
        match result {
            Err(StoreError::Domain(e)) => e,
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[test]
    fn close_reading_on_front_is_red() {
        let conn = seeded();
        let res = resolve_color(&conn, "front", 12.0, PREFIX).unwrap();
        assert_eq!(res.rgb, Rgb::new(255, 0, 0));
        assert_eq!(res.range.id, 1);
        assert_eq!((res.index, res.partitions), (0, 3));
        assert_eq!(res.strip.name, "ledstripfront");
    }

    #[test]
    fn far_reading_uses_far_binding() {
        let conn = seeded();
        let res = resolve_color(&conn, "front", 150.0, PREFIX).unwrap();
        assert_eq!(res.rgb, Rgb::new(0, 0, 255));
        assert_eq!(res.index, 2);
    }

    #[test]
    fn each_stage_fails_distinctly() {
        let conn = seeded();
        assert_eq!(
            err_of(resolve_color(&conn, "front", 500.0, PREFIX)),
            LightError::InvalidDistance { distance: 500.0 }
        );
        assert_eq!(
            err_of(resolve_color(&conn, "back", 12.0, PREFIX)),
            LightError::UnknownStrip {
                name: "ledstripback".into()
            }
        );

        conn.execute_batch("DELETE FROM sensor_light WHERE range_id = 2;").unwrap();
        assert_eq!(
            err_of(resolve_color(&conn, "front", 30.0, PREFIX)),
            LightError::NoBinding {
                strip_id: 1,
                range_id: 2
            }
        );

        conn.execute_batch(
            "PRAGMA foreign_keys = OFF;
             INSERT INTO sensor_light (led_strip_id, range_id, colour_id) VALUES (1, 2, 99);",
        )
        .unwrap();
        assert_eq!(
            err_of(resolve_color(&conn, "front", 30.0, PREFIX)),
            LightError::InvalidColour { colour_id: 99 }
        );
    }

    #[test]
    fn explicit_link_beats_naming_convention() {
        let conn = seeded();
        conn.execute_batch(
            "INSERT INTO led_strip (led_strip_id, led_strip_name, colour_id) VALUES (2, 'porch', 1);
             INSERT INTO sensor_light (led_strip_id, range_id, colour_id) VALUES (2, 1, 2);",
        )
        .unwrap();
        catalog::link_sensor_strip(&conn, 1, 2).unwrap();

        let res = resolve_color(&conn, "front", 5.0, PREFIX).unwrap();
        assert_eq!(res.strip.name, "porch");
        assert_eq!(res.rgb, Rgb::new(0, 255, 0));
    }

    #[tokio::test]
    async fn resolver_runs_on_the_store() {
        let store = Store::open_in_memory().unwrap();
        store.execute_batch(schema::DEMO_SEED).await.unwrap();
        let resolver = ColorResolver::new(store, PREFIX);
        let res = resolver.resolve("front", 45.0).await.unwrap();
        assert_eq!(res.rgb, Rgb::new(0, 255, 0));
        assert!(matches!(
            resolver.resolve("front", -3.0).await,
            Err(LightError::InvalidDistance { .. })
        ));
    }
}
