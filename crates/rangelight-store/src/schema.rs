//! Table definitions and sample provisioning.
//!
//! | table            | key                         | notes                                  |
//! |------------------|-----------------------------|----------------------------------------|
//! | `sensor`         | `sensor_id`                 | reference data                         |
//! | `sensor_range`   | `range_id`                  | half-open `[lower_limit, upper_limit)` |
//! | `input`          | `input_id`                  | append-only readings                   |
//! | `alive`          | `sensor_id`                 | one liveness record per sensor         |
//! | `colour`         | `colour_id`                 | reference data                         |
//! | `led_strip`      | `led_strip_id`, unique name | liveness + fallback colour             |
//! | `sensor_light`   | `(led_strip_id, range_id)`  | colour per strip and range             |
//! | `sensor_strip`   | `sensor_id`                 | explicit sensor → strip link           |
//! | `light_duration` | `light_duration_id`         | single configured duration             |
//! | `mute`           | `mute_id = 1`               | singleton flag                         |
//! | `led_switch`     | `switch_id = 1`             | singleton global on/off flag           |
//! | `all_sensors_status` | `status_id = 1`         | singleton "sensors powered" flag       |

use rusqlite::Connection;

pub(crate) const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sensor (
    sensor_id   INTEGER NOT NULL PRIMARY KEY,
    sensor_name TEXT    NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS sensor_range (
    range_id    INTEGER NOT NULL PRIMARY KEY,
    range_name  TEXT    NOT NULL,
    lower_limit REAL    NOT NULL,
    upper_limit REAL    NOT NULL
);

CREATE TABLE IF NOT EXISTS input (
    input_id  INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    sensor_id INTEGER NOT NULL REFERENCES sensor (sensor_id),
    distance  REAL    NOT NULL,
    timestamp TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS input_by_time ON input (timestamp DESC, input_id DESC);

CREATE TABLE IF NOT EXISTS alive (
    sensor_id INTEGER NOT NULL PRIMARY KEY,
    active    INTEGER NOT NULL DEFAULT 0,
    awake     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS colour (
    colour_id   INTEGER NOT NULL PRIMARY KEY,
    colour_name TEXT    NOT NULL DEFAULT '',
    red         INTEGER NOT NULL CHECK (red BETWEEN 0 AND 255),
    green       INTEGER NOT NULL CHECK (green BETWEEN 0 AND 255),
    blue        INTEGER NOT NULL CHECK (blue BETWEEN 0 AND 255)
);

CREATE TABLE IF NOT EXISTS led_strip (
    led_strip_id   INTEGER NOT NULL PRIMARY KEY,
    led_strip_name TEXT    NOT NULL UNIQUE,
    led_alive      INTEGER NOT NULL DEFAULT 0,
    led_active     INTEGER NOT NULL DEFAULT 0,
    colour_id      INTEGER NOT NULL REFERENCES colour (colour_id)
);

CREATE TABLE IF NOT EXISTS sensor_light (
    led_strip_id INTEGER NOT NULL REFERENCES led_strip (led_strip_id),
    range_id     INTEGER NOT NULL REFERENCES sensor_range (range_id),
    colour_id    INTEGER NOT NULL REFERENCES colour (colour_id),
    PRIMARY KEY (led_strip_id, range_id)
);

CREATE TABLE IF NOT EXISTS sensor_strip (
    sensor_id    INTEGER NOT NULL PRIMARY KEY REFERENCES sensor (sensor_id),
    led_strip_id INTEGER NOT NULL REFERENCES led_strip (led_strip_id)
);

CREATE TABLE IF NOT EXISTS light_duration (
    light_duration_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    duration          INTEGER NOT NULL CHECK (duration > 0)
);

CREATE TABLE IF NOT EXISTS mute (
    mute_id INTEGER NOT NULL PRIMARY KEY CHECK (mute_id = 1),
    mute    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS led_switch (
    switch_id INTEGER NOT NULL PRIMARY KEY CHECK (switch_id = 1),
    led_on    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS all_sensors_status (
    status_id  INTEGER NOT NULL PRIMARY KEY CHECK (status_id = 1),
    sensors_on INTEGER NOT NULL DEFAULT 0
);
";

/// Create any missing tables on `conn`. Safe to run repeatedly.
pub fn install(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

/// Sample provisioning: one sensor `front` (id 1), the close/mid/far ranges,
/// three colours and the strip `ledstripfront` showing red/green/blue per
/// range.
pub const DEMO_SEED: &str = "
INSERT OR IGNORE INTO sensor (sensor_id, sensor_name) VALUES (1, 'front');

INSERT OR IGNORE INTO sensor_range (range_id, range_name, lower_limit, upper_limit) VALUES
    (1, 'close', 0, 20),
    (2, 'mid', 20, 60),
    (3, 'far', 60, 200);

INSERT OR IGNORE INTO colour (colour_id, colour_name, red, green, blue) VALUES
    (1, 'red', 255, 0, 0),
    (2, 'green', 0, 255, 0),
    (3, 'blue', 0, 0, 255);

INSERT OR IGNORE INTO led_strip (led_strip_id, led_strip_name, led_alive, led_active, colour_id)
    VALUES (1, 'ledstripfront', 1, 1, 1);

INSERT OR IGNORE INTO sensor_light (led_strip_id, range_id, colour_id) VALUES
    (1, 1, 1),
    (1, 2, 2),
    (1, 3, 3);
";
