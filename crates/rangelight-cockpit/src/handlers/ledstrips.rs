//! Strips, colours, colour bindings and the global switch.

use rangelight_store::{catalog, status};
use rangelight_types::wire::optional_flag;
use rangelight_types::{
    Body, Colour, LedStrip, LightError, Range, StripColorBinding, StripStatusUpdate,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::{data, message, parse};
use crate::context::AppContext;

#[derive(Debug, Deserialize)]
struct StripStatusPayload {
    led_strip_name: String,
    #[serde(deserialize_with = "optional_flag")]
    active: Option<bool>,
    #[serde(deserialize_with = "optional_flag")]
    alive: Option<bool>,
    #[serde(default)]
    colour_id: Option<i64>,
}

/// Upsert a strip's liveness. `active` and `alive` must be present.
pub async fn update_led_strip_status(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let StripStatusPayload {
        led_strip_name,
        active,
        alive,
        colour_id,
    } = parse(payload)?;
    if led_strip_name.trim().is_empty() {
        return Err(LightError::validation("led_strip_name must not be empty"));
    }
    let update = StripStatusUpdate {
        active,
        alive,
        colour_id,
    };
    let (outcome, strip) = ctx
        .store
        .call("update LED strip status", move |conn| {
            status::upsert_strip_status(conn, &led_strip_name, update)
        })
        .await?;
    info!(strip = %strip.name, outcome = outcome.as_str(), "strip status");
    message(format!("LED strip status {} successfully", outcome.as_str()))
}

#[derive(Debug, Deserialize)]
struct BindingPayload {
    #[serde(rename = "LED_strip_ID")]
    strip_id: i64,
    #[serde(rename = "range_ID")]
    range_id: i64,
    #[serde(rename = "colour_ID")]
    colour_id: i64,
}

pub async fn update_sensor_light_colour(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let BindingPayload {
        strip_id,
        range_id,
        colour_id,
    } = parse(payload)?;
    let outcome = ctx
        .store
        .call("update sensor light colour", move |conn| {
            if catalog::strip(conn, strip_id)?.is_none() {
                return Err(LightError::not_found("LED strip").into());
            }
            if !catalog::ranges(conn)?.iter().any(|r| r.id == range_id) {
                return Err(LightError::not_found("Range").into());
            }
            if catalog::colour(conn, colour_id)?.is_none() {
                return Err(LightError::InvalidColour { colour_id }.into());
            }
            catalog::upsert_binding(
                conn,
                StripColorBinding {
                    strip_id,
                    range_id,
                    colour_id,
                },
            )
        })
        .await?;
    message(format!("Sensor light colour {} successfully", outcome.as_str()))
}

#[derive(Debug, Deserialize)]
struct NewSensorLightPayload {
    #[serde(rename = "sensor_ID", default)]
    sensor_id: Option<i64>,
    #[serde(rename = "LED_strip_ID")]
    strip_id: i64,
    #[serde(rename = "range_ID")]
    range_id: i64,
    #[serde(rename = "colour_ID")]
    colour_id: i64,
}

/// Add a binding that must not exist yet, optionally linking `sensor_ID` to
/// the strip in the same transaction.
pub async fn create_sensor_light(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let NewSensorLightPayload {
        sensor_id,
        strip_id,
        range_id,
        colour_id,
    } = parse(payload)?;
    ctx.store
        .call("create sensor light entry", move |conn| {
            let tx = conn.transaction()?;
            if catalog::strip(&tx, strip_id)?.is_none() {
                return Err(LightError::not_found("LED strip").into());
            }
            if !catalog::ranges(&tx)?.iter().any(|r| r.id == range_id) {
                return Err(LightError::not_found("Range").into());
            }
            if catalog::colour(&tx, colour_id)?.is_none() {
                return Err(LightError::InvalidColour { colour_id }.into());
            }
            if let Some(sensor_id) = sensor_id {
                if catalog::sensor(&tx, sensor_id)?.is_none() {
                    return Err(LightError::UnknownSensor(sensor_id).into());
                }
                catalog::link_sensor_strip(&tx, sensor_id, strip_id)?;
            }
            catalog::create_binding(
                &tx,
                StripColorBinding {
                    strip_id,
                    range_id,
                    colour_id,
                },
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?;
    info!(strip_id, range_id, colour_id, "sensor light entry created");
    message(format!(
        "Sensor light entry created for LED strip {strip_id} and range {range_id}"
    ))
}

#[derive(Debug, Deserialize)]
struct StripIdPayload {
    id: i64,
}

/// The lowest-range binding of strip `id`.
pub async fn get_sensor_light_by_id(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let StripIdPayload { id } = parse(payload)?;
    let binding = ctx
        .store
        .call("fetch sensor light entry", move |conn| {
            catalog::strip_binding(conn, id)
        })
        .await?
        .ok_or_else(|| LightError::not_found("Sensor light entry"))?;
    data(&binding)
}

/// Flip every strip on or off.
pub async fn update_led_status(ctx: &AppContext) -> Result<Body, LightError> {
    let on = ctx.actuation.toggle_all_leds().await?;
    message(if on {
        "LED strips switched on"
    } else {
        "LED strips switched off"
    })
}

pub async fn get_colours(ctx: &AppContext) -> Result<Body, LightError> {
    let colours = ctx
        .store
        .call("fetch colours", |conn| catalog::colours(conn))
        .await?;
    data(&colours)
}

pub async fn get_sensor_light(ctx: &AppContext) -> Result<Body, LightError> {
    let bindings = ctx
        .store
        .call("fetch sensor_light entries", |conn| catalog::bindings(conn))
        .await?;
    data(&bindings)
}

#[derive(Debug, Deserialize)]
struct StripNamePayload {
    led_strip_name: String,
}

pub async fn fetch_led_strip_id(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let StripNamePayload { led_strip_name } = parse(payload)?;
    let strip = ctx
        .store
        .call("fetch LED strip ID", move |conn| {
            catalog::strip_by_name(conn, &led_strip_name)
        })
        .await?
        .ok_or_else(|| LightError::not_found("LED strip"))?;
    data(&json!({ "led_strip_id": strip.id }))
}

#[derive(Debug, Deserialize)]
struct StripRangePayload {
    led_strip_id: i64,
    range_id: i64,
}

pub async fn fetch_colour_rgb(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let StripRangePayload {
        led_strip_id,
        range_id,
    } = parse(payload)?;
    let rgb = ctx
        .store
        .call("fetch colour RGB", move |conn| {
            catalog::binding_rgb(conn, led_strip_id, range_id)
        })
        .await?
        .ok_or_else(|| LightError::not_found("Colour"))?;
    data(&json!({ "colour_rgb": rgb }))
}

#[derive(Debug, Deserialize)]
struct StripColourPayload {
    led_strip_id: i64,
    colour_id: i64,
}

/// Change a strip's fallback colour and reply with the updated strip.
pub async fn update_led_strip_color(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let StripColourPayload {
        led_strip_id,
        colour_id,
    } = parse(payload)?;
    let strip = ctx
        .store
        .call("update LED strip color", move |conn| {
            if catalog::colour(conn, colour_id)?.is_none() {
                return Err(LightError::InvalidColour { colour_id }.into());
            }
            catalog::set_strip_colour(conn, led_strip_id, colour_id)
        })
        .await?
        .ok_or_else(|| LightError::not_found("LED strip"))?;
    data(&strip)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitialLedData {
    led_strips: Vec<LedStrip>,
    ranges: Vec<Range>,
    colours: Vec<Colour>,
    sensor_lights: Vec<StripColorBinding>,
}

/// Everything the strip configuration page needs, read in one store call.
pub async fn fetch_initial_led_data(ctx: &AppContext) -> Result<Body, LightError> {
    let snapshot = ctx
        .store
        .call("fetch initial LED data", |conn| {
            Ok(InitialLedData {
                led_strips: catalog::strips(conn)?,
                ranges: catalog::ranges(conn)?,
                colours: catalog::colours(conn)?,
                sensor_lights: catalog::bindings(conn)?,
            })
        })
        .await?;
    data(&snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Action;
    use crate::handlers::handle;
    use crate::testing::context;

    async fn call(ctx: &AppContext, action: Action, payload: Value) -> Value {
        serde_json::to_value(handle(ctx, action, Some(payload)).await).unwrap()
    }

    #[tokio::test]
    async fn strip_status_insert_then_update() {
        let (ctx, _) = context().await;
        let payload = json!({"led_strip_name": "ledstripback", "active": 1, "alive": 0});
        let reply = call(&ctx, Action::UpdateLedStripStatus, payload).await;
        assert_eq!(reply["message"], "LED strip status inserted successfully");

        let payload = json!({"led_strip_name": "ledstripback", "active": 0, "alive": 1, "colour_id": 3});
        let reply = call(&ctx, Action::UpdateLedStripStatus, payload).await;
        assert_eq!(reply["message"], "LED strip status updated successfully");

        let id = call(&ctx, Action::FetchLedStripId, json!({"led_strip_name": "ledstripback"})).await;
        assert_eq!(id["data"]["led_strip_id"], 2);
    }

    #[tokio::test]
    async fn strip_status_requires_flags() {
        let (ctx, _) = context().await;
        let reply = call(&ctx, Action::UpdateLedStripStatus, json!({"led_strip_name": "x"})).await;
        assert!(reply["error"].as_str().unwrap().starts_with("Invalid input data: "));
    }

    #[tokio::test]
    async fn binding_upsert_and_lookup() {
        let (ctx, _) = context().await;
        let payload = json!({"LED_strip_ID": 1, "range_ID": 1, "colour_ID": 3});
        let reply = call(&ctx, Action::UpdateSensorLightColour, payload).await;
        assert_eq!(reply["message"], "Sensor light colour updated successfully");

        let rgb = call(&ctx, Action::FetchColourRgb, json!({"led_strip_id": 1, "range_id": 1})).await;
        assert_eq!(rgb["data"], json!({"colour_rgb": {"red": 0, "green": 0, "blue": 255}}));

        let missing = call(&ctx, Action::FetchColourRgb, json!({"led_strip_id": 1, "range_id": 8})).await;
        assert_eq!(missing["error"], "Colour not found");

        let bad = json!({"LED_strip_ID": 1, "range_ID": 1, "colour_ID": 77});
        let reply = call(&ctx, Action::UpdateSensorLightColour, bad).await;
        assert_eq!(reply["error"], "Invalid color ID: 77");
    }

    #[tokio::test]
    async fn sensor_light_creation_and_lookup() {
        let (ctx, _) = context().await;
        call(&ctx, Action::UpdateLedStripStatus, json!({"led_strip_name": "ledstripback", "active": 1, "alive": 1})).await;

        let reply = call(&ctx, Action::GetSensorLightById, json!({"id": 2})).await;
        assert_eq!(reply["error"], "Sensor light entry not found");

        let payload = json!({"sensor_ID": 1, "LED_strip_ID": 2, "range_ID": 3, "colour_ID": 2});
        let reply = call(&ctx, Action::CreateSensorLight, payload.clone()).await;
        assert_eq!(reply["message"], "Sensor light entry created for LED strip 2 and range 3");

        let reply = call(&ctx, Action::GetSensorLightById, json!({"id": 2})).await;
        assert_eq!(reply["data"], json!({"LED_strip_ID": 2, "range_ID": 3, "colour_ID": 2}));

        let linked = ctx
            .store
            .call("fetch linked strip", |conn| catalog::linked_strip(conn, 1))
            .await
            .unwrap();
        assert_eq!(linked.unwrap().name, "ledstripback");

        let reply = call(&ctx, Action::CreateSensorLight, payload).await;
        assert!(reply["error"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn sensor_light_creation_is_all_or_nothing() {
        let (ctx, _) = context().await;
        let reply = call(&ctx, Action::CreateSensorLight, json!({"LED_strip_ID": 1, "range_ID": 1})).await;
        assert!(reply["error"].as_str().unwrap().starts_with("Invalid input data"));

        // The duplicate binding aborts the sensor link too.
        let payload = json!({"sensor_ID": 1, "LED_strip_ID": 1, "range_ID": 1, "colour_ID": 2});
        let reply = call(&ctx, Action::CreateSensorLight, payload).await;
        assert!(reply["error"].as_str().unwrap().contains("already exists"));
        let linked = ctx
            .store
            .call("fetch linked strip", |conn| catalog::linked_strip(conn, 1))
            .await
            .unwrap();
        assert!(linked.is_none());

        let payload = json!({"LED_strip_ID": 9, "range_ID": 1, "colour_ID": 2});
        assert_eq!(call(&ctx, Action::CreateSensorLight, payload).await["error"], "LED strip not found");
    }

    #[tokio::test]
    async fn global_switch_publishes_state() {
        let (ctx, broker) = context().await;
        let reply = call(&ctx, Action::UpdateLedStatus, json!({})).await;
        assert_eq!(reply["message"], "LED strips switched on");
        assert_eq!(broker.last_on("control/led_on").unwrap().payload, "255,255,255,1");
        call(&ctx, Action::UpdateLedStatus, json!({})).await;
        assert_eq!(broker.last_on("control/led_on").unwrap().payload, "0,0,0,0");
    }

    #[tokio::test]
    async fn strip_colour_change_returns_strip() {
        let (ctx, _) = context().await;
        let reply = call(&ctx, Action::UpdateLedStripColor, json!({"led_strip_id": 1, "colour_id": 2})).await;
        assert_eq!(reply["data"]["colour_ID"], 2);
        assert_eq!(reply["data"]["LED_strip_name"], "ledstripfront");

        let reply = call(&ctx, Action::UpdateLedStripColor, json!({"led_strip_id": 6, "colour_id": 2})).await;
        assert_eq!(reply["error"], "LED strip not found");
    }

    #[tokio::test]
    async fn initial_data_bundles_all_tables() {
        let (ctx, _) = context().await;
        let reply = call(&ctx, Action::FetchInitialLedData, json!({})).await;
        let data = &reply["data"];
        assert_eq!(data["ledStrips"].as_array().unwrap().len(), 1);
        assert_eq!(data["ranges"].as_array().unwrap().len(), 3);
        assert_eq!(data["colours"].as_array().unwrap().len(), 3);
        assert_eq!(data["sensorLights"].as_array().unwrap().len(), 3);
        assert_eq!(data["colours"][0], json!({"colour_ID": 1, "colour_name": "red", "red": 255, "green": 0, "blue": 0}));
    }
}
