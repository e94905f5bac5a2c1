//! Distance range listing and editing.

use rangelight_actuation::range::range_limits;
use rangelight_store::catalog;
use rangelight_types::{Body, LightError, Range};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{data, message, parse};
use crate::context::AppContext;

#[derive(Serialize)]
struct RangeBounds {
    #[serde(rename = "range_ID")]
    id: i64,
    lower_limit: f64,
    upper_limit: f64,
}

/// Range bounds only, as the sensor firmware expects them.
pub async fn fetch_sensor_ranges(ctx: &AppContext) -> Result<Body, LightError> {
    let ranges = all_ranges(ctx, "fetch sensor ranges").await?;
    let bounds: Vec<RangeBounds> = ranges
        .into_iter()
        .map(|r| RangeBounds {
            id: r.id,
            lower_limit: r.lower,
            upper_limit: r.upper,
        })
        .collect();
    data(&bounds)
}

pub async fn get_ranges(ctx: &AppContext) -> Result<Body, LightError> {
    data(&all_ranges(ctx, "fetch ranges").await?)
}

#[derive(Debug, Deserialize)]
struct RangePayload {
    #[serde(rename = "range_ID")]
    id: i64,
    range_name: String,
    lower_limit: f64,
    upper_limit: f64,
}

/// Overwrite one range, then announce the new limits to the strips.
pub async fn update_range(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let RangePayload {
        id,
        range_name,
        lower_limit,
        upper_limit,
    } = parse(payload)?;
    if !(lower_limit.is_finite() && upper_limit.is_finite()) || lower_limit >= upper_limit {
        return Err(LightError::validation(
            "lower_limit must be below upper_limit",
        ));
    }
    let range = Range {
        id,
        name: range_name,
        lower: lower_limit,
        upper: upper_limit,
    };
    let updated = ctx
        .store
        .call("update range settings", move |conn| {
            catalog::update_range(conn, &range)
        })
        .await?;
    if !updated {
        return Err(LightError::not_found("Range"));
    }
    let limits = ctx.actuation.publish_range_limits().await?;
    info!(range_id = id, limits = %limits, "range updated");
    message("Range settings updated successfully")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RangeLimits {
    close_upper_limit: f64,
    mid_upper_limit: f64,
}

pub async fn get_range_limits(ctx: &AppContext) -> Result<Body, LightError> {
    let (close, mid) = range_limits(&all_ranges(ctx, "fetch range limits").await?)?;
    data(&RangeLimits {
        close_upper_limit: close,
        mid_upper_limit: mid,
    })
}

async fn all_ranges(ctx: &AppContext, operation: &'static str) -> Result<Vec<Range>, LightError> {
    ctx.store
        .call(operation, |conn| catalog::ranges(conn))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Action;
    use crate::handlers::handle;
    use crate::testing::context;
    use serde_json::json;

    async fn call(ctx: &AppContext, action: Action, payload: Value) -> Value {
        serde_json::to_value(handle(ctx, action, Some(payload)).await).unwrap()
    }

    #[tokio::test]
    async fn sensor_ranges_omit_names() {
        let (ctx, _) = context().await;
        let reply = call(&ctx, Action::FetchSensorRanges, json!({})).await;
        assert_eq!(
            reply["data"][0],
            json!({"range_ID": 1, "lower_limit": 0.0, "upper_limit": 20.0})
        );
        let full = call(&ctx, Action::GetRanges, json!({})).await;
        assert_eq!(full["data"][2]["range_name"], "far");
    }

    #[tokio::test]
    async fn updating_a_range_republishes_limits() {
        let (ctx, broker) = context().await;
        let payload = json!({"range_ID": 1, "range_name": "close", "lower_limit": 0, "upper_limit": 25});
        let reply = call(&ctx, Action::UpdateRange, payload).await;
        assert_eq!(reply["message"], "Range settings updated successfully");
        assert_eq!(
            broker.last_on("config/range_ledstrip").unwrap().payload,
            "25,60"
        );

        let limits = call(&ctx, Action::GetRangeLimits, json!({})).await;
        assert_eq!(limits["data"], json!({"closeUpperLimit": 25.0, "midUpperLimit": 60.0}));
    }

    #[tokio::test]
    async fn updating_missing_or_inverted_range_fails() {
        let (ctx, broker) = context().await;
        let payload = json!({"range_ID": 9, "range_name": "x", "lower_limit": 0, "upper_limit": 5});
        let reply = call(&ctx, Action::UpdateRange, payload).await;
        assert_eq!(reply["error"], "Range not found");

        let payload = json!({"range_ID": 1, "range_name": "x", "lower_limit": 30, "upper_limit": 5});
        let reply = call(&ctx, Action::UpdateRange, payload).await;
        assert!(reply["error"].as_str().unwrap().starts_with("Invalid input data"));
        assert!(broker.published().is_empty());
    }
}
