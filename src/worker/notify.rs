//! Notification fan-out. The control plane only enqueues: each notification
//! is published under `notifications.<channel>` for the out-of-scope
//! SMS/email/push transport to drain.

use serde_json::{Value, json};
use uuid::Uuid;

use crate::{events::Envelope, state::AppState};

async fn enqueue(state: &AppState, channel: &str, body: Value) -> anyhow::Result<()> {
    let routing_key = format!("notifications.{channel}");
    let envelope = Envelope::wrap(&routing_key, body);
    state.bus.publish_envelope(&routing_key, &envelope).await?;
    Ok(())
}

pub async fn to_customer(
    state: &AppState,
    user_id: Uuid,
    kind: &str,
    body: Value,
) -> anyhow::Result<()> {
    enqueue(
        state,
        "customer",
        json!({"user_id": user_id, "kind": kind, "body": body}),
    )
    .await
}

pub async fn to_pharmacy(
    state: &AppState,
    pharmacy_id: Uuid,
    kind: &str,
    body: Value,
) -> anyhow::Result<()> {
    enqueue(
        state,
        "pharmacy",
        json!({"pharmacy_id": pharmacy_id, "kind": kind, "body": body}),
    )
    .await
}

pub async fn to_drivers(
    state: &AppState,
    driver_ids: &[Uuid],
    kind: &str,
    body: Value,
) -> anyhow::Result<()> {
    enqueue(
        state,
        "drivers",
        json!({"driver_ids": driver_ids, "kind": kind, "body": body}),
    )
    .await
}
