use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    events::{DeliveryCreatedEvent, DeliveryUpdatedEvent, Envelope},
    state::AppState,
    worker::notify,
};

/// Broadcast a fresh delivery to every verified driver.
pub fn delivery_created(envelope: Envelope, state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let payload: DeliveryCreatedEvent = serde_json::from_value(envelope.payload)?;
        info!(delivery_id = %payload.delivery_id, "processing deliveries.created");

        let drivers: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM users WHERE 'driver' = ANY(roles) AND is_verified",
        )
        .fetch_all(&state.pool)
        .await?;
        let driver_ids: Vec<Uuid> = drivers.into_iter().map(|(id,)| id).collect();

        if driver_ids.is_empty() {
            info!(delivery_id = %payload.delivery_id, "no verified drivers to notify");
            return Ok(());
        }

        notify::to_drivers(
            &state,
            &driver_ids,
            "delivery_available",
            json!({"delivery_id": payload.delivery_id, "order_id": payload.order_id}),
        )
        .await?;

        Ok(())
    })
}

pub fn delivery_updated(envelope: Envelope, state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let payload: DeliveryUpdatedEvent = serde_json::from_value(envelope.payload)?;
        info!(
            delivery_id = %payload.delivery_id,
            status = %payload.status,
            "processing deliveries.updated"
        );

        notify::to_customer(
            &state,
            payload.user_id,
            "delivery_update",
            json!({
                "delivery_id": payload.delivery_id,
                "order_id": payload.order_id,
                "status": payload.status,
            }),
        )
        .await?;

        Ok(())
    })
}
