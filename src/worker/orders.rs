use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::info;

use crate::{
    events::{Envelope, OrderCancelledEvent, OrderCreatedEvent, OrderPaidEvent},
    state::AppState,
    worker::notify,
};

pub fn order_created(envelope: Envelope, state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let payload: OrderCreatedEvent = serde_json::from_value(envelope.payload)?;
        info!(order_id = %payload.order_id, "processing orders.created");

        notify::to_customer(
            &state,
            payload.user_id,
            "order_confirmation",
            json!({"order_id": payload.order_id, "total": payload.total}),
        )
        .await?;

        notify::to_pharmacy(
            &state,
            payload.pharmacy_id,
            "new_order",
            json!({"order_id": payload.order_id, "items": payload.items}),
        )
        .await?;

        Ok(())
    })
}

pub fn order_paid(envelope: Envelope, _state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        // The producer already materialized the delivery record; this is a
        // bookkeeping signal.
        let payload: OrderPaidEvent = serde_json::from_value(envelope.payload)?;
        info!(
            order_id = %payload.order_id,
            delivery_id = %payload.delivery_id,
            "order paid"
        );
        Ok(())
    })
}

pub fn order_cancelled(envelope: Envelope, state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let payload: OrderCancelledEvent = serde_json::from_value(envelope.payload)?;
        info!(order_id = %payload.order_id, "processing orders.cancelled");

        notify::to_customer(
            &state,
            payload.user_id,
            "order_cancelled",
            json!({"order_id": payload.order_id}),
        )
        .await?;

        Ok(())
    })
}
