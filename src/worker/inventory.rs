use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    events::{Envelope, InventoryUpdatedEvent},
    state::AppState,
    worker::notify,
};

const LOW_STOCK_THRESHOLD: i64 = 10;
const EXPIRY_WINDOW_DAYS: i64 = 30;

/// Stock monitoring and the re-index signal for the external search engine.
pub fn inventory_updated(envelope: Envelope, state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let payload: InventoryUpdatedEvent = serde_json::from_value(envelope.payload)?;
        info!(
            pharmacy_id = %payload.pharmacy_id,
            medicine_id = %payload.medicine_id,
            "processing inventory.updated"
        );

        let reindex = Envelope::wrap(
            "search.reindex",
            json!({"pharmacy_id": payload.pharmacy_id, "medicine_id": payload.medicine_id}),
        );
        state.bus.publish_envelope("search.reindex", &reindex).await?;

        let (sellable,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(available_qty), 0)::bigint FROM inventory
            WHERE pharmacy_id = $1 AND medicine_id = $2 AND expiry_date > CURRENT_DATE
            "#,
        )
        .bind(payload.pharmacy_id)
        .bind(payload.medicine_id)
        .fetch_one(&state.pool)
        .await?;

        if sellable < LOW_STOCK_THRESHOLD {
            warn!(
                pharmacy_id = %payload.pharmacy_id,
                medicine_id = %payload.medicine_id,
                sellable,
                "low stock"
            );
            notify::to_pharmacy(
                &state,
                payload.pharmacy_id,
                "low_stock",
                json!({"medicine_id": payload.medicine_id, "sellable_qty": sellable}),
            )
            .await?;
        }

        let (expiring,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM inventory
            WHERE pharmacy_id = $1 AND medicine_id = $2
              AND available_qty > 0
              AND expiry_date > CURRENT_DATE
              AND expiry_date <= CURRENT_DATE + $3::int
            "#,
        )
        .bind(payload.pharmacy_id)
        .bind(payload.medicine_id)
        .bind(EXPIRY_WINDOW_DAYS as i32)
        .fetch_one(&state.pool)
        .await?;

        if expiring > 0 {
            notify::to_pharmacy(
                &state,
                payload.pharmacy_id,
                "batches_expiring",
                json!({"medicine_id": payload.medicine_id, "batches": expiring}),
            )
            .await?;
        }

        Ok(())
    })
}
