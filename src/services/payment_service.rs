//! Payment webhook intake. The payment provider is an external party; we
//! trust its webhook shape and record the outcome. The `pending -> paid`
//! transition is the single place a delivery record is materialized.

use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::status::PaymentStatus,
    dto::orders::PaymentWebhookRequest,
    error::{AppError, AppResult},
    events::OrderPaidEvent,
    models::{Delivery, Order, Pharmacy},
    response::ApiResponse,
    state::AppState,
};

pub async fn handle_webhook(
    state: &AppState,
    payload: PaymentWebhookRequest,
) -> AppResult<ApiResponse<Order>> {
    let status = PaymentStatus::parse(&payload.payment_status)
        .ok_or_else(|| AppError::Validation("unknown payment status".into()))?;

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(payload.order_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    if status == PaymentStatus::Paid {
        // Conditional on `pending` so replayed webhooks create exactly one
        // delivery per paid order.
        let updated: Option<Order> = sqlx::query_as(
            r#"
            UPDATE orders
            SET payment_status = 'paid', transaction_id = $2, updated_at = NOW()
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&payload.transaction_id)
        .fetch_optional(&state.pool)
        .await?;

        let Some(order) = updated else {
            tracing::info!(order_id = %order.id, "payment webhook replay ignored");
            return Ok(ApiResponse::success("Already processed", order, None));
        };

        let order = materialize_delivery(state, order).await?;
        return Ok(ApiResponse::success("Payment recorded", order, None));
    }

    let order: Order = sqlx::query_as(
        r#"
        UPDATE orders
        SET payment_status = $2, transaction_id = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(order.id)
    .bind(status.as_str())
    .bind(&payload.transaction_id)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(order_id = %order.id, payment_status = %status, "payment status updated");
    Ok(ApiResponse::success("Payment status updated", order, None))
}

async fn materialize_delivery(state: &AppState, order: Order) -> AppResult<Order> {
    let pharmacy: Option<Pharmacy> = sqlx::query_as("SELECT * FROM pharmacies WHERE id = $1")
        .bind(order.pharmacy_id)
        .fetch_optional(&state.pool)
        .await?;
    let pickup = pharmacy.map(|p| json!({"lat": p.lat, "lon": p.lon}));
    let drop_off = order
        .shipping_address
        .get("lat")
        .zip(order.shipping_address.get("lon"))
        .map(|(lat, lon)| json!({"lat": lat, "lon": lon}));

    let delivery: Delivery = sqlx::query_as(
        r#"
        INSERT INTO deliveries (id, order_id, status, pickup_location, delivery_location)
        VALUES ($1, $2, 'assigned', $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order.id)
    .bind(pickup)
    .bind(drop_off)
    .fetch_one(&state.pool)
    .await?;

    let order: Order = sqlx::query_as(
        "UPDATE orders SET delivery_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(delivery.id)
    .fetch_one(&state.pool)
    .await?;

    let event = OrderPaidEvent {
        order_id: order.id,
        delivery_id: delivery.id,
        pharmacy_id: order.pharmacy_id,
        total: order.total_amount,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, order_id = %order.id, "orders.paid publish failed");
    }

    tracing::info!(order_id = %order.id, delivery_id = %delivery.id, "order paid, delivery created");
    Ok(order)
}

/// Dev-only shortcut that stands in for the provider's webhook.
pub async fn simulate(state: &AppState, order_id: Uuid) -> AppResult<ApiResponse<Order>> {
    handle_webhook(
        state,
        PaymentWebhookRequest {
            order_id,
            payment_status: "paid".to_string(),
            transaction_id: format!("sim_{}", Uuid::new_v4()),
        },
    )
    .await
}
