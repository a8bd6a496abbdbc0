//! Driver gateway: available-delivery listing, conditional acceptance,
//! status and location updates, and the OTP-gated final handoff that commits
//! the inventory reservation.

use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::status::{DeliveryStatus, OrderStatus},
    dto::deliveries::{
        ConfirmDeliveryRequest, DeliveryDetail, DeliveryList, DeliveryListQuery,
        DeliveryStatusUpdate, LocationUpdate, OrderSummary,
    },
    error::{AppError, AppResult},
    events::{DeliveryCreatedEvent, DeliveryUpdatedEvent},
    middleware::auth::AuthUser,
    models::{Delivery, Order},
    response::{ApiResponse, Meta},
    services::{inventory_service, order_service},
    state::AppState,
};

pub async fn list_deliveries(
    state: &AppState,
    user: &AuthUser,
    query: DeliveryListQuery,
) -> AppResult<ApiResponse<DeliveryList>> {
    let (page, size, offset) = query.pagination.normalize();

    let (items, total): (Vec<Delivery>, i64) = if query.available {
        // Unclaimed deliveries whose order is ready for pickup.
        let items = sqlx::query_as(
            r#"
            SELECT d.* FROM deliveries d
            JOIN orders o ON o.id = d.order_id
            WHERE d.status = 'assigned' AND d.driver_id IS NULL AND o.status = 'prepared'
            ORDER BY d.assigned_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(size)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM deliveries d
            JOIN orders o ON o.id = d.order_id
            WHERE d.status = 'assigned' AND d.driver_id IS NULL AND o.status = 'prepared'
            "#,
        )
        .fetch_one(&state.pool)
        .await?;
        (items, total)
    } else {
        match query.status.as_deref().filter(|s| !s.is_empty()) {
            Some(status) => {
                let items = sqlx::query_as(
                    "SELECT * FROM deliveries WHERE driver_id = $1 AND status = $2
                     ORDER BY assigned_at DESC LIMIT $3 OFFSET $4",
                )
                .bind(user.user_id)
                .bind(status)
                .bind(size)
                .bind(offset)
                .fetch_all(&state.pool)
                .await?;
                let (total,): (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM deliveries WHERE driver_id = $1 AND status = $2",
                )
                .bind(user.user_id)
                .bind(status)
                .fetch_one(&state.pool)
                .await?;
                (items, total)
            }
            None => {
                let items = sqlx::query_as(
                    "SELECT * FROM deliveries WHERE driver_id = $1
                     ORDER BY assigned_at DESC LIMIT $2 OFFSET $3",
                )
                .bind(user.user_id)
                .bind(size)
                .bind(offset)
                .fetch_all(&state.pool)
                .await?;
                let (total,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM deliveries WHERE driver_id = $1")
                        .bind(user.user_id)
                        .fetch_one(&state.pool)
                        .await?;
                (items, total)
            }
        }
    };

    Ok(ApiResponse::success(
        "Deliveries",
        DeliveryList { items },
        Some(Meta::new(page, size, total)),
    ))
}

pub async fn get_delivery(
    state: &AppState,
    id: Uuid,
) -> AppResult<ApiResponse<DeliveryDetail>> {
    let delivery: Delivery = sqlx::query_as("SELECT * FROM deliveries WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::DeliveryNotFound)?;

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(delivery.order_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    let summary = OrderSummary {
        id: order.id,
        total_amount: order.total_amount,
        status: order.status.clone(),
        shipping_address: order.shipping_address.clone(),
        items_count: order.line_items().len(),
    };

    Ok(ApiResponse::success(
        "OK",
        DeliveryDetail {
            delivery,
            order: summary,
        },
        None,
    ))
}

/// Claim a delivery. The bind is conditional on `driver_id` being unset so
/// two drivers racing for the same job see exactly one winner.
pub async fn accept_delivery(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Delivery>> {
    let bound: Option<Delivery> = sqlx::query_as(
        r#"
        UPDATE deliveries
        SET driver_id = $2, accepted_at = NOW()
        WHERE id = $1 AND status = 'assigned' AND driver_id IS NULL
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let Some(delivery) = bound else {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
        return Err(match exists {
            Some(_) => AppError::DriverNotAvailable,
            None => AppError::DeliveryNotFound,
        });
    };

    let order = order_service::transition(
        state,
        delivery.order_id,
        OrderStatus::Prepared,
        OrderStatus::DriverAssigned,
    )
    .await?;

    let Some(order) = order else {
        // The order left `prepared` while we were binding (e.g. a cancel
        // won); undo the claim.
        sqlx::query(
            "UPDATE deliveries SET driver_id = NULL, accepted_at = NULL
             WHERE id = $1 AND driver_id = $2",
        )
        .bind(delivery.id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;
        return Err(AppError::DriverNotAvailable);
    };

    // Downstream listeners stop broadcasting once a driver is bound.
    let event = DeliveryCreatedEvent {
        delivery_id: delivery.id,
        order_id: order.id,
        pharmacy_id: order.pharmacy_id,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, delivery_id = %delivery.id, "deliveries.created publish failed");
    }

    tracing::info!(delivery_id = %delivery.id, driver_id = %user.user_id, "delivery accepted");
    Ok(ApiResponse::success("Delivery accepted", delivery, None))
}

async fn driver_delivery(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<Delivery> {
    sqlx::query_as("SELECT * FROM deliveries WHERE id = $1 AND driver_id = $2")
        .bind(id)
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::DeliveryNotFound)
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: DeliveryStatusUpdate,
) -> AppResult<ApiResponse<Delivery>> {
    let status = DeliveryStatus::parse(&payload.status)
        .ok_or_else(|| AppError::Validation("unknown delivery status".into()))?;

    match status {
        // The final handoff must go through confirm-delivery (OTP).
        DeliveryStatus::Delivered => {
            return Err(AppError::BadRequest(
                "delivered must be confirmed with the customer OTP".into(),
            ));
        }
        DeliveryStatus::Assigned => {
            return Err(AppError::BadRequest("cannot move a delivery back to assigned".into()));
        }
        DeliveryStatus::PickedUp | DeliveryStatus::InTransit | DeliveryStatus::Failed => {}
    }

    let delivery = driver_delivery(state, user, id).await?;
    let location = payload
        .lat
        .zip(payload.lon)
        .map(|(lat, lon)| json!({"lat": lat, "lon": lon}));

    let delivery: Delivery = sqlx::query_as(
        r#"
        UPDATE deliveries
        SET status = $3,
            current_location = COALESCE($4, current_location),
            notes = COALESCE($5, notes),
            pickup_at = CASE WHEN $3 = 'picked_up' THEN NOW() ELSE pickup_at END
        WHERE id = $1 AND driver_id = $2
        RETURNING *
        "#,
    )
    .bind(delivery.id)
    .bind(user.user_id)
    .bind(status.as_str())
    .bind(location)
    .bind(payload.notes.as_deref())
    .fetch_one(&state.pool)
    .await?;

    let order = match status {
        DeliveryStatus::PickedUp | DeliveryStatus::InTransit => {
            // First movement drives the order into transit; repeats are
            // no-ops because the conditional update finds no row.
            order_service::transition(
                state,
                delivery.order_id,
                OrderStatus::DriverAssigned,
                OrderStatus::InTransit,
            )
            .await?
        }
        DeliveryStatus::Failed => order_service::transition(
            state,
            delivery.order_id,
            OrderStatus::InTransit,
            OrderStatus::Failed,
        )
        .await?,
        _ => None,
    };

    let user_id = match order {
        Some(order) => order.user_id,
        None => {
            let (user_id,): (Uuid,) = sqlx::query_as("SELECT user_id FROM orders WHERE id = $1")
                .bind(delivery.order_id)
                .fetch_one(&state.pool)
                .await?;
            user_id
        }
    };

    let event = DeliveryUpdatedEvent {
        delivery_id: delivery.id,
        order_id: delivery.order_id,
        status: delivery.status.clone(),
        user_id,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, delivery_id = %delivery.id, "deliveries.updated publish failed");
    }

    tracing::info!(delivery_id = %delivery.id, status = %delivery.status, "delivery status updated");
    Ok(ApiResponse::success("Status updated", delivery, None))
}

/// Idempotent position ping; never touches status.
pub async fn update_location(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: LocationUpdate,
) -> AppResult<ApiResponse<Delivery>> {
    let delivery = driver_delivery(state, user, id).await?;

    let delivery: Delivery = sqlx::query_as(
        "UPDATE deliveries SET current_location = $3 WHERE id = $1 AND driver_id = $2 RETURNING *",
    )
    .bind(delivery.id)
    .bind(user.user_id)
    .bind(json!({"lat": payload.lat, "lon": payload.lon}))
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success("Location updated", delivery, None))
}

/// Final handoff: the driver presents the customer's OTP. On success the
/// order finalizes and the reservation is committed out of existence.
pub async fn confirm_delivery(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ConfirmDeliveryRequest,
) -> AppResult<ApiResponse<Delivery>> {
    let delivery = driver_delivery(state, user, id).await?;

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(delivery.order_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    if order.delivery_otp != payload.otp {
        return Err(AppError::DeliveryOtpInvalid);
    }

    let order = order_service::transition(
        state,
        order.id,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    )
    .await?
    .ok_or(AppError::InvalidTransition)?;

    let delivery: Delivery = sqlx::query_as(
        r#"
        UPDATE deliveries SET status = 'delivered', delivered_at = NOW()
        WHERE id = $1 AND driver_id = $2
        RETURNING *
        "#,
    )
    .bind(delivery.id)
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    inventory_service::commit_lines(state, order.pharmacy_id, &order.line_items()).await?;

    let event = DeliveryUpdatedEvent {
        delivery_id: delivery.id,
        order_id: order.id,
        status: delivery.status.clone(),
        user_id: order.user_id,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, delivery_id = %delivery.id, "deliveries.updated publish failed");
    }

    tracing::info!(delivery_id = %delivery.id, order_id = %order.id, "delivery confirmed");
    Ok(ApiResponse::success("Delivery confirmed", delivery, None))
}
