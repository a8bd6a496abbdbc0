//! Order lifecycle: idempotent creation, listing, customer cancellation and
//! rating. Holds the conditional-transition helper the gateways build on.

use uuid::Uuid;

use crate::{
    domain::status::OrderStatus,
    dto::orders::{CancelOrderRequest, CreateOrderRequest, OrderList, OrderView, RateOrderRequest},
    error::{AppError, AppResult},
    events::{OrderCancelledEvent, OrderCreatedEvent},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, Pharmacy},
    otp,
    response::{ApiResponse, Meta},
    routes::params::StatusListQuery,
    services::inventory_service,
    state::AppState,
};

/// Tax rate applied to each line subtotal, in percent.
const TAX_RATE_PCT: i64 = 18;

pub const MAX_LINE_QTY: i32 = 100;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 100;

pub fn line_tax(unit_price: i64, qty: i32) -> i64 {
    unit_price * qty as i64 * TAX_RATE_PCT / 100
}

pub fn order_total(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .map(|line| line.unit_price * line.qty as i64 + line.tax)
        .sum()
}

/// Single-winner conditional status transition. Returns `None` when the row
/// was not in `from` anymore (a concurrent attempt won).
pub async fn transition(
    state: &AppState,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> AppResult<Option<Order>> {
    debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
    let order: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2 RETURNING *",
    )
    .bind(order_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .fetch_optional(&state.pool)
    .await?;
    Ok(order)
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    idempotency_key: Option<String>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderView>> {
    if let Some(key) = idempotency_key.as_deref() {
        if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(AppError::Validation(
                "Idempotency-Key must be 1..=100 characters".into(),
            ));
        }
        if let Some(existing) = find_by_idempotency_key(state, user, key).await? {
            return Ok(ApiResponse::success("Order already created", existing.into(), None));
        }
    }

    if payload.items.is_empty() {
        return Err(AppError::Validation("order has no items".into()));
    }
    for item in &payload.items {
        if item.qty < 1 || item.qty > MAX_LINE_QTY {
            return Err(AppError::Validation(format!(
                "qty must be between 1 and {MAX_LINE_QTY}"
            )));
        }
    }

    // Single pharmacy per order.
    let pharmacy_id = payload.items[0].pharmacy_id;
    if payload.items.iter().any(|i| i.pharmacy_id != pharmacy_id) {
        return Err(AppError::BadRequest(
            "all items must belong to a single pharmacy".into(),
        ));
    }

    let pharmacy: Option<Pharmacy> = sqlx::query_as("SELECT * FROM pharmacies WHERE id = $1")
        .bind(pharmacy_id)
        .fetch_optional(&state.pool)
        .await?;
    let pharmacy = match pharmacy {
        Some(p) if p.is_active => p,
        Some(_) => return Err(AppError::BadRequest("pharmacy is not accepting orders".into())),
        None => return Err(AppError::BadRequest("pharmacy not found".into())),
    };

    // Reserve line by line; on any failure everything reserved so far is
    // returned, so the caller observes all-or-nothing semantics.
    let mut lines: Vec<OrderItem> = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        match inventory_service::reserve(state, pharmacy_id, item.medicine_id, item.qty).await {
            Ok(reserved) => lines.push(OrderItem {
                medicine_id: reserved.medicine_id,
                batch_no: reserved.batch_no,
                qty: reserved.qty,
                unit_price: reserved.unit_price,
                tax: line_tax(reserved.unit_price, reserved.qty),
            }),
            Err(err) => {
                inventory_service::release_lines(state, pharmacy_id, &lines).await;
                return Err(err);
            }
        }
    }

    let total = order_total(&lines);
    let items_json = serde_json::to_value(&lines).expect("order lines serialize");
    let delivery_otp = otp::generate();

    let inserted: Result<Order, sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO orders
            (id, user_id, pharmacy_id, items, total_amount, status, payment_status,
             shipping_address, idempotency_key, delivery_otp)
        VALUES ($1, $2, $3, $4, $5, 'created', 'pending', $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(pharmacy_id)
    .bind(&items_json)
    .bind(total)
    .bind(&payload.shipping_address)
    .bind(idempotency_key.as_deref())
    .bind(&delivery_otp)
    .fetch_one(&state.pool)
    .await;

    let order = match inserted {
        Ok(order) => order,
        Err(err) if is_idempotency_conflict(&err) => {
            // A concurrent duplicate won the unique index; drop our
            // reservation and hand back the winner.
            inventory_service::release_lines(state, pharmacy_id, &lines).await;
            let key = idempotency_key.as_deref().unwrap_or_default();
            let existing = find_by_idempotency_key(state, user, key)
                .await?
                .ok_or(AppError::IdempotencyConflict)?;
            return Ok(ApiResponse::success("Order already created", existing.into(), None));
        }
        Err(err) => return Err(err.into()),
    };

    let event = OrderCreatedEvent {
        order_id: order.id,
        user_id: order.user_id,
        pharmacy_id: order.pharmacy_id,
        items: order.items.clone(),
        total: order.total_amount,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, order_id = %order.id, "orders.created publish failed");
    }

    tracing::info!(order_id = %order.id, pharmacy_id = %pharmacy.id, total, "order created");
    Ok(ApiResponse::success("Order created", order.into(), None))
}

async fn find_by_idempotency_key(
    state: &AppState,
    user: &AuthUser,
    key: &str,
) -> AppResult<Option<Order>> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(&state.pool)
        .await?;
    match order {
        Some(order) if order.user_id == user.user_id => Ok(Some(order)),
        // The key belongs to a different customer; replaying it here is a
        // conflict, not a replay.
        Some(_) => Err(AppError::IdempotencyConflict),
        None => Ok(None),
    }
}

fn is_idempotency_conflict(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if db.constraint() == Some("orders_idempotency_key_key")
    )
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: StatusListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, size, offset) = query.pagination.normalize();

    let (orders, total): (Vec<Order>, i64) = match query.status.as_deref().filter(|s| !s.is_empty())
    {
        Some(status) => {
            let orders = sqlx::query_as(
                "SELECT * FROM orders WHERE user_id = $1 AND status = $2
                 ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            )
            .bind(user.user_id)
            .bind(status)
            .bind(size)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;
            let (total,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status = $2")
                    .bind(user.user_id)
                    .bind(status)
                    .fetch_one(&state.pool)
                    .await?;
            (orders, total)
        }
        None => {
            let orders = sqlx::query_as(
                "SELECT * FROM orders WHERE user_id = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(user.user_id)
            .bind(size)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;
            let (total,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
                    .bind(user.user_id)
                    .fetch_one(&state.pool)
                    .await?;
            (orders, total)
        }
    };

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(Meta::new(page, size, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderView>> {
    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::OrderNotFound)?;
    Ok(ApiResponse::success("OK", order.into(), None))
}

/// Customer cancellation. Allowed only before a driver is assigned; the
/// conditional update picks exactly one winner under concurrency.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<OrderView>> {
    let current: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    let status = OrderStatus::parse(&current.status).ok_or(AppError::InvalidTransition)?;
    if !status.customer_may_cancel() {
        return Err(AppError::OrderCannotCancel);
    }

    let cancelled: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders
        SET status = 'cancelled', cancellation_reason = $3, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
          AND status IN ('created', 'accepted_by_pharmacy', 'prepared')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(payload.reason.as_deref())
    .fetch_optional(&state.pool)
    .await?;

    let order = cancelled.ok_or(AppError::OrderCannotCancel)?;

    inventory_service::release_lines(state, order.pharmacy_id, &order.line_items()).await;

    let event = OrderCancelledEvent {
        order_id: order.id,
        user_id: order.user_id,
        pharmacy_id: order.pharmacy_id,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, order_id = %order.id, "orders.cancelled publish failed");
    }

    tracing::info!(order_id = %order.id, "order cancelled by customer");
    Ok(ApiResponse::success("Order cancelled", order.into(), None))
}

/// Rate a delivered order once; the score folds into the pharmacy's running
/// average.
pub async fn rate_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RateOrderRequest,
) -> AppResult<ApiResponse<OrderView>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".into()));
    }

    let current: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    if current.status != OrderStatus::Delivered.as_str() {
        return Err(AppError::BadRequest("only delivered orders can be rated".into()));
    }
    if current.rating.is_some() {
        return Err(AppError::BadRequest("order has already been rated".into()));
    }

    let order: Order = sqlx::query_as(
        r#"
        UPDATE orders SET rating = $3, review = $4, updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND rating IS NULL
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(payload.rating)
    .bind(payload.review.as_deref())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::BadRequest("order has already been rated".into()))?;

    sqlx::query(
        r#"
        UPDATE pharmacies
        SET rating = ROUND(((rating * rating_count + $2) / (rating_count + 1))::numeric, 1),
            rating_count = rating_count + 1
        WHERE id = $1
        "#,
    )
    .bind(order.pharmacy_id)
    .bind(payload.rating as f64)
    .execute(&state.pool)
    .await?;

    Ok(ApiResponse::success("Thanks for the rating", order.into(), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_is_eighteen_percent_of_line_subtotal() {
        // 2 units at 22.00 (2200 minor units): subtotal 4400, tax 792.
        assert_eq!(line_tax(2200, 2), 792);
        assert_eq!(line_tax(100, 1), 18);
    }

    #[test]
    fn order_total_sums_lines_with_tax() {
        let items = vec![OrderItem {
            medicine_id: Uuid::new_v4(),
            batch_no: "B1".into(),
            qty: 2,
            unit_price: 2200,
            tax: line_tax(2200, 2),
        }];
        // 2 x 22.00 x 1.18 = 51.92
        assert_eq!(order_total(&items), 5192);
    }

    #[test]
    fn multi_line_total() {
        let items = vec![
            OrderItem {
                medicine_id: Uuid::new_v4(),
                batch_no: "B1".into(),
                qty: 1,
                unit_price: 1000,
                tax: line_tax(1000, 1),
            },
            OrderItem {
                medicine_id: Uuid::new_v4(),
                batch_no: "B2".into(),
                qty: 3,
                unit_price: 500,
                tax: line_tax(500, 3),
            },
        ];
        assert_eq!(order_total(&items), 1180 + 1770);
    }
}
