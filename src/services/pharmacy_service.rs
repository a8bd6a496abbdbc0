//! Pharmacy browsing for customers and the pharmacist gateway: order
//! accept/decline/prepare and inventory CRUD, always scoped to the signed-in
//! pharmacist's own pharmacy.

use uuid::Uuid;

use crate::{
    domain::status::OrderStatus,
    dto::{
        orders::OrderList,
        pharmacies::{
            AddInventoryRequest, DeclineOrderRequest, InventoryList, NearbyPharmacy,
            PharmacistProfile, PharmacyList, StockList, StockRow, UpdateInventoryRequest,
        },
    },
    error::{AppError, AppResult},
    events::OrderCancelledEvent,
    geo::{self, GeoPoint},
    middleware::auth::AuthUser,
    models::{InventoryItem, Order, Pharmacy, User},
    response::{ApiResponse, Meta},
    routes::params::{NearbyQuery, StatusListQuery},
    services::{inventory_service, order_service},
    state::AppState,
};

// -- Customer-facing browse -------------------------------------------------

pub async fn list_nearby(
    state: &AppState,
    query: NearbyQuery,
) -> AppResult<ApiResponse<PharmacyList>> {
    let (page, size, offset) = query.pagination.normalize();
    let radius_km = geo::parse_radius_km(query.radius.as_deref());

    let pharmacies: Vec<Pharmacy> =
        sqlx::query_as("SELECT * FROM pharmacies WHERE is_active ORDER BY created_at DESC")
            .fetch_all(&state.pool)
            .await?;

    let mut items: Vec<NearbyPharmacy> = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => {
            let origin = GeoPoint { lat, lon };
            let mut with_distance: Vec<NearbyPharmacy> = pharmacies
                .into_iter()
                .map(|p| {
                    let distance_km = geo::haversine_km(
                        origin,
                        GeoPoint {
                            lat: p.lat,
                            lon: p.lon,
                        },
                    );
                    NearbyPharmacy {
                        pharmacy: p,
                        distance_km,
                    }
                })
                .filter(|p| p.distance_km <= radius_km)
                .collect();
            with_distance.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
            with_distance
        }
        _ => pharmacies
            .into_iter()
            .map(|p| NearbyPharmacy {
                pharmacy: p,
                distance_km: 0.0,
            })
            .collect(),
    };

    let total = items.len() as i64;
    items = items
        .into_iter()
        .skip(offset as usize)
        .take(size as usize)
        .collect();

    Ok(ApiResponse::success(
        "Pharmacies",
        PharmacyList { items },
        Some(Meta::new(page, size, total)),
    ))
}

pub async fn get_pharmacy(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Pharmacy>> {
    let pharmacy: Pharmacy = sqlx::query_as("SELECT * FROM pharmacies WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound("Pharmacy"))?;
    Ok(ApiResponse::success("OK", pharmacy, None))
}

/// Sellable stock only: unexpired batches with availability.
pub async fn list_public_inventory(
    state: &AppState,
    pharmacy_id: Uuid,
) -> AppResult<ApiResponse<StockList>> {
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM pharmacies WHERE id = $1")
        .bind(pharmacy_id)
        .fetch_optional(&state.pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Pharmacy"));
    }

    let items: Vec<StockRow> = sqlx::query_as(
        r#"
        SELECT i.medicine_id, m.name AS medicine_name, i.batch_no, i.expiry_date,
               i.available_qty, i.mrp, i.selling_price
        FROM inventory i
        JOIN medicines m ON m.id = i.medicine_id
        WHERE i.pharmacy_id = $1
          AND i.expiry_date > CURRENT_DATE
          AND i.available_qty > 0
        ORDER BY m.name, i.expiry_date
        "#,
    )
    .bind(pharmacy_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success("Inventory", StockList { items }, None))
}

// -- Pharmacist gateway -----------------------------------------------------

/// The pharmacy owned by the signed-in pharmacist. A pharmacist principal
/// without a pharmacy has nothing to operate on.
pub async fn owned_pharmacy(state: &AppState, user: &AuthUser) -> AppResult<Pharmacy> {
    sqlx::query_as("SELECT * FROM pharmacies WHERE pharmacist_user_id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::Forbidden)
}

pub async fn profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<PharmacistProfile>> {
    let pharmacy = owned_pharmacy(state, user).await?;
    let account: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(ApiResponse::success(
        "OK",
        PharmacistProfile {
            user: account,
            pharmacy,
        },
        None,
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: StatusListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let pharmacy = owned_pharmacy(state, user).await?;
    let (page, size, offset) = query.pagination.normalize();

    let (orders, total): (Vec<Order>, i64) = match query.status.as_deref().filter(|s| !s.is_empty())
    {
        Some(status) => {
            let orders = sqlx::query_as(
                "SELECT * FROM orders WHERE pharmacy_id = $1 AND status = $2
                 ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            )
            .bind(pharmacy.id)
            .bind(status)
            .bind(size)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;
            let (total,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM orders WHERE pharmacy_id = $1 AND status = $2",
            )
            .bind(pharmacy.id)
            .bind(status)
            .fetch_one(&state.pool)
            .await?;
            (orders, total)
        }
        None => {
            let orders = sqlx::query_as(
                "SELECT * FROM orders WHERE pharmacy_id = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(pharmacy.id)
            .bind(size)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;
            let (total,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM orders WHERE pharmacy_id = $1")
                    .bind(pharmacy.id)
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

async fn scoped_order(state: &AppState, pharmacy_id: Uuid, order_id: Uuid) -> AppResult<Order> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND pharmacy_id = $2")
        .bind(order_id)
        .bind(pharmacy_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::OrderNotFound)
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let pharmacy = owned_pharmacy(state, user).await?;
    let order = scoped_order(state, pharmacy.id, order_id).await?;
    Ok(ApiResponse::success("OK", order, None))
}

pub async fn accept_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let pharmacy = owned_pharmacy(state, user).await?;
    scoped_order(state, pharmacy.id, order_id).await?;

    let order = order_service::transition(
        state,
        order_id,
        OrderStatus::Created,
        OrderStatus::AcceptedByPharmacy,
    )
    .await?
    .ok_or(AppError::InvalidTransition)?;

    tracing::info!(order_id = %order.id, "order accepted by pharmacy");
    Ok(ApiResponse::success("Order accepted", order, None))
}

/// Decline releases every reserved line and cancels the order.
pub async fn decline_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: DeclineOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let pharmacy = owned_pharmacy(state, user).await?;
    scoped_order(state, pharmacy.id, order_id).await?;

    let order: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders
        SET status = 'cancelled', cancellation_reason = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'created'
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(
        payload
            .reason
            .as_deref()
            .unwrap_or("declined by pharmacy"),
    )
    .fetch_optional(&state.pool)
    .await?;
    let order = order.ok_or(AppError::InvalidTransition)?;

    inventory_service::release_lines(state, order.pharmacy_id, &order.line_items()).await;

    let event = OrderCancelledEvent {
        order_id: order.id,
        user_id: order.user_id,
        pharmacy_id: order.pharmacy_id,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, order_id = %order.id, "orders.cancelled publish failed");
    }

    tracing::info!(order_id = %order.id, "order declined by pharmacy");
    Ok(ApiResponse::success("Order declined", order, None))
}

pub async fn mark_prepared(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let pharmacy = owned_pharmacy(state, user).await?;
    scoped_order(state, pharmacy.id, order_id).await?;

    let order = order_service::transition(
        state,
        order_id,
        OrderStatus::AcceptedByPharmacy,
        OrderStatus::Prepared,
    )
    .await?
    .ok_or(AppError::InvalidTransition)?;

    tracing::info!(order_id = %order.id, "order prepared");
    Ok(ApiResponse::success("Order prepared", order, None))
}

// -- Pharmacist inventory CRUD ----------------------------------------------

pub async fn list_inventory(
    state: &AppState,
    user: &AuthUser,
    query: StatusListQuery,
) -> AppResult<ApiResponse<InventoryList>> {
    let pharmacy = owned_pharmacy(state, user).await?;
    let (page, size, offset) = query.pagination.normalize();

    let items: Vec<InventoryItem> = sqlx::query_as(
        "SELECT * FROM inventory WHERE pharmacy_id = $1
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(pharmacy.id)
    .bind(size)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM inventory WHERE pharmacy_id = $1")
        .bind(pharmacy.id)
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Inventory",
        InventoryList { items },
        Some(Meta::new(page, size, total)),
    ))
}

pub async fn add_inventory(
    state: &AppState,
    user: &AuthUser,
    payload: AddInventoryRequest,
) -> AppResult<ApiResponse<InventoryItem>> {
    let pharmacy = owned_pharmacy(state, user).await?;

    if payload.available_qty < 0 {
        return Err(AppError::Validation("available_qty must not be negative".into()));
    }
    if payload.selling_price <= 0 || payload.mrp <= 0 {
        return Err(AppError::Validation("prices must be positive".into()));
    }
    if payload.batch_no.trim().is_empty() {
        return Err(AppError::MissingField("batch_no"));
    }

    let medicine: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM medicines WHERE id = $1")
        .bind(payload.medicine_id)
        .fetch_optional(&state.pool)
        .await?;
    if medicine.is_none() {
        return Err(AppError::NotFound("Medicine"));
    }

    let inserted: Result<InventoryItem, sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO inventory
            (id, pharmacy_id, medicine_id, batch_no, expiry_date, available_qty,
             reserved_qty, mrp, selling_price)
        VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(pharmacy.id)
    .bind(payload.medicine_id)
    .bind(payload.batch_no.trim())
    .bind(payload.expiry_date)
    .bind(payload.available_qty)
    .bind(payload.mrp)
    .bind(payload.selling_price)
    .fetch_one(&state.pool)
    .await;

    let item = match inserted {
        Ok(item) => item,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(AppError::BatchExists);
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(item_id = %item.id, pharmacy_id = %pharmacy.id, "inventory item added");
    Ok(ApiResponse::success("Inventory item added", item, None))
}

pub async fn update_inventory(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateInventoryRequest,
) -> AppResult<ApiResponse<InventoryItem>> {
    let pharmacy = owned_pharmacy(state, user).await?;

    if payload.available_qty.is_some_and(|q| q < 0) {
        return Err(AppError::Validation("available_qty must not be negative".into()));
    }

    let item: InventoryItem = sqlx::query_as(
        r#"
        UPDATE inventory
        SET expiry_date = COALESCE($3, expiry_date),
            available_qty = COALESCE($4, available_qty),
            mrp = COALESCE($5, mrp),
            selling_price = COALESCE($6, selling_price)
        WHERE id = $1 AND pharmacy_id = $2
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(pharmacy.id)
    .bind(payload.expiry_date)
    .bind(payload.available_qty)
    .bind(payload.mrp)
    .bind(payload.selling_price)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InventoryNotFound)?;

    Ok(ApiResponse::success("Inventory item updated", item, None))
}

pub async fn delete_inventory(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let pharmacy = owned_pharmacy(state, user).await?;

    let deleted = sqlx::query("DELETE FROM inventory WHERE id = $1 AND pharmacy_id = $2")
        .bind(item_id)
        .bind(pharmacy.id)
        .execute(&state.pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::InventoryNotFound);
    }

    Ok(ApiResponse::success(
        "Inventory item removed",
        serde_json::json!({}),
        None,
    ))
}
