//! Pharmacist gateway routes. Every handler requires the `pharmacist` role
//! and is scoped to the signed-in pharmacist's own pharmacy.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::OrderList,
        pharmacies::{
            AddInventoryRequest, DeclineOrderRequest, InventoryList, PharmacistProfile,
            UpdateInventoryRequest,
        },
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_role},
    models::{InventoryItem, Order},
    response::ApiResponse,
    routes::params::StatusListQuery,
    services::pharmacy_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/accept", post(accept_order))
        .route("/orders/{id}/decline", post(decline_order))
        .route("/orders/{id}/prepared", post(mark_prepared))
        .route("/inventory", get(list_inventory).post(add_inventory))
        .route("/inventory/{id}", put(update_inventory).delete(delete_inventory))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacist/me",
    responses((status = 200, description = "Pharmacist account with owned pharmacy", body = ApiResponse<PharmacistProfile>)),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PharmacistProfile>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacist/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("size" = Option<i64>, Query, description = "Page size, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses((status = 200, description = "Orders for the owned pharmacy", body = ApiResponse<OrderList>)),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StatusListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacist/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<Order>),
        (status = 404, description = "Not found or not this pharmacy's order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacist/orders/{id}/accept",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order moved to accepted_by_pharmacy", body = ApiResponse<Order>),
        (status = 400, description = "Order is not in created"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn accept_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::accept_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacist/orders/{id}/decline",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = DeclineOrderRequest,
    responses(
        (status = 200, description = "Order cancelled and stock released", body = ApiResponse<Order>),
        (status = 400, description = "Order is not in created"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn decline_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeclineOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::decline_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacist/orders/{id}/prepared",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order marked prepared", body = ApiResponse<Order>),
        (status = 400, description = "Order is not in accepted_by_pharmacy"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn mark_prepared(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::mark_prepared(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacist/inventory",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("size" = Option<i64>, Query, description = "Page size, default 20"),
    ),
    responses((status = 200, description = "All batches for the owned pharmacy", body = ApiResponse<InventoryList>)),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StatusListQuery>,
) -> AppResult<Json<ApiResponse<InventoryList>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::list_inventory(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacist/inventory",
    request_body = AddInventoryRequest,
    responses(
        (status = 201, description = "Batch added", body = ApiResponse<InventoryItem>),
        (status = 409, description = "Batch already exists for this medicine"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn add_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddInventoryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<InventoryItem>>)> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::add_inventory(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/v1/pharmacist/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    request_body = UpdateInventoryRequest,
    responses(
        (status = 200, description = "Batch updated", body = ApiResponse<InventoryItem>),
        (status = 404, description = "No such batch in this pharmacy"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn update_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInventoryRequest>,
) -> AppResult<Json<ApiResponse<InventoryItem>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::update_inventory(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/v1/pharmacist/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Batch removed"),
        (status = 404, description = "No such batch in this pharmacy"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pharmacist"
)]
pub async fn delete_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_role(&user, "pharmacist")?;
    let resp = pharmacy_service::delete_inventory(&state, &user, id).await?;
    Ok(Json(resp))
}
