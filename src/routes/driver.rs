//! Driver gateway routes: delivery discovery, acceptance, progress updates
//! and the OTP-confirmed handoff.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::deliveries::{
        ConfirmDeliveryRequest, DeliveryDetail, DeliveryList, DeliveryListQuery,
        DeliveryStatusUpdate, LocationUpdate,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_role},
    models::Delivery,
    response::ApiResponse,
    services::delivery_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deliveries", get(list_deliveries))
        .route("/deliveries/{id}", get(get_delivery))
        .route("/deliveries/{id}/accept", post(accept_delivery))
        .route("/deliveries/{id}/status", post(update_status))
        .route("/deliveries/{id}/location", post(update_location))
        .route("/deliveries/{id}/confirm-delivery", post(confirm_delivery))
}

#[utoipa::path(
    get,
    path = "/api/v1/driver/deliveries",
    params(
        ("status" = Option<String>, Query, description = "Filter own deliveries by status"),
        ("available" = Option<bool>, Query, description = "List unassigned deliveries ready for pickup"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("size" = Option<i64>, Query, description = "Page size, default 20"),
    ),
    responses((status = 200, description = "Deliveries", body = ApiResponse<DeliveryList>)),
    security(("bearer_auth" = [])),
    tag = "Driver"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DeliveryListQuery>,
) -> AppResult<Json<ApiResponse<DeliveryList>>> {
    ensure_role(&user, "driver")?;
    let resp = delivery_service::list_deliveries(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/driver/deliveries/{id}",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery with order summary", body = ApiResponse<DeliveryDetail>),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Driver"
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DeliveryDetail>>> {
    ensure_role(&user, "driver")?;
    let resp = delivery_service::get_delivery(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/driver/deliveries/{id}/accept",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery bound to this driver", body = ApiResponse<Delivery>),
        (status = 409, description = "Already claimed or no longer available"),
    ),
    security(("bearer_auth" = [])),
    tag = "Driver"
)]
pub async fn accept_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Delivery>>> {
    ensure_role(&user, "driver")?;
    let resp = delivery_service::accept_delivery(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/driver/deliveries/{id}/status",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = DeliveryStatusUpdate,
    responses(
        (status = 200, description = "Status applied and order advanced", body = ApiResponse<Delivery>),
        (status = 400, description = "delivered must go through confirm-delivery"),
    ),
    security(("bearer_auth" = [])),
    tag = "Driver"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeliveryStatusUpdate>,
) -> AppResult<Json<ApiResponse<Delivery>>> {
    ensure_role(&user, "driver")?;
    let resp = delivery_service::update_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/driver/deliveries/{id}/location",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = LocationUpdate,
    responses((status = 200, description = "Position recorded", body = ApiResponse<Delivery>)),
    security(("bearer_auth" = [])),
    tag = "Driver"
)]
pub async fn update_location(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationUpdate>,
) -> AppResult<Json<ApiResponse<Delivery>>> {
    ensure_role(&user, "driver")?;
    let resp = delivery_service::update_location(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/driver/deliveries/{id}/confirm-delivery",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = ConfirmDeliveryRequest,
    responses(
        (status = 200, description = "Order delivered, reservation committed", body = ApiResponse<Delivery>),
        (status = 400, description = "Wrong OTP"),
    ),
    security(("bearer_auth" = [])),
    tag = "Driver"
)]
pub async fn confirm_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmDeliveryRequest>,
) -> AppResult<Json<ApiResponse<Delivery>>> {
    ensure_role(&user, "driver")?;
    let resp = delivery_service::confirm_delivery(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
