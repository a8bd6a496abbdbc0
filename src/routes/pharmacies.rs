use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::pharmacies::{PharmacyList, StockList},
    error::AppResult,
    models::Pharmacy,
    response::ApiResponse,
    routes::params::NearbyQuery,
    services::pharmacy_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pharmacies))
        .route("/{id}", get(get_pharmacy))
        .route("/{id}/inventory", get(list_inventory))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacies",
    params(
        ("lat" = Option<f64>, Query, description = "Latitude of the search origin"),
        ("lon" = Option<f64>, Query, description = "Longitude of the search origin"),
        ("radius" = Option<String>, Query, description = "Radius such as 10km, default 10km"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("size" = Option<i64>, Query, description = "Page size, default 20"),
    ),
    responses((status = 200, description = "Active pharmacies, nearest first when an origin is given", body = ApiResponse<PharmacyList>)),
    tag = "Pharmacies"
)]
pub async fn list_pharmacies(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<ApiResponse<PharmacyList>>> {
    let resp = pharmacy_service::list_nearby(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacies/{id}",
    params(("id" = Uuid, Path, description = "Pharmacy ID")),
    responses(
        (status = 200, description = "Pharmacy detail", body = ApiResponse<Pharmacy>),
        (status = 404, description = "Not found"),
    ),
    tag = "Pharmacies"
)]
pub async fn get_pharmacy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Pharmacy>>> {
    let resp = pharmacy_service::get_pharmacy(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacies/{id}/inventory",
    params(("id" = Uuid, Path, description = "Pharmacy ID")),
    responses((status = 200, description = "Sellable stock with catalog names", body = ApiResponse<StockList>)),
    tag = "Pharmacies"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<StockList>>> {
    let resp = pharmacy_service::list_public_inventory(&state, id).await?;
    Ok(Json(resp))
}
