use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::Medicine,
    response::ApiResponse,
    routes::params::SearchQuery,
    services::medicine_service::{self, MedicineList},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/{id}", get(get_medicine))
}

#[utoipa::path(
    get,
    path = "/api/v1/medicines/search",
    params(
        ("q" = String, Query, description = "Search term matched against name, brand, generic name, salt and synonyms"),
        ("lat" = Option<f64>, Query, description = "Narrow to medicines stocked near this point"),
        ("lon" = Option<f64>, Query, description = ""),
        ("radius" = Option<String>, Query, description = "Radius such as 10km"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("size" = Option<i64>, Query, description = "Page size, default 20"),
    ),
    responses((status = 200, description = "Matching catalog entries", body = ApiResponse<MedicineList>)),
    tag = "Medicines"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<MedicineList>>> {
    let resp = medicine_service::search(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/medicines/{id}",
    params(("id" = Uuid, Path, description = "Medicine ID")),
    responses(
        (status = 200, description = "Catalog entry", body = ApiResponse<Medicine>),
        (status = 404, description = "Not found"),
    ),
    tag = "Medicines"
)]
pub async fn get_medicine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Medicine>>> {
    let resp = medicine_service::get_medicine(&state, id).await?;
    Ok(Json(resp))
}
