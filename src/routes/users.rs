use axum::{
    Json, Router,
    extract::State,
    routing::get,
};

use crate::{
    dto::users::{CartView, UpdateCartRequest, UpdateProfileRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::user_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/cart", get(get_cart).put(put_cart))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    responses((status = 200, description = "Current profile", body = ApiResponse<User>)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::get_profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/profile",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile updated", body = ApiResponse<User>)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::update_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/cart",
    responses((status = 200, description = "Persisted cart", body = ApiResponse<CartView>)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = user_service::get_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/cart",
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Cart replaced", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid quantity"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn put_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = user_service::put_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}
