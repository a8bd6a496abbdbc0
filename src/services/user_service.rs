use crate::{
    dto::users::{CartView, UpdateCartRequest, UpdateProfileRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    state::AppState,
};

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let profile: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(ApiResponse::success("OK", profile, None))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
    }
    if let Some(addresses) = &payload.addresses {
        if !addresses.is_array() {
            return Err(AppError::Validation("addresses must be an array".into()));
        }
    }

    let profile: User = sqlx::query_as(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            addresses = COALESCE($3, addresses),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.addresses)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::UserNotFound)?;

    Ok(ApiResponse::success("Profile updated", profile, None))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let profile: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let items = serde_json::from_value(profile.cart).unwrap_or_default();
    Ok(ApiResponse::success("OK", CartView { items }, None))
}

/// Replace the cart wholesale. The cart is advisory; checkout re-prices from
/// live inventory.
pub async fn put_cart(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.items.iter().any(|e| e.qty < 1) {
        return Err(AppError::Validation("cart quantities must be at least 1".into()));
    }

    let cart = serde_json::to_value(&payload.items).expect("cart entries serialize");
    sqlx::query("UPDATE users SET cart = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.user_id)
        .bind(&cart)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart updated",
        CartView {
            items: payload.items,
        },
        None,
    ))
}
