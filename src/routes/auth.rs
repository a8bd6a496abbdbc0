use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    config::AppConfig,
    dto::auth::{
        AuthTokens, CreateDriverRequest, CreatePharmacistRequest, LoginOutcome, LoginRequest,
        LogoutRequest, PharmacistCreated, RefreshRequest, RegisterRequest, RegisterResponse,
        VerifyOtpRequest,
    },
    error::AppResult,
    middleware::{
        auth::{AuthUser, ensure_admin},
        rate_limit,
    },
    models::User,
    response::ApiResponse,
    services::{auth_service, token_service::TokenPair},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/admin/create-pharmacist", post(create_pharmacist))
        .route("/admin/create-driver", post(create_driver))
}

/// Session cookies mirrored alongside the JSON token pair. `Secure` is only
/// set outside dev so local http clients keep working.
fn session_cookies(config: &AppConfig, pair: &TokenPair) -> [(axum::http::HeaderName, String); 2] {
    let secure = if config.production { "; Secure" } else { "" };
    [
        (
            SET_COOKIE,
            format!(
                "access_token={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict{}",
                pair.access_token, config.access_token_ttl_secs, secure
            ),
        ),
        (
            SET_COOKIE,
            format!(
                "refresh_token={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict{}",
                pair.refresh_token, config.refresh_token_ttl_secs, secure
            ),
        ),
    ]
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, OTP sent", body = ApiResponse<RegisterResponse>),
        (status = 409, description = "Email or phone already registered"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RegisterResponse>>)> {
    let ip = rate_limit::client_ip(&headers);
    rate_limit::enforce(&state, &ip, &rate_limit::REGISTER).await?;
    let resp = auth_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Phone verified, session opened", body = ApiResponse<AuthTokens>),
        (status = 400, description = "Invalid or used OTP"),
    ),
    tag = "Auth"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyOtpRequest>,
) -> AppResult<Response> {
    let ip = rate_limit::client_ip(&headers);
    rate_limit::enforce(&state, &ip, &rate_limit::OTP).await?;
    let resp = auth_service::verify_otp(&state, payload).await?;
    let cookies = resp
        .data
        .as_ref()
        .map(|auth| session_cookies(&state.config, &auth.tokens));
    let mut response = Json(resp).into_response();
    if let Some(cookies) = cookies {
        for (name, value) in cookies {
            response
                .headers_mut()
                .append(name, value.parse().expect("valid cookie header"));
        }
    }
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair, or verification-required for unverified accounts", body = ApiResponse<LoginOutcome>),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Response> {
    let ip = rate_limit::client_ip(&headers);
    rate_limit::enforce(&state, &ip, &rate_limit::LOGIN).await?;
    let resp = auth_service::login(&state, payload).await?;
    let cookies = match resp.data.as_ref() {
        Some(LoginOutcome::Tokens(auth)) => Some(session_cookies(&state.config, &auth.tokens)),
        _ => None,
    };
    let mut response = Json(resp).into_response();
    if let Some(cookies) = cookies {
        for (name, value) in cookies {
            response
                .headers_mut()
                .append(name, value.parse().expect("valid cookie header"));
        }
    }
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair; the old refresh token is revoked", body = ApiResponse<AuthTokens>),
        (status = 401, description = "Unknown, rotated or expired refresh token"),
    ),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<AuthTokens>>> {
    let resp = auth_service::refresh(&state, &payload.refresh_token).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = LogoutRequest,
    responses((status = 200, description = "Refresh token revoked (best effort)")),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    auth_service::logout(&state, payload.refresh_token.as_deref()).await?;
    Ok(Json(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        None,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::me(&state, user.user_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/admin/create-pharmacist",
    request_body = CreatePharmacistRequest,
    responses(
        (status = 201, description = "Pharmacist account and pharmacy created", body = ApiResponse<PharmacistCreated>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn create_pharmacist(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePharmacistRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PharmacistCreated>>)> {
    ensure_admin(&user)?;
    let resp = auth_service::create_pharmacist(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/admin/create-driver",
    request_body = CreateDriverRequest,
    responses(
        (status = 201, description = "Driver account created", body = ApiResponse<User>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn create_driver(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDriverRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    ensure_admin(&user)?;
    let resp = auth_service::create_driver(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
