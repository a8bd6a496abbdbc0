use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::orders::{PaymentWebhookRequest, SimulatePaymentRequest},
    error::AppResult,
    models::Order,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/simulate", post(simulate))
}

#[utoipa::path(
    post,
    path = "/api/v1/payment/webhook",
    request_body = PaymentWebhookRequest,
    responses(
        (status = 200, description = "Payment status applied; delivery created on pending -> paid", body = ApiResponse<Order>),
        (status = 404, description = "Unknown order"),
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhookRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = payment_service::handle_webhook(&state, payload).await?;
    Ok(Json(resp))
}

/// Dev-mode stand-in for the provider webhook.
#[utoipa::path(
    post,
    path = "/api/v1/payment/simulate",
    request_body = SimulatePaymentRequest,
    responses((status = 200, description = "Order marked paid", body = ApiResponse<Order>)),
    tag = "Payments"
)]
pub async fn simulate(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePaymentRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = payment_service::simulate(&state, payload.order_id).await?;
    Ok(Json(resp))
}
