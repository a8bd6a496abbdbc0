use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewOrderItem {
    pub medicine_id: Uuid,
    pub pharmacy_id: Uuid,
    pub qty: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Value,
}

/// Customer-facing order view. The delivery OTP is only ever serialized
/// here, never on the shared [`Order`] model.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub otp_for_delivery: String,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let otp_for_delivery = order.delivery_otp.clone();
        Self {
            order,
            otp_for_delivery,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateOrderRequest {
    pub rating: i32,
    pub review: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentWebhookRequest {
    pub order_id: Uuid,
    pub payment_status: String,
    pub transaction_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SimulatePaymentRequest {
    pub order_id: Uuid,
}
