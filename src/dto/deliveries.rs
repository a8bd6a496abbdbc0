use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::Delivery;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliveryListQuery {
    #[serde(flatten)]
    pub pagination: crate::routes::params::Pagination,
    pub status: Option<String>,
    /// List unassigned deliveries ready for pickup instead of the driver's
    /// own.
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryList {
    pub items: Vec<Delivery>,
}

/// Delivery detail with a trimmed order summary for the driver.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryDetail {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub order: OrderSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: uuid::Uuid,
    pub total_amount: i64,
    pub status: String,
    pub shipping_address: Value,
    pub items_count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliveryStatusUpdate {
    pub status: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationUpdate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmDeliveryRequest {
    pub otp: String,
}
