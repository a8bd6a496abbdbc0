use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub is_verified: bool,
    pub addresses: Value,
    pub cart: Value,
    pub wallet_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Pharmacy {
    pub id: Uuid,
    pub pharmacist_user_id: Uuid,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lon: f64,
    pub is_active: bool,
    pub opening_hours: String,
    pub contact_phone: String,
    pub rating: f64,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub generic_name: String,
    pub salt: String,
    pub dosage_form: String,
    pub strength: String,
    pub requires_prescription: bool,
    pub tags: Vec<String>,
    pub synonyms: Vec<String>,
    pub manufacturer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub medicine_id: Uuid,
    pub batch_no: String,
    pub expiry_date: NaiveDate,
    pub available_qty: i32,
    pub reserved_qty: i32,
    pub mrp: i64,
    pub selling_price: i64,
    pub created_at: DateTime<Utc>,
}

/// One order line, captured at reservation time. Stored inline on the order
/// as jsonb, mirroring how the pharmacy and driver views consume it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub medicine_id: Uuid,
    pub batch_no: String,
    pub qty: i32,
    /// Unit selling price in minor currency units.
    pub unit_price: i64,
    /// Line tax in minor currency units (18% of the line subtotal).
    pub tax: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pharmacy_id: Uuid,
    pub items: Value,
    pub total_amount: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: Value,
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
    /// Surfaced only to the customer, never serialized on shared views.
    #[serde(skip_serializing)]
    pub delivery_otp: String,
    pub delivery_id: Option<Uuid>,
    pub transaction_id: Option<String>,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn line_items(&self) -> Vec<OrderItem> {
        serde_json::from_value(self.items.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: String,
    pub pickup_location: Option<Value>,
    pub delivery_location: Option<Value>,
    pub current_location: Option<Value>,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub pickup_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Cart entry persisted on the user document. Advisory only; checkout prices
/// come from the inventory row chosen at reservation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartEntry {
    pub medicine_id: Uuid,
    pub pharmacy_id: Uuid,
    pub qty: i32,
    pub price_at_add: i64,
}
