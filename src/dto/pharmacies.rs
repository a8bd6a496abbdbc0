use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{InventoryItem, Pharmacy};

#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyPharmacy {
    #[serde(flatten)]
    pub pharmacy: Pharmacy,
    pub distance_km: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PharmacyList {
    pub items: Vec<NearbyPharmacy>,
}

/// Public inventory row: the batch joined with its catalog entry.
#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct StockRow {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub batch_no: String,
    pub expiry_date: NaiveDate,
    pub available_qty: i32,
    pub mrp: i64,
    pub selling_price: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockList {
    pub items: Vec<StockRow>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddInventoryRequest {
    pub medicine_id: Uuid,
    pub batch_no: String,
    pub expiry_date: NaiveDate,
    pub available_qty: i32,
    pub mrp: i64,
    pub selling_price: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInventoryRequest {
    pub expiry_date: Option<NaiveDate>,
    pub available_qty: Option<i32>,
    pub mrp: Option<i64>,
    pub selling_price: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryList {
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PharmacistProfile {
    pub user: crate::models::User,
    pub pharmacy: Pharmacy,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeclineOrderRequest {
    pub reason: Option<String>,
}
