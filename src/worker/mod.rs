//! Event processor: consumes lifecycle and inventory events and performs the
//! side-effect fan-out (notifications, stock monitoring, re-index signals).

use std::sync::Arc;

use anyhow::Result;

use crate::{bus, state::AppState};

pub mod deliveries;
pub mod inventory;
pub mod notify;
pub mod orders;

pub fn handlers() -> [(&'static str, bus::Handler); 6] {
    [
        ("orders.created", orders::order_created),
        ("orders.paid", orders::order_paid),
        ("orders.cancelled", orders::order_cancelled),
        ("deliveries.created", deliveries::delivery_created),
        ("deliveries.updated", deliveries::delivery_updated),
        ("inventory.updated", inventory::inventory_updated),
    ]
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    bus::run_consumers(state, &handlers()).await
}
