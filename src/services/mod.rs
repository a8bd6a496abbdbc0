pub mod auth_service;
pub mod delivery_service;
pub mod inventory_service;
pub mod medicine_service;
pub mod order_service;
pub mod payment_service;
pub mod pharmacy_service;
pub mod token_service;
pub mod user_service;
