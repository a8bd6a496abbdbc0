pub mod auth;
pub mod deliveries;
pub mod orders;
pub mod pharmacies;
pub mod users;
