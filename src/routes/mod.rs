use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod doc;
pub mod driver;
pub mod health;
pub mod medicines;
pub mod orders;
pub mod params;
pub mod payments;
pub mod pharmacies;
pub mod pharmacist;
pub mod users;

// Build the API router without binding state; it is provided at the top
// level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/orders", orders::router())
        .nest("/payment", payments::router())
        .nest("/users", users::router())
        .nest("/pharmacies", pharmacies::router())
        .nest("/medicines", medicines::router())
        .nest("/pharmacist", pharmacist::router())
        .nest("/driver", driver::router())
}
