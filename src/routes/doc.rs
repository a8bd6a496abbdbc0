use axum::{Router, response::Html, routing::get};
use utoipa::{
    Modify, OpenApi,
    openapi::{
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::Scalar;

use crate::state::AppState;

use crate::{
    domain::status::{DeliveryStatus, OrderStatus, PaymentStatus},
    dto::{auth, deliveries, orders, pharmacies, users},
    models::{CartEntry, Delivery, InventoryItem, Medicine, Order, OrderItem, Pharmacy, User},
    response::{ApiResponse, Meta},
    routes::{
        auth as auth_routes, driver, health, medicines, orders as order_routes, params, payments,
        pharmacies as pharmacy_routes, pharmacist, users as user_routes,
    },
    services::{medicine_service::MedicineList, token_service::TokenPair},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth_routes::register,
        auth_routes::verify_otp,
        auth_routes::login,
        auth_routes::refresh,
        auth_routes::logout,
        auth_routes::me,
        auth_routes::create_pharmacist,
        auth_routes::create_driver,
        order_routes::create_order,
        order_routes::list_orders,
        order_routes::get_order,
        order_routes::cancel_order,
        order_routes::rate_order,
        payments::webhook,
        payments::simulate,
        user_routes::get_profile,
        user_routes::update_profile,
        user_routes::get_cart,
        user_routes::put_cart,
        pharmacy_routes::list_pharmacies,
        pharmacy_routes::get_pharmacy,
        pharmacy_routes::list_inventory,
        medicines::search,
        medicines::get_medicine,
        pharmacist::me,
        pharmacist::list_orders,
        pharmacist::get_order,
        pharmacist::accept_order,
        pharmacist::decline_order,
        pharmacist::mark_prepared,
        pharmacist::list_inventory,
        pharmacist::add_inventory,
        pharmacist::update_inventory,
        pharmacist::delete_inventory,
        driver::list_deliveries,
        driver::get_delivery,
        driver::accept_delivery,
        driver::update_status,
        driver::update_location,
        driver::confirm_delivery,
    ),
    components(
        schemas(
            User,
            Pharmacy,
            Medicine,
            InventoryItem,
            Order,
            OrderItem,
            Delivery,
            CartEntry,
            OrderStatus,
            DeliveryStatus,
            PaymentStatus,
            TokenPair,
            MedicineList,
            auth::RegisterRequest,
            auth::RegisterResponse,
            auth::VerifyOtpRequest,
            auth::LoginRequest,
            auth::AuthTokens,
            auth::LoginOutcome,
            auth::RefreshRequest,
            auth::LogoutRequest,
            auth::NewPharmacy,
            auth::CreatePharmacistRequest,
            auth::PharmacistCreated,
            auth::CreateDriverRequest,
            orders::NewOrderItem,
            orders::CreateOrderRequest,
            orders::OrderView,
            orders::OrderList,
            orders::CancelOrderRequest,
            orders::RateOrderRequest,
            orders::PaymentWebhookRequest,
            orders::SimulatePaymentRequest,
            users::UpdateProfileRequest,
            users::UpdateCartRequest,
            users::CartView,
            pharmacies::NearbyPharmacy,
            pharmacies::PharmacyList,
            pharmacies::StockRow,
            pharmacies::StockList,
            pharmacies::AddInventoryRequest,
            pharmacies::UpdateInventoryRequest,
            pharmacies::InventoryList,
            pharmacies::PharmacistProfile,
            pharmacies::DeclineOrderRequest,
            deliveries::DeliveryList,
            deliveries::DeliveryDetail,
            deliveries::OrderSummary,
            deliveries::DeliveryStatusUpdate,
            deliveries::LocationUpdate,
            deliveries::ConfirmDeliveryRequest,
            params::Pagination,
            health::HealthData,
            Meta,
            ApiResponse<User>,
            ApiResponse<Order>,
            ApiResponse<Delivery>,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Registration, OTP verification, sessions and provisioning"),
        (name = "Orders", description = "Customer orders"),
        (name = "Payments", description = "Payment webhook intake"),
        (name = "Users", description = "Profile and cart"),
        (name = "Pharmacies", description = "Pharmacy browsing"),
        (name = "Medicines", description = "Catalog search"),
        (name = "Pharmacist", description = "Pharmacist gateway"),
        (name = "Driver", description = "Driver gateway"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut OpenApiSpec) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn scalar_docs() -> Router<AppState> {
    let scalar = Scalar::new(ApiDoc::openapi());
    Router::new().route("/docs", get(move || async move { Html(scalar.to_html()) }))
}
