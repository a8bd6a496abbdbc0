use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{models::User, services::token_service::TokenPair};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: User,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email_or_phone: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthTokens {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

/// Login either yields a token pair or, for unverified accounts, a prompt to
/// complete OTP verification (a fresh OTP has been sent).
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LoginOutcome {
    Tokens(Box<AuthTokens>),
    VerificationRequired { verified: bool, message: String },
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewPharmacy {
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub opening_hours: String,
    #[serde(default)]
    pub contact_phone: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePharmacistRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub pharmacy: NewPharmacy,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PharmacistCreated {
    pub user: User,
    pub pharmacy: crate::models::Pharmacy,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDriverRequest {
    pub name: String,
    pub phone: String,
    pub password: String,
}
