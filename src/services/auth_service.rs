use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::Utc;
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::{
    dto::auth::{
        AuthTokens, CreateDriverRequest, CreatePharmacistRequest, LoginOutcome, LoginRequest,
        PharmacistCreated, RegisterRequest, RegisterResponse, VerifyOtpRequest,
    },
    error::{AppError, AppResult},
    kv::OtpRecord,
    mask::masked,
    models::{Pharmacy, User},
    response::{ApiResponse, Meta},
    services::token_service::{self, MintedPair},
    state::AppState,
};

/// Normalize a phone number: strip whitespace, dashes and parentheses, and
/// prepend `+` to bare numbers longer than ten digits.
pub fn normalize_phone(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if !cleaned.starts_with('+') && cleaned.len() > 10 {
        format!("+{cleaned}")
    } else {
        cleaned
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::MissingField("name"));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("invalid email address".into()));
    }
    if payload.password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

async fn send_otp(state: &AppState, phone: &str) -> AppResult<()> {
    let record = OtpRecord {
        otp: crate::otp::generate(),
        created_at: Utc::now(),
        used: false,
    };
    state.kv.put_otp(phone, &record).await?;
    // Delivery transport (SMS) is outside the control plane; the issued code
    // only ever appears masked.
    tracing::info!(phone = %masked(phone), otp = %masked(&record.otp), "OTP issued");
    Ok(())
}

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<RegisterResponse>> {
    validate_registration(&payload)?;
    let email = payload.email.trim().to_lowercase();
    let phone = normalize_phone(&payload.phone);

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 OR phone = $2")
            .bind(&email)
            .bind(&phone)
            .fetch_optional(&state.pool)
            .await?;
    if existing.is_some() {
        return Err(AppError::UserExists);
    }

    let password_hash = hash_password(&payload.password)?;
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, phone, name, password_hash, roles, is_verified)
        VALUES ($1, $2, $3, $4, $5, '{customer}', FALSE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&phone)
    .bind(payload.name.trim())
    .bind(&password_hash)
    .fetch_one(&state.pool)
    .await?;

    send_otp(state, &phone).await?;

    let message = format!("Verification code sent to {}", masked(&phone));
    Ok(ApiResponse::success(
        "Registered",
        RegisterResponse { user, message },
        None,
    ))
}

/// Mint a token pair and register the refresh token in the live set. A
/// live-set write failure fails the whole login: a refresh token outside the
/// live set could never be redeemed.
async fn open_session(state: &AppState, user: &User) -> AppResult<MintedPair> {
    let minted = token_service::issue_pair(&state.config, user.id, &user.roles)?;
    state
        .kv
        .register_refresh_token(minted.refresh_jti, state.config.refresh_token_ttl_secs as u64)
        .await?;
    Ok(minted)
}

pub async fn verify_otp(
    state: &AppState,
    payload: VerifyOtpRequest,
) -> AppResult<ApiResponse<AuthTokens>> {
    let phone = normalize_phone(&payload.phone);
    let record = state
        .kv
        .get_otp(&phone)
        .await?
        .ok_or(AppError::OtpInvalid)?;

    if record.used || record.otp != payload.otp {
        return Err(AppError::OtpInvalid);
    }
    state.kv.mark_otp_used(&phone, &record).await?;

    let user: User = sqlx::query_as(
        "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE phone = $1 RETURNING *",
    )
    .bind(&phone)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::UserNotFound)?;

    let minted = open_session(state, &user).await?;
    tracing::info!(user_id = %user.id, phone = %masked(&phone), "phone verified");

    Ok(ApiResponse::success(
        "Verified",
        AuthTokens {
            tokens: minted.pair,
            user,
        },
        None,
    ))
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginOutcome>> {
    let identity = payload.email_or_phone.trim();
    let user: Option<User> = if identity.contains('@') {
        sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(identity.to_lowercase())
            .fetch_optional(&state.pool)
            .await?
    } else {
        sqlx::query_as("SELECT * FROM users WHERE phone = $1")
            .bind(normalize_phone(identity))
            .fetch_optional(&state.pool)
            .await?
    };

    // Unknown account and wrong password take the same path so responses
    // cannot be used for account enumeration.
    let user = match user {
        Some(u) if verify_password(&payload.password, &u.password_hash) => u,
        _ => return Err(AppError::InvalidCredentials),
    };

    if !user.is_verified {
        send_otp(state, &user.phone).await?;
        return Ok(ApiResponse::success(
            "Verification required",
            LoginOutcome::VerificationRequired {
                verified: false,
                message: format!("Verification code sent to {}", masked(&user.phone)),
            },
            None,
        ));
    }

    let minted = open_session(state, &user).await?;
    tracing::info!(user_id = %user.id, "login");

    Ok(ApiResponse::success(
        "Logged in",
        LoginOutcome::Tokens(Box::new(AuthTokens {
            tokens: minted.pair,
            user,
        })),
        None,
    ))
}

pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<ApiResponse<AuthTokens>> {
    let claims = token_service::verify_refresh(&state.config, refresh_token)?;
    let jti = Uuid::parse_str(&claims.jti).map_err(|_| AppError::TokenInvalid)?;

    // Revoked (or already rotated) tokens are absent from the live set.
    if !state.kv.refresh_token_is_live(jti).await? {
        return Err(AppError::TokenInvalid);
    }

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalid)?;
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::TokenInvalid)?;

    // Rotate: the old identifier leaves the live set before the new pair is
    // registered, so a replayed token fails from this point on.
    state.kv.revoke_refresh_token(jti).await?;
    let minted = open_session(state, &user).await?;

    Ok(ApiResponse::success(
        "Refreshed",
        AuthTokens {
            tokens: minted.pair,
            user,
        },
        None,
    ))
}

pub async fn logout(state: &AppState, refresh_token: Option<&str>) -> AppResult<()> {
    let Some(token) = refresh_token else {
        return Ok(());
    };
    let Ok(claims) = token_service::verify_refresh(&state.config, token) else {
        return Ok(());
    };
    if let Ok(jti) = Uuid::parse_str(&claims.jti) {
        if let Err(err) = state.kv.revoke_refresh_token(jti).await {
            tracing::warn!(error = %err, "logout revocation failed");
        }
    }
    Ok(())
}

pub async fn me(state: &AppState, user_id: Uuid) -> AppResult<ApiResponse<User>> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(ApiResponse::success("OK", user, None))
}

/// Admin provisioning: the pharmacist account and its pharmacy are created in
/// one transaction. Provisioned accounts start verified.
pub async fn create_pharmacist(
    state: &AppState,
    payload: CreatePharmacistRequest,
) -> AppResult<ApiResponse<PharmacistCreated>> {
    let email = payload.email.trim().to_lowercase();
    let phone = normalize_phone(&payload.phone);
    if payload.password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 OR phone = $2")
            .bind(&email)
            .bind(&phone)
            .fetch_optional(&state.pool)
            .await?;
    if existing.is_some() {
        return Err(AppError::UserExists);
    }

    let password_hash = hash_password(&payload.password)?;
    let mut txn = state.pool.begin().await?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, phone, name, password_hash, roles, is_verified)
        VALUES ($1, $2, $3, $4, $5, '{pharmacist}', TRUE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&phone)
    .bind(payload.name.trim())
    .bind(&password_hash)
    .fetch_one(&mut *txn)
    .await?;

    let pharmacy: Pharmacy = sqlx::query_as(
        r#"
        INSERT INTO pharmacies
            (id, pharmacist_user_id, name, address, lat, lon, opening_hours, contact_phone)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(payload.pharmacy.name.trim())
    .bind(payload.pharmacy.address.trim())
    .bind(payload.pharmacy.lat)
    .bind(payload.pharmacy.lon)
    .bind(&payload.pharmacy.opening_hours)
    .bind(&payload.pharmacy.contact_phone)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;
    tracing::info!(user_id = %user.id, pharmacy_id = %pharmacy.id, "pharmacist provisioned");

    Ok(ApiResponse::success(
        "Pharmacist created",
        PharmacistCreated { user, pharmacy },
        Some(Meta::empty()),
    ))
}

/// Drivers get an internal email minted from a zero-padded monotonic index.
pub async fn create_driver(
    state: &AppState,
    payload: CreateDriverRequest,
) -> AppResult<ApiResponse<User>> {
    let phone = normalize_phone(&payload.phone);
    if payload.password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE phone = $1")
        .bind(&phone)
        .fetch_optional(&state.pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::UserExists);
    }

    let (index,): (i64,) = sqlx::query_as("SELECT nextval('driver_seq')")
        .fetch_one(&state.pool)
        .await?;
    let email = format!("driver{index:04}@medassist.internal");

    let password_hash = hash_password(&payload.password)?;
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, phone, name, password_hash, roles, is_verified)
        VALUES ($1, $2, $3, $4, $5, '{driver}', TRUE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&phone)
    .bind(payload.name.trim())
    .bind(&password_hash)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %user.id, "driver provisioned");
    Ok(ApiResponse::success("Driver created", user, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("+91 98765-43210"), "+919876543210");
        assert_eq!(normalize_phone("(919) 876-54321"), "+91987654321");
        assert_eq!(normalize_phone("9876543210"), "9876543210");
        assert_eq!(normalize_phone("+14155552671"), "+14155552671");
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("securePass123").unwrap();
        assert!(verify_password("securePass123", &hash));
        assert!(!verify_password("wrongPass123", &hash));
        assert!(!verify_password("securePass123", "not-a-phc-string"));
    }
}
