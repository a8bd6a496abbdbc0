//! Access/refresh token minting and verification.
//!
//! Both token types are HS256-signed and carry issuer, audience, a random
//! `jti` and a declared type. Access tokens are verified stateless; refresh
//! tokens additionally require live-set membership (see auth_service).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<String>,
    pub jti: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

pub struct MintedPair {
    pub pair: TokenPair,
    pub refresh_jti: Uuid,
}

pub fn issue_pair(config: &AppConfig, user_id: Uuid, roles: &[String]) -> AppResult<MintedPair> {
    let (access_token, _) = mint(
        config,
        user_id,
        roles,
        TOKEN_TYPE_ACCESS,
        config.access_token_ttl_secs,
    )?;
    let (refresh_token, refresh_jti) = mint(
        config,
        user_id,
        roles,
        TOKEN_TYPE_REFRESH,
        config.refresh_token_ttl_secs,
    )?;

    Ok(MintedPair {
        pair: TokenPair {
            access_token,
            refresh_token,
            expires_in: config.access_token_ttl_secs,
            token_type: "Bearer".to_string(),
        },
        refresh_jti,
    })
}

fn mint(
    config: &AppConfig,
    user_id: Uuid,
    roles: &[String],
    token_type: &str,
    ttl_secs: i64,
) -> AppResult<(String, Uuid)> {
    let now = Utc::now();
    let jti = Uuid::new_v4();
    let claims = Claims {
        sub: user_id.to_string(),
        roles: roles.to_vec(),
        jti: jti.to_string(),
        token_type: token_type.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))?;

    Ok((token, jti))
}

/// Verify signature, algorithm, issuer, audience and expiry.
pub fn verify(config: &AppConfig, token: &str) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_audience(&[&config.jwt_audience]);

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::TokenInvalid,
    })?;

    Ok(decoded.claims)
}

/// Verify an access token specifically; a refresh token presented as a
/// bearer credential is rejected.
pub fn verify_access(config: &AppConfig, token: &str) -> AppResult<Claims> {
    let claims = verify(config, token)?;
    if claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(AppError::TokenInvalid);
    }
    Ok(claims)
}

/// Verify a refresh token's structure; live-set membership is checked by the
/// caller.
pub fn verify_refresh(config: &AppConfig, token: &str) -> AppResult<Claims> {
    let claims = verify(config, token)?;
    if claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(AppError::TokenInvalid);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            redis_url: String::new(),
            amqp_url: String::new(),
            host: String::new(),
            port: 0,
            jwt_secret: "unit-test-secret-0123456789abcdefghij".to_string(),
            jwt_issuer: "medassist-auth".to_string(),
            jwt_audience: "medassist-services".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 2_592_000,
            cors_origin: String::new(),
            production: false,
        }
    }

    #[test]
    fn pair_round_trips_with_distinct_types() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let roles = vec!["customer".to_string()];
        let minted = issue_pair(&config, user_id, &roles).unwrap();

        let access = verify_access(&config, &minted.pair.access_token).unwrap();
        assert_eq!(access.sub, user_id.to_string());
        assert_eq!(access.roles, roles);
        assert_eq!(access.token_type, TOKEN_TYPE_ACCESS);

        let refresh = verify_refresh(&config, &minted.pair.refresh_token).unwrap();
        assert_eq!(refresh.token_type, TOKEN_TYPE_REFRESH);
        assert_eq!(refresh.jti, minted.refresh_jti.to_string());
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn access_check_rejects_refresh_token() {
        let config = test_config();
        let minted = issue_pair(&config, Uuid::new_v4(), &["customer".to_string()]).unwrap();
        let err = verify_access(&config, &minted.pair.refresh_token).unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_INVALID");
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_audience = "someone-else".to_string();
        let minted = issue_pair(&other, Uuid::new_v4(), &[]).unwrap();
        let err = verify(&config, &minted.pair.access_token).unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_INVALID");
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let config = test_config();
        let minted = issue_pair(&config, Uuid::new_v4(), &[]).unwrap();
        let mut token = minted.pair.access_token;
        token.pop();
        token.push('x');
        assert!(verify(&config, &token).is_err());
    }
}
