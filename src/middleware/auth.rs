use axum::{extract::FromRequestParts, http::header};
use uuid::Uuid;

use crate::{error::AppError, services::token_service, state::AppState};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Role guard. Admins pass every role check, mirroring the gateway services.
pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.has_role(role) || user.has_role("admin") {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.has_role("admin") {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(AppError::Unauthorized)?;

        let claims = token_service::verify_access(&state.config, &token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id,
            roles: claims.roles,
        })
    }
}

fn bearer_token(parts: &axum::http::request::Parts) -> Option<String> {
    let auth = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Browser clients carry the access token in a cookie set at login.
fn cookie_token(parts: &axum::http::request::Parts) -> Option<String> {
    let cookies = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "access_token" && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str]) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn role_guard_allows_exact_role_and_admin() {
        assert!(ensure_role(&user(&["pharmacist"]), "pharmacist").is_ok());
        assert!(ensure_role(&user(&["admin"]), "pharmacist").is_ok());
        assert!(ensure_role(&user(&["customer"]), "pharmacist").is_err());
    }

    #[test]
    fn admin_guard_requires_admin() {
        assert!(ensure_admin(&user(&["admin"])).is_ok());
        assert!(ensure_admin(&user(&["pharmacist", "driver"])).is_err());
    }
}
