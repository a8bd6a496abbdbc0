//! Fixed-window rate limiting on the key-value store.
//!
//! Counters live under `rl:<subject>:<endpoint>`. When the store is
//! unreachable the limiter fails open: the request is allowed and the
//! incident logged.

use axum::http::HeaderMap;
use tracing::warn;

use crate::{error::AppResult, state::AppState};

pub struct RateLimit {
    pub endpoint: &'static str,
    pub max: i64,
    pub window_secs: i64,
}

pub const LOGIN: RateLimit = RateLimit {
    endpoint: "login",
    max: 5,
    window_secs: 60,
};

pub const OTP: RateLimit = RateLimit {
    endpoint: "otp",
    max: 3,
    window_secs: 60,
};

pub const REGISTER: RateLimit = RateLimit {
    endpoint: "register",
    max: 5,
    window_secs: 300,
};

pub async fn enforce(state: &AppState, subject: &str, limit: &RateLimit) -> AppResult<()> {
    match state
        .kv
        .bump_rate_counter(subject, limit.endpoint, limit.window_secs)
        .await
    {
        Ok(count) if count > limit.max => Err(crate::error::AppError::RateLimited),
        Ok(_) => Ok(()),
        Err(err) => {
            warn!(error = %err, endpoint = limit.endpoint, "rate limiter unavailable, failing open");
            Ok(())
        }
    }
}

/// Best-effort client identity for rate limiting: first hop of
/// X-Forwarded-For, then X-Real-IP, then a shared bucket.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers), "198.51.100.2");
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
