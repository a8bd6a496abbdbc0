//! Redis-backed auxiliary state: OTP records, the refresh-token live set,
//! inventory reservation locks, rate-limit counters and the search cache.
//!
//! Key layout:
//! - `otp:<phone>`                      OTP record, TTL 300 s (60 s once used)
//! - `refresh_token:<jti>`              live-set member, TTL = refresh lifetime
//! - `inventory_lock:<pharmacy>_<med>`  reservation lock, TTL 30 s
//! - `rl:<subject>:<endpoint>`          fixed-window counter
//! - `search:<digest>`                  cached search result, TTL 180 s

use anyhow::Result;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub const OTP_TTL_SECS: u64 = 300;
pub const OTP_USED_RETENTION_SECS: u64 = 60;
pub const LOCK_TTL_SECS: u64 = 30;
pub const SEARCH_CACHE_TTL_SECS: u64 = 180;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub otp: String,
    pub created_at: DateTime<Utc>,
    pub used: bool,
}

#[derive(Clone)]
pub struct KvStore {
    conn: ConnectionManager,
}

impl KvStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to key-value store");
        Ok(Self { conn })
    }

    // -- OTP records --------------------------------------------------------

    pub async fn put_otp(&self, phone: &str, record: &OtpRecord) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(record).expect("otp record serializes");
        conn.set_ex::<_, _, ()>(format!("otp:{phone}"), payload, OTP_TTL_SECS)
            .await
    }

    pub async fn get_otp(&self, phone: &str) -> Result<Option<OtpRecord>, redis::RedisError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(format!("otp:{phone}")).await?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Mark an OTP consumed. The record is kept briefly so a replayed
    /// verification inside the retention window still fails as "used".
    pub async fn mark_otp_used(
        &self,
        phone: &str,
        record: &OtpRecord,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        let used = OtpRecord {
            used: true,
            ..record.clone()
        };
        let payload = serde_json::to_string(&used).expect("otp record serializes");
        conn.set_ex::<_, _, ()>(format!("otp:{phone}"), payload, OTP_USED_RETENTION_SECS)
            .await
    }

    // -- Refresh-token live set ---------------------------------------------

    pub async fn register_refresh_token(
        &self,
        jti: Uuid,
        ttl_secs: u64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(format!("refresh_token:{jti}"), 1u8, ttl_secs)
            .await
    }

    pub async fn refresh_token_is_live(&self, jti: Uuid) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.exists(format!("refresh_token:{jti}")).await
    }

    pub async fn revoke_refresh_token(&self, jti: Uuid) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("refresh_token:{jti}")).await
    }

    // -- Reservation locks --------------------------------------------------

    /// Set-if-absent lock acquisition. Returns false when the lock is held.
    pub async fn acquire_lock(
        &self,
        pharmacy_id: Uuid,
        medicine_id: Uuid,
    ) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(lock_key(pharmacy_id, medicine_id))
            .arg(1u8)
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    pub async fn release_lock(
        &self,
        pharmacy_id: Uuid,
        medicine_id: Uuid,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(lock_key(pharmacy_id, medicine_id)).await
    }

    // -- Rate-limit counters ------------------------------------------------

    /// Atomic increment-and-read of a fixed-window counter. The window TTL is
    /// armed when the counter is created.
    pub async fn bump_rate_counter(
        &self,
        subject: &str,
        endpoint: &str,
        window_secs: i64,
    ) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        let key = format!("rl:{subject}:{endpoint}");
        let count: i64 = conn.incr(&key, 1i64).await?;
        if count == 1 {
            conn.expire::<_, ()>(&key, window_secs).await?;
        }
        Ok(count)
    }

    // -- Search cache -------------------------------------------------------

    pub async fn cache_get(&self, digest: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.get(format!("search:{digest}")).await
    }

    pub async fn cache_put(&self, digest: &str, payload: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(format!("search:{digest}"), payload, SEARCH_CACHE_TTL_SECS)
            .await
    }
}

fn lock_key(pharmacy_id: Uuid, medicine_id: Uuid) -> String {
    format!("inventory_lock:{pharmacy_id}_{medicine_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_pharmacy_underscore_medicine() {
        let p = Uuid::nil();
        let m = Uuid::nil();
        assert_eq!(
            lock_key(p, m),
            "inventory_lock:00000000-0000-0000-0000-000000000000_00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn otp_record_round_trips() {
        let rec = OtpRecord {
            otp: "123456".into(),
            created_at: Utc::now(),
            used: false,
        };
        let json = serde_json::to_string(&rec).unwrap();
        let back: OtpRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.otp, rec.otp);
        assert!(!back.used);
    }
}
