//! Shared harness for integration flows. Tests run against real backing
//! services and skip when the environment does not provide them.
#![allow(dead_code)]

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use medassist_api::{
    bus::EventBus,
    config::AppConfig,
    db::create_pool,
    kv::KvStore,
    middleware::auth::AuthUser,
    state::AppState,
};

/// Build an [`AppState`] against TEST_* services, or `None` to skip the test.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let (Ok(database_url), Ok(redis_url), Ok(amqp_url)) = (
        std::env::var("TEST_DATABASE_URL"),
        std::env::var("TEST_REDIS_URL"),
        std::env::var("TEST_AMQP_URL"),
    ) else {
        eprintln!(
            "Skipping test: set TEST_DATABASE_URL, TEST_REDIS_URL and TEST_AMQP_URL to run integration flows."
        );
        return Ok(None);
    };

    let mut config = AppConfig::from_env()?;
    config.database_url = database_url;
    config.redis_url = redis_url;
    config.amqp_url = amqp_url;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let kv = KvStore::connect(&config.redis_url).await?;
    let bus = EventBus::connect(&config.amqp_url).await?;

    Ok(Some(AppState {
        pool,
        kv,
        bus,
        config,
    }))
}

/// Tests share one database and run in parallel, so every identity is
/// unique per invocation instead of truncating between runs.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// A fresh E.164-shaped phone number.
pub fn unique_phone() -> String {
    let digits = Uuid::new_v4().as_u128() % 10_000_000_000;
    format!("+91{digits:010}")
}

pub fn password_hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

pub async fn create_user(
    state: &AppState,
    email: &str,
    phone: &str,
    roles: &[&str],
    verified: bool,
) -> anyhow::Result<Uuid> {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, phone, name, password_hash, roles, is_verified)
        VALUES ($1, $2, $3, 'Test User', $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(phone)
    .bind(password_hash("testPass1234"))
    .bind(&roles)
    .bind(verified)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn create_pharmacy(state: &AppState, pharmacist_id: Uuid) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO pharmacies (id, pharmacist_user_id, name, address, lat, lon)
        VALUES ($1, $2, 'Test Pharmacy', '1 Test Street', 19.0760, 72.8777)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(pharmacist_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn create_medicine(state: &AppState, name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO medicines (id, name, brand, generic_name, synonyms)
        VALUES ($1, $2, 'TestBrand', $2, '{}')
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn create_batch(
    state: &AppState,
    pharmacy_id: Uuid,
    medicine_id: Uuid,
    batch_no: &str,
    available: i32,
    selling_price: i64,
) -> anyhow::Result<Uuid> {
    let expiry = (Utc::now() + Duration::days(180)).date_naive();
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO inventory
            (id, pharmacy_id, medicine_id, batch_no, expiry_date, available_qty,
             reserved_qty, mrp, selling_price)
        VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(pharmacy_id)
    .bind(medicine_id)
    .bind(batch_no)
    .bind(expiry)
    .bind(available)
    .bind(selling_price)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub fn auth(user_id: Uuid, role: &str) -> AuthUser {
    AuthUser {
        user_id,
        roles: vec![role.to_string()],
    }
}

pub async fn stock_of(state: &AppState, inventory_id: Uuid) -> anyhow::Result<(i32, i32)> {
    let row: (i32, i32) =
        sqlx::query_as("SELECT available_qty, reserved_qty FROM inventory WHERE id = $1")
            .bind(inventory_id)
            .fetch_one(&state.pool)
            .await?;
    Ok(row)
}
