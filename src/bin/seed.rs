//! Dev seed: an admin, a pharmacist with a pharmacy, a driver, a small
//! medicine catalog and stocked batches.

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use medassist_api::{config::AppConfig, db::create_pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@medassist.dev", "+10000000001", "Admin", "admin123admin", &["admin"]).await?;
    let pharmacist_id = ensure_user(
        &pool,
        "pharmacist@medassist.dev",
        "+10000000002",
        "Asha Pharmacist",
        "pharma123456",
        &["pharmacist"],
    )
    .await?;
    let driver_id = ensure_user(
        &pool,
        "driver0001@medassist.internal",
        "+10000000003",
        "Dev Driver",
        "driver123456",
        &["driver"],
    )
    .await?;

    let pharmacy_id = ensure_pharmacy(&pool, pharmacist_id).await?;
    let medicine_id = ensure_medicine(&pool).await?;
    ensure_stock(&pool, pharmacy_id, medicine_id).await?;

    println!(
        "Seed completed. Admin: {admin_id}, Pharmacist: {pharmacist_id}, Driver: {driver_id}, Pharmacy: {pharmacy_id}, Medicine: {medicine_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    phone: &str,
    name: &str,
    password: &str,
    roles: &[&str],
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, phone, name, password_hash, roles, is_verified)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        ON CONFLICT (email) DO UPDATE SET roles = EXCLUDED.roles
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(phone)
    .bind(name)
    .bind(password_hash)
    .bind(&roles)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn ensure_pharmacy(pool: &sqlx::PgPool, pharmacist_id: Uuid) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM pharmacies WHERE pharmacist_user_id = $1")
            .bind(pharmacist_id)
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO pharmacies
            (id, pharmacist_user_id, name, address, lat, lon, opening_hours, contact_phone)
        VALUES ($1, $2, 'City Care Pharmacy', '12 Hill Road, Bandra', 19.0760, 72.8777,
                '09:00-22:00', '+912226400000')
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(pharmacist_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_medicine(pool: &sqlx::PgPool) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM medicines WHERE name = 'Paracetamol 500mg'")
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO medicines
            (id, name, brand, generic_name, salt, dosage_form, strength,
             requires_prescription, tags, synonyms, manufacturer)
        VALUES ($1, 'Paracetamol 500mg', 'Calpol', 'Paracetamol', 'Acetaminophen',
                'tablet', '500mg', FALSE, '{fever,pain}', '{crocin,acetaminophen}', 'GSK')
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_stock(
    pool: &sqlx::PgPool,
    pharmacy_id: Uuid,
    medicine_id: Uuid,
) -> anyhow::Result<()> {
    let expiry = (Utc::now() + Duration::days(365)).date_naive();
    sqlx::query(
        r#"
        INSERT INTO inventory
            (id, pharmacy_id, medicine_id, batch_no, expiry_date, available_qty,
             reserved_qty, mrp, selling_price)
        VALUES ($1, $2, $3, 'B2026-01', $4, 100, 0, 2500, 2200)
        ON CONFLICT (pharmacy_id, medicine_id, batch_no) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(pharmacy_id)
    .bind(medicine_id)
    .bind(expiry)
    .execute(pool)
    .await?;
    Ok(())
}
