//! Catalog lookups and search. Search results are cached in the key-value
//! store under a digest of the normalized query; cache trouble degrades to a
//! live query, never to an error.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Postgres, QueryBuilder};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    geo::{self, GeoPoint},
    models::{Medicine, Pharmacy},
    response::{ApiResponse, Meta},
    routes::params::SearchQuery,
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MedicineList {
    pub items: Vec<Medicine>,
    pub total: i64,
}

pub async fn get_medicine(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Medicine>> {
    let medicine: Medicine = sqlx::query_as("SELECT * FROM medicines WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound("Medicine"))?;
    Ok(ApiResponse::success("OK", medicine, None))
}

/// Shared WHERE clause for the list and count queries: the term matched
/// against name, brand, generic name, salt and synonyms, optionally narrowed
/// to medicines stocked in the given pharmacies.
fn push_search_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    pattern: &str,
    pharmacy_scope: Option<&[Uuid]>,
) {
    builder
        .push("(m.name ILIKE ")
        .push_bind(pattern.to_owned())
        .push(" OR m.brand ILIKE ")
        .push_bind(pattern.to_owned())
        .push(" OR m.generic_name ILIKE ")
        .push_bind(pattern.to_owned())
        .push(" OR m.salt ILIKE ")
        .push_bind(pattern.to_owned())
        .push(" OR EXISTS (SELECT 1 FROM unnest(m.synonyms) syn WHERE syn ILIKE ")
        .push_bind(pattern.to_owned())
        .push("))");

    if let Some(ids) = pharmacy_scope {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM inventory i \
                 WHERE i.medicine_id = m.id AND i.pharmacy_id = ANY(",
            )
            .push_bind(ids.to_vec())
            .push(") AND i.available_qty > 0 AND i.expiry_date > CURRENT_DATE)");
    }
}

pub async fn search(
    state: &AppState,
    query: SearchQuery,
) -> AppResult<ApiResponse<MedicineList>> {
    let (page, size, offset) = query.pagination.normalize();
    let term = query.q.as_deref().unwrap_or("").trim().to_lowercase();
    if term.is_empty() {
        return Err(AppError::MissingField("q"));
    }

    let digest = cache_digest(&term, query.lat, query.lon, query.radius.as_deref(), page, size);

    match state.kv.cache_get(&digest).await {
        Ok(Some(cached)) => {
            if let Ok(list) = serde_json::from_str::<MedicineList>(&cached) {
                let total = list.total;
                return Ok(ApiResponse::success(
                    "Search results",
                    list,
                    Some(Meta::new(page, size, total)),
                ));
            }
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "search cache read failed"),
    }

    // Optional geo narrowing: only medicines stocked in pharmacies within the
    // radius. Pharmacy counts are small enough to filter in process.
    let pharmacy_scope: Option<Vec<Uuid>> = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => {
            let radius_km = geo::parse_radius_km(query.radius.as_deref());
            let origin = GeoPoint { lat, lon };
            let pharmacies: Vec<Pharmacy> =
                sqlx::query_as("SELECT * FROM pharmacies WHERE is_active")
                    .fetch_all(&state.pool)
                    .await?;
            Some(
                pharmacies
                    .into_iter()
                    .filter(|p| {
                        geo::haversine_km(
                            origin,
                            GeoPoint {
                                lat: p.lat,
                                lon: p.lon,
                            },
                        ) <= radius_km
                    })
                    .map(|p| p.id)
                    .collect(),
            )
        }
        _ => None,
    };

    let pattern = format!("%{term}%");
    let scope = pharmacy_scope.as_deref();

    let mut list_builder = QueryBuilder::new("SELECT m.* FROM medicines m WHERE ");
    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM medicines m WHERE ");
    push_search_filters(&mut list_builder, &pattern, scope);
    push_search_filters(&mut count_builder, &pattern, scope);

    list_builder
        .push(" ORDER BY m.name LIMIT ")
        .push_bind(size)
        .push(" OFFSET ")
        .push_bind(offset);

    let items = list_builder
        .build_query_as::<Medicine>()
        .fetch_all(&state.pool)
        .await?;
    let total: (i64,) = count_builder
        .build_query_as()
        .fetch_one(&state.pool)
        .await?;
    let total = total.0;

    let list = MedicineList { items, total };
    if let Ok(payload) = serde_json::to_string(&list) {
        if let Err(err) = state.kv.cache_put(&digest, &payload).await {
            tracing::warn!(error = %err, "search cache write failed");
        }
    }

    Ok(ApiResponse::success(
        "Search results",
        list,
        Some(Meta::new(page, size, total)),
    ))
}

fn cache_digest(
    term: &str,
    lat: Option<f64>,
    lon: Option<f64>,
    radius: Option<&str>,
    page: i64,
    size: i64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(term.as_bytes());
    hasher.update(format!(
        "|{}|{}|{}|{page}|{size}",
        lat.map(|v| v.to_string()).unwrap_or_default(),
        lon.map(|v| v.to_string()).unwrap_or_default(),
        radius.unwrap_or_default(),
    ));
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_query_sensitive() {
        let a = cache_digest("paracetamol", Some(19.0), Some(72.8), Some("10km"), 1, 20);
        let b = cache_digest("paracetamol", Some(19.0), Some(72.8), Some("10km"), 1, 20);
        let c = cache_digest("ibuprofen", Some(19.0), Some(72.8), Some("10km"), 1, 20);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn filter_sql_narrows_by_pharmacy_only_when_scoped() {
        let mut unscoped = QueryBuilder::new("SELECT m.* FROM medicines m WHERE ");
        push_search_filters(&mut unscoped, "%paracetamol%", None);
        let sql = unscoped.sql().to_string();
        assert!(sql.contains("m.name ILIKE"));
        assert!(sql.contains("unnest(m.synonyms)"));
        assert!(!sql.contains("i.pharmacy_id"));

        let ids = vec![Uuid::new_v4()];
        let mut scoped = QueryBuilder::new("SELECT m.* FROM medicines m WHERE ");
        push_search_filters(&mut scoped, "%paracetamol%", Some(&ids));
        let sql = scoped.sql().to_string();
        assert!(sql.contains("i.pharmacy_id = ANY("));
        assert!(sql.contains("expiry_date > CURRENT_DATE"));
    }
}
