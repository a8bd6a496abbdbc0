//! Inventory coordinator: reservation, release and commit of stock against a
//! `(pharmacy, medicine, batch)` key.
//!
//! Two independent layers guard every reservation: a distributed lock on
//! `(pharmacy, medicine)` serializing the read-pick-write critical section,
//! and a conditional `available_qty >= qty` update that holds even if the
//! lock TTL expires mid-flight.

use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    events::InventoryUpdatedEvent,
    kv::KvStore,
    models::{InventoryItem, OrderItem},
    state::AppState,
};

/// A single reserved line: the chosen batch and the price captured from it.
#[derive(Debug, Clone)]
pub struct ReservedLine {
    pub medicine_id: Uuid,
    pub batch_no: String,
    pub qty: i32,
    pub unit_price: i64,
}

/// Bounded wait for the reservation lock. Critical sections are a handful of
/// queries, so contending checkouts queue briefly instead of bouncing.
const LOCK_RETRY_ATTEMPTS: u32 = 20;
const LOCK_RETRY_DELAY_MS: u64 = 50;

async fn acquire_with_retry(
    state: &AppState,
    pharmacy_id: Uuid,
    medicine_id: Uuid,
) -> AppResult<bool> {
    for attempt in 0..LOCK_RETRY_ATTEMPTS {
        if state.kv.acquire_lock(pharmacy_id, medicine_id).await? {
            return Ok(true);
        }
        if attempt + 1 < LOCK_RETRY_ATTEMPTS {
            tokio::time::sleep(std::time::Duration::from_millis(LOCK_RETRY_DELAY_MS)).await;
        }
    }
    Ok(false)
}

/// Holds an acquired reservation lock. The critical section awaits
/// [`LockGuard::release`] on every completed path; if the enclosing future is
/// dropped mid-section instead (client disconnect, request timeout), `Drop`
/// spawns a best-effort release so the lock does not sit out its full TTL.
struct LockGuard {
    kv: KvStore,
    pharmacy_id: Uuid,
    medicine_id: Uuid,
    released: bool,
}

impl LockGuard {
    fn new(kv: KvStore, pharmacy_id: Uuid, medicine_id: Uuid) -> Self {
        Self {
            kv,
            pharmacy_id,
            medicine_id,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        if let Err(err) = self.kv.release_lock(self.pharmacy_id, self.medicine_id).await {
            // The lock still expires via its TTL; reservation correctness is
            // preserved by the conditional update.
            warn!(
                error = %err,
                pharmacy_id = %self.pharmacy_id,
                medicine_id = %self.medicine_id,
                "failed to release inventory lock"
            );
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let kv = self.kv.clone();
        let (pharmacy_id, medicine_id) = (self.pharmacy_id, self.medicine_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = kv.release_lock(pharmacy_id, medicine_id).await {
                    warn!(
                        error = %err,
                        %pharmacy_id,
                        %medicine_id,
                        "failed to release inventory lock on drop"
                    );
                }
            });
        }
    }
}

/// Reserve `qty` units of a medicine at a pharmacy. The lock is released on
/// every exit path, including cancellation of the in-flight future.
pub async fn reserve(
    state: &AppState,
    pharmacy_id: Uuid,
    medicine_id: Uuid,
    qty: i32,
) -> AppResult<ReservedLine> {
    // Lock-store unavailability fails closed: no stock is touched blind.
    if !acquire_with_retry(state, pharmacy_id, medicine_id).await? {
        return Err(AppError::InventoryLocked);
    }

    let guard = LockGuard::new(state.kv.clone(), pharmacy_id, medicine_id);
    let outcome = reserve_locked(state, pharmacy_id, medicine_id, qty).await;
    guard.release().await;

    outcome
}

async fn reserve_locked(
    state: &AppState,
    pharmacy_id: Uuid,
    medicine_id: Uuid,
    qty: i32,
) -> AppResult<ReservedLine> {
    // Earliest-expiry batch that can cover the line (FIFO by expiry).
    let batch: Option<InventoryItem> = sqlx::query_as(
        r#"
        SELECT * FROM inventory
        WHERE pharmacy_id = $1
          AND medicine_id = $2
          AND expiry_date > CURRENT_DATE
          AND available_qty >= $3
        ORDER BY expiry_date ASC
        LIMIT 1
        "#,
    )
    .bind(pharmacy_id)
    .bind(medicine_id)
    .bind(qty)
    .fetch_optional(&state.pool)
    .await?;

    let batch = batch.ok_or(AppError::InsufficientStock {
        medicine_id,
        requested: qty,
    })?;

    let moved = sqlx::query(
        r#"
        UPDATE inventory
        SET available_qty = available_qty - $2,
            reserved_qty = reserved_qty + $2
        WHERE id = $1 AND available_qty >= $2
        "#,
    )
    .bind(batch.id)
    .bind(qty)
    .execute(&state.pool)
    .await?;

    if moved.rows_affected() == 0 {
        return Err(AppError::InsufficientStock {
            medicine_id,
            requested: qty,
        });
    }

    Ok(ReservedLine {
        medicine_id,
        batch_no: batch.batch_no,
        qty,
        unit_price: batch.selling_price,
    })
}

/// Return reserved units to availability. Keyed by the batch captured at
/// reservation time; never touches a different batch.
pub async fn release(state: &AppState, pharmacy_id: Uuid, line: &OrderItem) -> AppResult<()> {
    let released = sqlx::query(
        r#"
        UPDATE inventory
        SET available_qty = available_qty + $4,
            reserved_qty = reserved_qty - $4
        WHERE pharmacy_id = $1 AND medicine_id = $2 AND batch_no = $3
          AND reserved_qty >= $4
        "#,
    )
    .bind(pharmacy_id)
    .bind(line.medicine_id)
    .bind(&line.batch_no)
    .bind(line.qty)
    .execute(&state.pool)
    .await?;

    if released.rows_affected() == 0 {
        warn!(
            %pharmacy_id,
            medicine_id = %line.medicine_id,
            batch_no = %line.batch_no,
            "release found nothing reserved, skipping"
        );
    }
    Ok(())
}

pub async fn release_lines(state: &AppState, pharmacy_id: Uuid, lines: &[OrderItem]) {
    for line in lines {
        if let Err(err) = release(state, pharmacy_id, line).await {
            tracing::error!(
                error = %err,
                medicine_id = %line.medicine_id,
                "failed to release reservation"
            );
        }
    }
}

/// Destroy reserved units on successful delivery. The `reserved_qty >= qty`
/// guard turns a commit that races a completed cancellation into a no-op.
pub async fn commit(state: &AppState, pharmacy_id: Uuid, line: &OrderItem) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE inventory
        SET reserved_qty = reserved_qty - $4
        WHERE pharmacy_id = $1 AND medicine_id = $2 AND batch_no = $3
          AND reserved_qty >= $4
        "#,
    )
    .bind(pharmacy_id)
    .bind(line.medicine_id)
    .bind(&line.batch_no)
    .bind(line.qty)
    .execute(&state.pool)
    .await?;

    // Re-index and stock monitoring ride on this event; a publish failure is
    // logged, never surfaced to the delivery flow.
    let event = InventoryUpdatedEvent {
        pharmacy_id,
        medicine_id: line.medicine_id,
    };
    if let Err(err) = state.bus.publish(&event).await {
        tracing::error!(error = %err, medicine_id = %line.medicine_id, "inventory.updated publish failed");
    }
    Ok(())
}

pub async fn commit_lines(state: &AppState, pharmacy_id: Uuid, lines: &[OrderItem]) -> AppResult<()> {
    for line in lines {
        commit(state, pharmacy_id, line).await?;
    }
    Ok(())
}
