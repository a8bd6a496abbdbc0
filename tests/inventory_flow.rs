//! Oversell prevention under concurrency and conservation of
//! available + reserved across the reservation lifecycle.

mod common;

use medassist_api::{
    dto::orders::{CreateOrderRequest, NewOrderItem},
    services::order_service,
};
use serde_json::json;

#[tokio::test]
async fn concurrent_checkouts_never_oversell() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let pharmacist_id = common::create_user(
        &state,
        &common::unique_email("p"),
        &common::unique_phone(),
        &["pharmacist"],
        true,
    )
    .await?;
    let pharmacy_id = common::create_pharmacy(&state, pharmacist_id).await?;
    let medicine_id = common::create_medicine(&state, "Amoxicillin 250mg").await?;
    let inv_id = common::create_batch(&state, pharmacy_id, medicine_id, "B1", 3, 900).await?;

    let mut handles = Vec::new();
    for i in 0..5 {
        let state = state.clone();
        let customer_id = common::create_user(
            &state,
            &common::unique_email(&format!("buyer{i}")),
            &common::unique_phone(),
            &["customer"],
            true,
        )
        .await?;
        handles.push(tokio::spawn(async move {
            let customer = common::auth(customer_id, "customer");
            order_service::create_order(
                &state,
                &customer,
                None,
                CreateOrderRequest {
                    items: vec![NewOrderItem {
                        medicine_id,
                        pharmacy_id,
                        qty: 1,
                    }],
                    shipping_address: json!({"line1": "somewhere"}),
                },
            )
            .await
        }));
    }

    let mut succeeded = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(err) => {
                assert_eq!(err.error_code(), "INSUFFICIENT_STOCK");
                out_of_stock += 1;
            }
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(out_of_stock, 2);

    // available + reserved is conserved by reservations.
    let (available, reserved) = common::stock_of(&state, inv_id).await?;
    assert_eq!(available + reserved, 3);
    assert_eq!(available, 0);
    assert_eq!(reserved, 3);

    Ok(())
}

#[tokio::test]
async fn expired_batches_are_never_picked() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let pharmacist_id = common::create_user(
        &state,
        &common::unique_email("p5"),
        &common::unique_phone(),
        &["pharmacist"],
        true,
    )
    .await?;
    let customer_id = common::create_user(
        &state,
        &common::unique_email("c5"),
        &common::unique_phone(),
        &["customer"],
        true,
    )
    .await?;
    let pharmacy_id = common::create_pharmacy(&state, pharmacist_id).await?;
    let medicine_id = common::create_medicine(&state, "Azithromycin 500mg").await?;

    // Only batch is expired.
    sqlx::query(
        r#"
        INSERT INTO inventory
            (id, pharmacy_id, medicine_id, batch_no, expiry_date, available_qty,
             reserved_qty, mrp, selling_price)
        VALUES ($1, $2, $3, 'OLD', CURRENT_DATE - 1, 50, 0, 1200, 1200)
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .bind(pharmacy_id)
    .bind(medicine_id)
    .execute(&state.pool)
    .await?;

    let customer = common::auth(customer_id, "customer");
    let err = order_service::create_order(
        &state,
        &customer,
        None,
        CreateOrderRequest {
            items: vec![NewOrderItem {
                medicine_id,
                pharmacy_id,
                qty: 1,
            }],
            shipping_address: json!({"line1": "somewhere"}),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_STOCK");

    // A fresh batch with a later expiry is picked only after earlier
    // unexpired ones are exhausted (FIFO by expiry).
    common::create_batch(&state, pharmacy_id, medicine_id, "NEAR", 5, 1000).await?;
    let order = order_service::create_order(
        &state,
        &customer,
        None,
        CreateOrderRequest {
            items: vec![NewOrderItem {
                medicine_id,
                pharmacy_id,
                qty: 2,
            }],
            shipping_address: json!({"line1": "somewhere"}),
        },
    )
    .await?
    .data
    .unwrap();
    let items = order.order.line_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].batch_no, "NEAR");
    assert_eq!(items[0].unit_price, 1000);

    Ok(())
}
