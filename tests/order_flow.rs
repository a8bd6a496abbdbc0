//! End-to-end fulfillment: checkout -> pay -> pharmacy accept/prepare ->
//! driver accept -> transit -> OTP-confirmed handoff, plus idempotent replay
//! and the cancellation window.

mod common;

use medassist_api::{
    dto::{
        deliveries::{ConfirmDeliveryRequest, DeliveryStatusUpdate},
        orders::{CancelOrderRequest, CreateOrderRequest, NewOrderItem, PaymentWebhookRequest},
        pharmacies::DeclineOrderRequest,
    },
    services::{delivery_service, order_service, payment_service, pharmacy_service},
};
use serde_json::json;
use uuid::Uuid;

fn order_request(medicine_id: Uuid, pharmacy_id: Uuid, qty: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![NewOrderItem {
            medicine_id,
            pharmacy_id,
            qty,
        }],
        shipping_address: json!({"line1": "42 Test Lane", "lat": 19.07, "lon": 72.88}),
    }
}

#[tokio::test]
async fn full_fulfillment_pipeline() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let customer_id = common::create_user(
        &state,
        &common::unique_email("jane"),
        &common::unique_phone(),
        &["customer"],
        true,
    )
    .await?;
    let pharmacist_id = common::create_user(
        &state,
        &common::unique_email("ph"),
        &common::unique_phone(),
        &["pharmacist"],
        true,
    )
    .await?;
    let driver_id = common::create_user(
        &state,
        &common::unique_email("d1"),
        &common::unique_phone(),
        &["driver"],
        true,
    )
    .await?;
    let pharmacy_id = common::create_pharmacy(&state, pharmacist_id).await?;
    let medicine_id = common::create_medicine(&state, "Paracetamol 500mg").await?;
    let inv_id = common::create_batch(&state, pharmacy_id, medicine_id, "B1", 100, 2200).await?;

    let customer = common::auth(customer_id, "customer");
    let pharmacist = common::auth(pharmacist_id, "pharmacist");
    let driver = common::auth(driver_id, "driver");
    let idempotency_key = format!("k1-{}", Uuid::new_v4().simple());

    // Checkout: 2 x 22.00 + 18% tax = 51.92.
    let created = order_service::create_order(
        &state,
        &customer,
        Some(idempotency_key.clone()),
        order_request(medicine_id, pharmacy_id, 2),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.order.status, "created");
    assert_eq!(created.order.payment_status, "pending");
    assert_eq!(created.order.total_amount, 5192);
    assert_eq!(created.otp_for_delivery.len(), 6);
    assert!(created.otp_for_delivery.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(common::stock_of(&state, inv_id).await?, (98, 2));

    // Idempotent replay: identical order id and OTP, single row, stock moved
    // exactly once.
    let replayed = order_service::create_order(
        &state,
        &customer,
        Some(idempotency_key.clone()),
        order_request(medicine_id, pharmacy_id, 2),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(replayed.order.id, created.order.id);
    assert_eq!(replayed.otp_for_delivery, created.otp_for_delivery);
    let (order_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE idempotency_key = $1")
            .bind(&idempotency_key)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(order_count, 1);
    assert_eq!(common::stock_of(&state, inv_id).await?, (98, 2));

    // Payment webhook: pending -> paid materializes exactly one delivery.
    let paid = payment_service::handle_webhook(
        &state,
        PaymentWebhookRequest {
            order_id: created.order.id,
            payment_status: "paid".to_string(),
            transaction_id: "txn_1".to_string(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(paid.payment_status, "paid");
    let delivery_id = paid.delivery_id.expect("delivery stitched into order");
    let (delivery_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM deliveries WHERE order_id = $1")
            .bind(created.order.id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(delivery_count, 1);

    // A replayed webhook must not create a second delivery.
    payment_service::handle_webhook(
        &state,
        PaymentWebhookRequest {
            order_id: created.order.id,
            payment_status: "paid".to_string(),
            transaction_id: "txn_1-replay".to_string(),
        },
    )
    .await?;
    let (delivery_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM deliveries WHERE order_id = $1")
            .bind(created.order.id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(delivery_count, 1);

    // Pharmacy workflow.
    let accepted = pharmacy_service::accept_order(&state, &pharmacist, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(accepted.status, "accepted_by_pharmacy");
    let prepared = pharmacy_service::mark_prepared(&state, &pharmacist, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(prepared.status, "prepared");

    // Driver claims the delivery; order advances to driver_assigned.
    delivery_service::accept_delivery(&state, &driver, delivery_id).await?;
    let (status,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
        .bind(created.order.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(status, "driver_assigned");

    // Pickup moves the order into transit.
    delivery_service::update_status(
        &state,
        &driver,
        delivery_id,
        DeliveryStatusUpdate {
            status: "picked_up".to_string(),
            lat: Some(19.07),
            lon: Some(72.87),
            notes: None,
        },
    )
    .await?;
    let (status,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
        .bind(created.order.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(status, "in_transit");

    // Cancellation window has closed.
    let err = order_service::cancel_order(
        &state,
        &customer,
        created.order.id,
        CancelOrderRequest { reason: None },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_code(), "ORDER_CANNOT_CANCEL");

    // Wrong OTP is rejected and nothing commits.
    let wrong_otp = if created.otp_for_delivery == "000000" {
        "111111"
    } else {
        "000000"
    };
    let err = delivery_service::confirm_delivery(
        &state,
        &driver,
        delivery_id,
        ConfirmDeliveryRequest {
            otp: wrong_otp.to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_code(), "DELIVERY_OTP_INVALID");
    assert_eq!(common::stock_of(&state, inv_id).await?, (98, 2));

    // Correct OTP finalizes: order delivered, reservation destroyed.
    let confirmed = delivery_service::confirm_delivery(
        &state,
        &driver,
        delivery_id,
        ConfirmDeliveryRequest {
            otp: created.otp_for_delivery.clone(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.status, "delivered");
    let (status,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
        .bind(created.order.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(status, "delivered");
    assert_eq!(common::stock_of(&state, inv_id).await?, (98, 0));

    Ok(())
}

#[tokio::test]
async fn customer_cancel_releases_stock_and_decline_works() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let customer_id = common::create_user(
        &state,
        &common::unique_email("c2"),
        &common::unique_phone(),
        &["customer"],
        true,
    )
    .await?;
    let pharmacist_id = common::create_user(
        &state,
        &common::unique_email("p2"),
        &common::unique_phone(),
        &["pharmacist"],
        true,
    )
    .await?;
    let pharmacy_id = common::create_pharmacy(&state, pharmacist_id).await?;
    let medicine_id = common::create_medicine(&state, "Ibuprofen 400mg").await?;
    let inv_id = common::create_batch(&state, pharmacy_id, medicine_id, "B1", 10, 1000).await?;

    let customer = common::auth(customer_id, "customer");
    let pharmacist = common::auth(pharmacist_id, "pharmacist");

    // Cancel while still in created: stock returns, reason recorded.
    let order = order_service::create_order(
        &state,
        &customer,
        None,
        order_request(medicine_id, pharmacy_id, 3),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(common::stock_of(&state, inv_id).await?, (7, 3));

    let cancelled = order_service::cancel_order(
        &state,
        &customer,
        order.order.id,
        CancelOrderRequest {
            reason: Some("changed my mind".to_string()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.order.status, "cancelled");
    assert_eq!(common::stock_of(&state, inv_id).await?, (10, 0));

    // Pharmacy decline also cancels and releases.
    let order = order_service::create_order(
        &state,
        &customer,
        None,
        order_request(medicine_id, pharmacy_id, 2),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(common::stock_of(&state, inv_id).await?, (8, 2));

    let declined = pharmacy_service::decline_order(
        &state,
        &pharmacist,
        order.order.id,
        DeclineOrderRequest {
            reason: Some("out of delivery range".to_string()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(declined.status, "cancelled");
    assert_eq!(
        declined.cancellation_reason.as_deref(),
        Some("out of delivery range")
    );
    assert_eq!(common::stock_of(&state, inv_id).await?, (10, 0));

    // Accepting a cancelled order is an invalid transition.
    let err = pharmacy_service::accept_order(&state, &pharmacist, order.order.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");

    Ok(())
}

#[tokio::test]
async fn multi_pharmacy_orders_are_rejected() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let customer_id = common::create_user(
        &state,
        &common::unique_email("c3"),
        &common::unique_phone(),
        &["customer"],
        true,
    )
    .await?;
    let ph1 = common::create_user(
        &state,
        &common::unique_email("p3"),
        &common::unique_phone(),
        &["pharmacist"],
        true,
    )
    .await?;
    let ph2 = common::create_user(
        &state,
        &common::unique_email("p4"),
        &common::unique_phone(),
        &["pharmacist"],
        true,
    )
    .await?;
    let pharmacy_a = common::create_pharmacy(&state, ph1).await?;
    let pharmacy_b = common::create_pharmacy(&state, ph2).await?;
    let medicine_id = common::create_medicine(&state, "Cetirizine 10mg").await?;
    common::create_batch(&state, pharmacy_a, medicine_id, "B1", 10, 500).await?;
    common::create_batch(&state, pharmacy_b, medicine_id, "B1", 10, 500).await?;

    let customer = common::auth(customer_id, "customer");
    let err = order_service::create_order(
        &state,
        &customer,
        None,
        CreateOrderRequest {
            items: vec![
                NewOrderItem {
                    medicine_id,
                    pharmacy_id: pharmacy_a,
                    qty: 1,
                },
                NewOrderItem {
                    medicine_id,
                    pharmacy_id: pharmacy_b,
                    qty: 1,
                },
            ],
            shipping_address: json!({"line1": "42 Test Lane"}),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_code(), "BAD_REQUEST");

    Ok(())
}
