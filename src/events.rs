//! Event envelope and typed payloads for the durable topic bus.
//!
//! Every message is wrapped in [`Envelope`]; `message_id` doubles as the
//! downstream dedup key. The `kind` field equals the routing key the message
//! was published under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub retries: u32,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Envelope {
    pub fn wrap(kind: &str, payload: Value) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            kind: kind.to_string(),
            timestamp: Utc::now(),
            retries: 0,
            payload,
            meta: None,
        }
    }
}

/// A publishable event payload bound to a fixed routing key.
pub trait EventPayload: Serialize {
    const ROUTING_KEY: &'static str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub pharmacy_id: Uuid,
    pub items: Value,
    pub total: i64,
}

impl EventPayload for OrderCreatedEvent {
    const ROUTING_KEY: &'static str = "orders.created";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order_id: Uuid,
    pub delivery_id: Uuid,
    pub pharmacy_id: Uuid,
    pub total: i64,
}

impl EventPayload for OrderPaidEvent {
    const ROUTING_KEY: &'static str = "orders.paid";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub pharmacy_id: Uuid,
}

impl EventPayload for OrderCancelledEvent {
    const ROUTING_KEY: &'static str = "orders.cancelled";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCreatedEvent {
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    pub pharmacy_id: Uuid,
}

impl EventPayload for DeliveryCreatedEvent {
    const ROUTING_KEY: &'static str = "deliveries.created";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryUpdatedEvent {
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub user_id: Uuid,
}

impl EventPayload for DeliveryUpdatedEvent {
    const ROUTING_KEY: &'static str = "deliveries.updated";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryUpdatedEvent {
    pub pharmacy_id: Uuid,
    pub medicine_id: Uuid,
}

impl EventPayload for InventoryUpdatedEvent {
    const ROUTING_KEY: &'static str = "inventory.updated";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_type_field() {
        let env = Envelope::wrap(
            OrderCancelledEvent::ROUTING_KEY,
            serde_json::json!({"order_id": Uuid::nil()}),
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "orders.cancelled");
        assert_eq!(json["retries"], 0);
        assert!(json.get("meta").is_none());
        assert!(json["message_id"].as_str().is_some());
    }

    #[test]
    fn envelope_round_trips() {
        let env = Envelope::wrap("deliveries.updated", serde_json::json!({"status": "in_transit"}));
        let raw = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.message_id, env.message_id);
        assert_eq!(back.kind, "deliveries.updated");
        assert_eq!(back.payload["status"], "in_transit");
    }
}
