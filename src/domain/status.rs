//! Lifecycle state machines for orders, deliveries and payments.
//!
//! Order transitions are enforced twice: here, and by the conditional
//! `UPDATE ... WHERE status = $from` writes that pick exactly one winner
//! under concurrency.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    AcceptedByPharmacy,
    Prepared,
    DriverAssigned,
    InTransit,
    Delivered,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::AcceptedByPharmacy => "accepted_by_pharmacy",
            OrderStatus::Prepared => "prepared",
            OrderStatus::DriverAssigned => "driver_assigned",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "created" => OrderStatus::Created,
            "accepted_by_pharmacy" => OrderStatus::AcceptedByPharmacy,
            "prepared" => OrderStatus::Prepared,
            "driver_assigned" => OrderStatus::DriverAssigned,
            "in_transit" => OrderStatus::InTransit,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "failed" => OrderStatus::Failed,
            _ => return None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Created, AcceptedByPharmacy)
                | (Created, Cancelled)
                | (AcceptedByPharmacy, Prepared)
                | (AcceptedByPharmacy, Cancelled)
                | (Prepared, DriverAssigned)
                | (Prepared, Cancelled)
                | (DriverAssigned, InTransit)
                | (DriverAssigned, Cancelled)
                | (InTransit, Delivered)
                | (InTransit, Failed)
        )
    }

    /// The customer-initiated cancel window closes once a driver is assigned.
    pub fn customer_may_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::AcceptedByPharmacy | OrderStatus::Prepared
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "assigned" => DeliveryStatus::Assigned,
            "picked_up" => DeliveryStatus::PickedUp,
            "in_transit" => DeliveryStatus::InTransit,
            "delivered" => DeliveryStatus::Delivered,
            "failed" => DeliveryStatus::Failed,
            _ => return None,
        })
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "pending" => PaymentStatus::Pending,
            "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => return None,
        })
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 8] = [
        Created,
        AcceptedByPharmacy,
        Prepared,
        DriverAssigned,
        InTransit,
        Delivered,
        Cancelled,
        Failed,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [Delivered, Cancelled, Failed] {
            for to in ALL {
                assert!(
                    !terminal.can_transition_to(to),
                    "{terminal} -> {to} must be forbidden"
                );
            }
        }
    }

    #[test]
    fn lifecycle_graph_matches_table() {
        assert!(Created.can_transition_to(AcceptedByPharmacy));
        assert!(Created.can_transition_to(Cancelled));
        assert!(AcceptedByPharmacy.can_transition_to(Prepared));
        assert!(Prepared.can_transition_to(DriverAssigned));
        assert!(DriverAssigned.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));
        assert!(InTransit.can_transition_to(Failed));

        assert!(!Created.can_transition_to(Prepared));
        assert!(!Created.can_transition_to(Delivered));
        assert!(!Prepared.can_transition_to(InTransit));
        assert!(!InTransit.can_transition_to(Cancelled));
        assert!(!DriverAssigned.can_transition_to(Delivered));
    }

    #[test]
    fn customer_cancel_window_closes_at_driver_assignment() {
        assert!(Created.customer_may_cancel());
        assert!(AcceptedByPharmacy.customer_may_cancel());
        assert!(Prepared.customer_may_cancel());
        assert!(!DriverAssigned.customer_may_cancel());
        assert!(!InTransit.customer_may_cancel());
        assert!(!Delivered.customer_may_cancel());
    }

    #[test]
    fn round_trip_through_strings() {
        for status in ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }
}
