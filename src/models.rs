use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(format!("unknown role {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display label stored next to a product's numeric quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum StockStatus {
    #[serde(rename = "In stock")]
    InStock,
    #[serde(rename = "Out of stock")]
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In stock",
            StockStatus::OutOfStock => "Out of stock",
        }
    }

    pub fn for_quantity(quantity: i32) -> Self {
        if quantity > 0 {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }

    /// Resolve a requested label and quantity into a consistent pair.
    ///
    /// The quantity wins: an explicit `Out of stock` zeroes it, and the label is
    /// always recomputed from whatever quantity results.
    pub fn reconcile(quantity: i32, requested: Option<StockStatus>) -> (i32, StockStatus) {
        let quantity = match requested {
            Some(StockStatus::OutOfStock) => 0,
            _ => quantity.max(0),
        };
        (quantity, StockStatus::for_quantity(quantity))
    }
}

impl FromStr for StockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("In stock") {
            Ok(StockStatus::InStock)
        } else if s.eq_ignore_ascii_case("Out of stock") {
            Ok(StockStatus::OutOfStock)
        } else {
            Err(format!("unknown stock status {s}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Fulfilled,
    Cancelled,
    Received,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Fulfilled => "FULFILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Received => "RECEIVED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Received)
    }

    /// Whether the owner may confirm delivery of this order.
    pub fn can_receive(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled)
    }

    /// Transition table: admins fulfil or cancel pending orders, owners receive
    /// fulfilled ones. Nothing else moves.
    pub fn can_transition(&self, next: OrderStatus, actor: Role) -> bool {
        match (self, next, actor) {
            (OrderStatus::Pending, OrderStatus::Fulfilled, Role::Admin) => true,
            (OrderStatus::Pending, OrderStatus::Cancelled, Role::Admin) => true,
            (OrderStatus::Fulfilled, OrderStatus::Received, Role::User) => true,
            _ => false,
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "FULFILLED" => Ok(OrderStatus::Fulfilled),
            "CANCELLED" | "CANCEL" => Ok(OrderStatus::Cancelled),
            "RECEIVED" => Ok(OrderStatus::Received),
            other => Err(format!("unknown order status {other}")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: i64,
    pub quantity: i32,
    pub status_stock: StockStatus,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn first_image(&self) -> String {
        self.images.first().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Option<Uuid>,
    pub name: String,
    pub category: String,
    pub image: String,
    pub quantity: i32,
    pub price: i64,
    pub status: OrderStatus,
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCoupon {
    pub code: String,
    pub used: bool,
    pub collected_at: DateTime<Utc>,
    pub discount: f64,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfilled_order_can_be_received_pending_cannot() {
        assert!(OrderStatus::Fulfilled.can_receive());
        assert!(!OrderStatus::Pending.can_receive());
        assert!(!OrderStatus::Received.can_receive());
    }

    #[test]
    fn transitions_respect_actor() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Fulfilled, Role::Admin));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled, Role::Admin));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Fulfilled, Role::User));
        assert!(OrderStatus::Fulfilled.can_transition(OrderStatus::Received, Role::User));
        assert!(!OrderStatus::Fulfilled.can_transition(OrderStatus::Received, Role::Admin));
        assert!(!OrderStatus::Fulfilled.can_transition(OrderStatus::Cancelled, Role::Admin));
    }

    #[test]
    fn terminal_states_do_not_move() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Fulfilled,
            OrderStatus::Cancelled,
            OrderStatus::Received,
        ] {
            for actor in [Role::Admin, Role::User] {
                assert!(!OrderStatus::Received.can_transition(next, actor));
                assert!(!OrderStatus::Cancelled.can_transition(next, actor));
            }
        }
        assert!(OrderStatus::Received.is_terminal());
        assert!(!OrderStatus::Fulfilled.is_terminal());
    }

    #[test]
    fn order_status_parses_legacy_cancel() {
        assert_eq!("CANCEL".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert_eq!("fulfilled".parse::<OrderStatus>(), Ok(OrderStatus::Fulfilled));
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_status_serializes_uppercase() {
        let json = serde_json::to_string(&OrderStatus::Received).unwrap();
        assert_eq!(json, "\"RECEIVED\"");
    }

    #[test]
    fn stock_label_follows_quantity() {
        assert_eq!(
            StockStatus::reconcile(0, Some(StockStatus::InStock)),
            (0, StockStatus::OutOfStock)
        );
        assert_eq!(
            StockStatus::reconcile(7, Some(StockStatus::OutOfStock)),
            (0, StockStatus::OutOfStock)
        );
        assert_eq!(StockStatus::reconcile(3, None), (3, StockStatus::InStock));
        assert_eq!(
            serde_json::to_string(&StockStatus::OutOfStock).unwrap(),
            "\"Out of stock\""
        );
    }
}
