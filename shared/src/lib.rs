use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod pricing;
pub mod request;

pub use error::{OrderError, OrderResult};
pub use pricing::{line_total, money, PricingConfig, Totals};
pub use request::{
    ListOrdersQuery, OrderFilter, OrderLine, OrderRequest, ShippingAddress, ValidatedOrder,
};

pub const ORDER_NUMBER_PREFIX: &str = "ORD";
const ORDER_NUMBER_SUFFIX_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Active,
    Inactive,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub price: BigDecimal,
    pub stock_quantity: i32,
    pub status: BookStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Paypal,
    BankTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Identity and role of whoever is acting on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub subtotal: BigDecimal,
    pub shipping: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of an order row before the store assigns its id and timestamps.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: i64,
    pub totals: Totals,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub book_id: i64,
    pub quantity: i32,
    /// Unit price at the time the order was placed.
    pub price: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub book_id: i64,
    pub quantity: i32,
    pub price: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatus,
    pub changed_by: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStatusHistory {
    pub order_id: i64,
    pub status: OrderStatus,
    pub changed_by: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<StatusHistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Published after commit. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    OrderPlaced {
        order_id: i64,
        order_number: String,
        user_id: i64,
        total: BigDecimal,
        created_at: DateTime<Utc>,
    },
    OrderCancelled {
        order_id: i64,
        order_number: String,
        cancelled_by: i64,
        reason: Option<String>,
    },
    OrderStatusChanged {
        order_id: i64,
        order_number: String,
        status: OrderStatus,
        tracking_number: Option<String>,
    },
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Active => "active",
            BookStatus::Inactive => "inactive",
            BookStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for BookStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BookStatus::Active),
            "inactive" => Ok(BookStatus::Inactive),
            "deleted" => Ok(BookStatus::Deleted),
            other => Err(OrderError::Storage(format!("unknown book status: {}", other))),
        }
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "paypal" => Ok(PaymentMethod::Paypal),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(OrderError::Validation(format!(
                "Invalid payment method: {}",
                other
            ))),
        }
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position along the fulfilment path. `None` for `Cancelled`.
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    /// Whether `next` is the single step after `self` on the fulfilment path.
    pub fn is_next_step(&self, next: OrderStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }

    /// Checks whether `actor` may cancel an order currently in this status.
    pub fn check_cancellable(&self, actor: &Actor) -> OrderResult<()> {
        match self {
            OrderStatus::Delivered => Err(OrderError::State(
                "Cannot cancel delivered order".to_string(),
            )),
            OrderStatus::Cancelled => Err(OrderError::State(
                "Order is already cancelled".to_string(),
            )),
            OrderStatus::Pending | OrderStatus::Confirmed => Ok(()),
            OrderStatus::Processing | OrderStatus::Shipped if actor.is_admin => Ok(()),
            other => Err(OrderError::State(format!(
                "Order cannot be cancelled once it is {}",
                other
            ))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| OrderError::Validation(format!("Invalid order status: {}", s)))
    }
}

impl Actor {
    pub fn user(id: i64) -> Self {
        Self { id, is_admin: false }
    }

    pub fn admin(id: i64) -> Self {
        Self { id, is_admin: true }
    }

    pub fn can_view(&self, order: &Order) -> bool {
        self.is_admin || order.user_id == self.id
    }
}

impl From<&OrderDetails> for OrderEvent {
    fn from(details: &OrderDetails) -> Self {
        OrderEvent::OrderPlaced {
            order_id: details.order.id,
            order_number: details.order.order_number.clone(),
            user_id: details.order.user_id,
            total: details.order.total.clone(),
            created_at: details.order.created_at,
        }
    }
}

impl OrderEvent {
    pub fn order_number(&self) -> &str {
        match self {
            OrderEvent::OrderPlaced { order_number, .. }
            | OrderEvent::OrderCancelled { order_number, .. }
            | OrderEvent::OrderStatusChanged { order_number, .. } => order_number,
        }
    }
}

/// `ORD-<epoch-ms>-<5 random uppercase alphanumerics>`.
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_NUMBER_SUFFIX_LEN)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();

    format!(
        "{}-{}-{}",
        ORDER_NUMBER_PREFIX,
        Utc::now().timestamp_millis(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_has_prefix_timestamp_and_suffix() {
        let before = Utc::now().timestamp_millis();
        let number = generate_order_number();
        let after = Utc::now().timestamp_millis();

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");

        let millis: i64 = parts[1].parse().unwrap();
        assert!(millis >= before && millis <= after);

        assert_eq!(parts[2].len(), 5);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn status_strings_round_trip_through_from_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!(matches!(
            "lost".parse::<OrderStatus>(),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn customers_cancel_only_before_processing() {
        let user = Actor::user(7);

        assert!(OrderStatus::Pending.check_cancellable(&user).is_ok());
        assert!(OrderStatus::Confirmed.check_cancellable(&user).is_ok());
        assert!(OrderStatus::Processing.check_cancellable(&user).is_err());
        assert!(OrderStatus::Shipped.check_cancellable(&user).is_err());
    }

    #[test]
    fn admins_cancel_any_non_terminal_order() {
        let admin = Actor::admin(1);

        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            assert!(status.check_cancellable(&admin).is_ok(), "{}", status);
        }
    }

    #[test]
    fn terminal_orders_are_never_cancellable() {
        let admin = Actor::admin(1);

        let err = OrderStatus::Delivered.check_cancellable(&admin).unwrap_err();
        assert_eq!(err.to_string(), "Cannot cancel delivered order");

        let err = OrderStatus::Cancelled.check_cancellable(&admin).unwrap_err();
        assert_eq!(err.to_string(), "Order is already cancelled");
    }

    #[test]
    fn next_step_follows_fulfilment_path() {
        assert!(OrderStatus::Pending.is_next_step(OrderStatus::Confirmed));
        assert!(OrderStatus::Shipped.is_next_step(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.is_next_step(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.is_next_step(OrderStatus::Processing));
        assert!(!OrderStatus::Pending.is_next_step(OrderStatus::Cancelled));
    }

    #[test]
    fn payment_methods_parse_from_wire_names() {
        assert_eq!("card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!("Card".parse::<PaymentMethod>().is_err());
    }
}
