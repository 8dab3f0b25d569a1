use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::*;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::books)]
pub struct BookRow {
    pub id: i64,
    pub title: String,
    pub price: BigDecimal,
    pub stock_quantity: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderRow {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub subtotal: BigDecimal,
    pub shipping: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
    pub status: String,
    pub shipping_address: serde_json::Value,
    pub payment_method: String,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrderRow {
    pub order_number: String,
    pub user_id: i64,
    pub subtotal: BigDecimal,
    pub shipping: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
    pub status: String,
    pub shipping_address: serde_json::Value,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderStatusChangeset {
    pub status: String,
    pub tracking_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub book_id: i64,
    pub quantity: i32,
    pub price: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct NewOrderItemRow {
    pub order_id: i64,
    pub book_id: i64,
    pub quantity: i32,
    pub price: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::order_status_history)]
pub struct StatusHistoryRow {
    pub id: i64,
    pub order_id: i64,
    pub status: String,
    pub changed_by: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_status_history)]
pub struct NewStatusHistoryRow {
    pub order_id: i64,
    pub status: String,
    pub changed_by: i64,
    pub notes: Option<String>,
}

impl TryFrom<BookRow> for Book {
    type Error = OrderError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            price: row.price,
            stock_quantity: row.stock_quantity,
            status: row.status.parse()?,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|_| OrderError::Storage(format!("unknown order status: {}", row.status)))?;
        let payment_method = row
            .payment_method
            .parse::<PaymentMethod>()
            .map_err(|_| {
                OrderError::Storage(format!("unknown payment method: {}", row.payment_method))
            })?;

        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            subtotal: row.subtotal,
            shipping: row.shipping,
            tax: row.tax,
            total: row.total,
            status,
            shipping_address: serde_json::from_value(row.shipping_address)?,
            payment_method,
            tracking_number: row.tracking_number,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<NewOrder> for NewOrderRow {
    type Error = OrderError;

    fn try_from(order: NewOrder) -> Result<Self, Self::Error> {
        Ok(Self {
            order_number: order.order_number,
            user_id: order.user_id,
            subtotal: order.totals.subtotal,
            shipping: order.totals.shipping,
            tax: order.totals.tax,
            total: order.totals.total,
            status: OrderStatus::Pending.as_str().to_string(),
            shipping_address: serde_json::to_value(&order.shipping_address)?,
            payment_method: order.payment_method.as_str().to_string(),
            notes: order.notes,
        })
    }
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            book_id: row.book_id,
            quantity: row.quantity,
            price: row.price,
            total: row.total,
        }
    }
}

impl NewOrderItemRow {
    pub fn new(order_id: i64, item: &NewOrderItem) -> Self {
        Self {
            order_id,
            book_id: item.book_id,
            quantity: item.quantity,
            price: item.price.clone(),
            total: item.total.clone(),
        }
    }
}

impl TryFrom<StatusHistoryRow> for StatusHistoryEntry {
    type Error = OrderError;

    fn try_from(row: StatusHistoryRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|_| OrderError::Storage(format!("unknown order status: {}", row.status)))?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            status,
            changed_by: row.changed_by,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

impl From<NewStatusHistory> for NewStatusHistoryRow {
    fn from(entry: NewStatusHistory) -> Self {
        Self {
            order_id: entry.order_id,
            status: entry.status.as_str().to_string(),
            changed_by: entry.changed_by,
            notes: entry.notes,
        }
    }
}
