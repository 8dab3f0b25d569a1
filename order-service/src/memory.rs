use async_trait::async_trait;
use chrono::Utc;
use shared::*;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::store::{OrderStore, OrderTx, TxFuture};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub books: BTreeMap<i64, Book>,
    pub orders: BTreeMap<i64, Order>,
    pub items: Vec<OrderItem>,
    pub history: Vec<StatusHistoryEntry>,
    next_order_id: i64,
    next_item_id: i64,
    next_history_id: i64,
}

/// In-process store with the same commit/rollback behaviour as the database.
///
/// Units of work run one at a time against a copy of the state; the copy
/// replaces the state only when the unit succeeds.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        let state = MemoryState {
            books: books.into_iter().map(|book| (book.id, book)).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn put_book(&self, book: Book) {
        self.state.lock().await.books.insert(book.id, book);
    }

    pub async fn book(&self, book_id: i64) -> Option<Book> {
        self.state.lock().await.books.get(&book_id).cloned()
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

impl MemoryState {
    fn details(&self, order: &Order) -> OrderDetails {
        OrderDetails {
            order: order.clone(),
            items: self
                .items
                .iter()
                .filter(|item| item.order_id == order.id)
                .cloned()
                .collect(),
            history: self
                .history
                .iter()
                .filter(|entry| entry.order_id == order.id)
                .cloned()
                .collect(),
        }
    }
}

struct MemoryTx<'a> {
    state: &'a mut MemoryState,
}

#[async_trait]
impl<'a> OrderTx for MemoryTx<'a> {
    async fn lock_book(&mut self, book_id: i64) -> OrderResult<Option<Book>> {
        Ok(self.state.books.get(&book_id).cloned())
    }

    async fn decrement_stock(&mut self, book_id: i64, quantity: i32) -> OrderResult<bool> {
        match self.state.books.get_mut(&book_id) {
            Some(book) if book.stock_quantity >= quantity => {
                book.stock_quantity -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_stock(&mut self, book_id: i64, quantity: i32) -> OrderResult<()> {
        let book = self
            .state
            .books
            .get_mut(&book_id)
            .ok_or_else(|| OrderError::NotFound(format!("Book {} not found", book_id)))?;
        book.stock_quantity += quantity;
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> OrderResult<Order> {
        if self
            .state
            .orders
            .values()
            .any(|existing| existing.order_number == order.order_number)
        {
            return Err(OrderError::Conflict(format!(
                "order number {} already exists",
                order.order_number
            )));
        }

        self.state.next_order_id += 1;
        let now = Utc::now();
        let created = Order {
            id: self.state.next_order_id,
            order_number: order.order_number,
            user_id: order.user_id,
            subtotal: order.totals.subtotal,
            shipping: order.totals.shipping,
            tax: order.totals.tax,
            total: order.totals.total,
            status: OrderStatus::Pending,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            tracking_number: None,
            notes: order.notes,
            created_at: now,
            updated_at: now,
        };
        self.state.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn insert_items(
        &mut self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> OrderResult<Vec<OrderItem>> {
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            self.state.next_item_id += 1;
            let row = OrderItem {
                id: self.state.next_item_id,
                order_id,
                book_id: item.book_id,
                quantity: item.quantity,
                price: item.price.clone(),
                total: item.total.clone(),
            };
            self.state.items.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn lock_order(&mut self, order_id: i64) -> OrderResult<Option<Order>> {
        Ok(self.state.orders.get(&order_id).cloned())
    }

    async fn order_items(&mut self, order_id: i64) -> OrderResult<Vec<OrderItem>> {
        Ok(self
            .state
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn set_status(
        &mut self,
        order_id: i64,
        status: OrderStatus,
        tracking_number: Option<String>,
    ) -> OrderResult<Order> {
        let order = self
            .state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| OrderError::NotFound(format!("Order {} not found", order_id)))?;
        order.status = status;
        if tracking_number.is_some() {
            order.tracking_number = tracking_number;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn append_history(&mut self, entry: NewStatusHistory) -> OrderResult<()> {
        self.state.next_history_id += 1;
        self.state.history.push(StatusHistoryEntry {
            id: self.state.next_history_id,
            order_id: entry.order_id,
            status: entry.status,
            changed_by: entry.changed_by,
            notes: entry.notes,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn transaction<T, F>(&self, work: F) -> OrderResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn OrderTx) -> TxFuture<'t, T> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        let mut working = state.clone();

        let result = {
            let mut tx = MemoryTx {
                state: &mut working,
            };
            work(&mut tx).await
        };

        if result.is_ok() {
            *state = working;
        }
        result
    }

    async fn find_order(&self, order_id: i64) -> OrderResult<Option<OrderDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .get(&order_id)
            .map(|order| state.details(order)))
    }

    async fn list_orders(
        &self,
        user_id: i64,
        filter: &OrderFilter,
    ) -> OrderResult<(Vec<Order>, i64)> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Order> = state
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .filter(|order| filter.status.map_or(true, |status| order.status == status))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}
