use async_trait::async_trait;
use futures::future::BoxFuture;
use shared::*;

pub type TxFuture<'t, T> = BoxFuture<'t, OrderResult<T>>;

/// Row-level operations available inside one atomic unit of work.
///
/// Every call made through the same `OrderTx` commits or rolls back together.
#[async_trait]
pub trait OrderTx: Send {
    /// Current book row, locked against concurrent writers until the unit ends.
    async fn lock_book(&mut self, book_id: i64) -> OrderResult<Option<Book>>;

    /// Atomically takes `quantity` units if that many are in stock.
    /// Returns `false` and changes nothing otherwise.
    async fn decrement_stock(&mut self, book_id: i64, quantity: i32) -> OrderResult<bool>;

    async fn increment_stock(&mut self, book_id: i64, quantity: i32) -> OrderResult<()>;

    /// Inserts a `pending` order. A taken order number yields `OrderError::Conflict`
    /// and leaves the unit of work usable.
    async fn insert_order(&mut self, order: NewOrder) -> OrderResult<Order>;

    async fn insert_items(
        &mut self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> OrderResult<Vec<OrderItem>>;

    async fn lock_order(&mut self, order_id: i64) -> OrderResult<Option<Order>>;

    async fn order_items(&mut self, order_id: i64) -> OrderResult<Vec<OrderItem>>;

    async fn set_status(
        &mut self,
        order_id: i64,
        status: OrderStatus,
        tracking_number: Option<String>,
    ) -> OrderResult<Order>;

    async fn append_history(&mut self, entry: NewStatusHistory) -> OrderResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Runs `work` atomically: commits when it returns `Ok`, rolls back otherwise.
    async fn transaction<T, F>(&self, work: F) -> OrderResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn OrderTx) -> TxFuture<'t, T> + Send + 'static;

    async fn find_order(&self, order_id: i64) -> OrderResult<Option<OrderDetails>>;

    /// A user's orders, newest first, with the total count matching `filter`.
    async fn list_orders(&self, user_id: i64, filter: &OrderFilter)
        -> OrderResult<(Vec<Order>, i64)>;
}
