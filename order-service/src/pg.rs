use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::*;

use crate::models::*;
use crate::schema::*;
use crate::store::{OrderStore, OrderTx, TxFuture};

pub type DbPool = Pool<AsyncPgConnection>;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

struct PgTx<'c> {
    conn: &'c mut AsyncPgConnection,
}

#[async_trait]
impl<'c> OrderTx for PgTx<'c> {
    async fn lock_book(&mut self, book_id: i64) -> OrderResult<Option<Book>> {
        let row = books::table
            .find(book_id)
            .select(BookRow::as_select())
            .for_update()
            .get_result::<BookRow>(&mut *self.conn)
            .await
            .optional()?;
        row.map(Book::try_from).transpose()
    }

    async fn decrement_stock(&mut self, book_id: i64, quantity: i32) -> OrderResult<bool> {
        let updated = diesel::update(
            books::table
                .filter(books::id.eq(book_id))
                .filter(books::stock_quantity.ge(quantity)),
        )
        .set((
            books::stock_quantity.eq(books::stock_quantity - quantity),
            books::updated_at.eq(Utc::now()),
        ))
        .execute(&mut *self.conn)
        .await?;
        Ok(updated == 1)
    }

    async fn increment_stock(&mut self, book_id: i64, quantity: i32) -> OrderResult<()> {
        let updated = diesel::update(books::table.filter(books::id.eq(book_id)))
            .set((
                books::stock_quantity.eq(books::stock_quantity + quantity),
                books::updated_at.eq(Utc::now()),
            ))
            .execute(&mut *self.conn)
            .await?;
        if updated == 0 {
            return Err(OrderError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> OrderResult<Order> {
        let row = NewOrderRow::try_from(order)?;

        // Savepoint: a unique violation must not poison the enclosing transaction.
        let inserted = self
            .conn
            .transaction::<_, diesel::result::Error, _>(move |conn| {
                Box::pin(async move {
                    diesel::insert_into(orders::table)
                        .values(&row)
                        .returning(OrderRow::as_returning())
                        .get_result::<OrderRow>(conn)
                        .await
                })
            })
            .await?;

        Order::try_from(inserted)
    }

    async fn insert_items(
        &mut self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> OrderResult<Vec<OrderItem>> {
        let rows: Vec<NewOrderItemRow> = items
            .iter()
            .map(|item| NewOrderItemRow::new(order_id, item))
            .collect();

        let inserted = diesel::insert_into(order_items::table)
            .values(&rows)
            .returning(OrderItemRow::as_returning())
            .get_results::<OrderItemRow>(&mut *self.conn)
            .await?;

        Ok(inserted.into_iter().map(OrderItem::from).collect())
    }

    async fn lock_order(&mut self, order_id: i64) -> OrderResult<Option<Order>> {
        let row = orders::table
            .find(order_id)
            .select(OrderRow::as_select())
            .for_update()
            .get_result::<OrderRow>(&mut *self.conn)
            .await
            .optional()?;
        row.map(Order::try_from).transpose()
    }

    async fn order_items(&mut self, order_id: i64) -> OrderResult<Vec<OrderItem>> {
        let rows = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order(order_items::id.asc())
            .select(OrderItemRow::as_select())
            .load::<OrderItemRow>(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn set_status(
        &mut self,
        order_id: i64,
        status: OrderStatus,
        tracking_number: Option<String>,
    ) -> OrderResult<Order> {
        let changes = OrderStatusChangeset {
            status: status.as_str().to_string(),
            tracking_number,
            updated_at: Utc::now(),
        };

        let row = diesel::update(orders::table.find(order_id))
            .set(&changes)
            .returning(OrderRow::as_returning())
            .get_result::<OrderRow>(&mut *self.conn)
            .await
            .optional()?
            .ok_or_else(|| OrderError::NotFound(format!("Order {} not found", order_id)))?;

        Order::try_from(row)
    }

    async fn append_history(&mut self, entry: NewStatusHistory) -> OrderResult<()> {
        diesel::insert_into(order_status_history::table)
            .values(NewStatusHistoryRow::from(entry))
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn transaction<T, F>(&self, work: F) -> OrderResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn OrderTx) -> TxFuture<'t, T> + Send + 'static,
    {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| OrderError::Storage(format!("connection unavailable: {}", e)))?;
        let conn: &mut AsyncPgConnection = &mut conn;

        conn.transaction::<_, OrderError, _>(move |conn| {
            Box::pin(async move {
                let mut tx = PgTx { conn };
                work(&mut tx).await
            })
        })
        .await
    }

    async fn find_order(&self, order_id: i64) -> OrderResult<Option<OrderDetails>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| OrderError::Storage(format!("connection unavailable: {}", e)))?;

        let row = orders::table
            .find(order_id)
            .select(OrderRow::as_select())
            .first::<OrderRow>(&mut conn)
            .await
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };

        let items = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order(order_items::id.asc())
            .select(OrderItemRow::as_select())
            .load::<OrderItemRow>(&mut conn)
            .await?;

        let history = order_status_history::table
            .filter(order_status_history::order_id.eq(order_id))
            .order((
                order_status_history::created_at.asc(),
                order_status_history::id.asc(),
            ))
            .select(StatusHistoryRow::as_select())
            .load::<StatusHistoryRow>(&mut conn)
            .await?;

        Ok(Some(OrderDetails {
            order: Order::try_from(row)?,
            items: items.into_iter().map(OrderItem::from).collect(),
            history: history
                .into_iter()
                .map(StatusHistoryEntry::try_from)
                .collect::<OrderResult<Vec<_>>>()?,
        }))
    }

    async fn list_orders(
        &self,
        user_id: i64,
        filter: &OrderFilter,
    ) -> OrderResult<(Vec<Order>, i64)> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| OrderError::Storage(format!("connection unavailable: {}", e)))?;

        let mut count_query = orders::table
            .filter(orders::user_id.eq(user_id))
            .count()
            .into_boxed();
        let mut page_query = orders::table
            .filter(orders::user_id.eq(user_id))
            .select(OrderRow::as_select())
            .into_boxed();
        if let Some(status) = filter.status {
            count_query = count_query.filter(orders::status.eq(status.as_str()));
            page_query = page_query.filter(orders::status.eq(status.as_str()));
        }

        let total = count_query.get_result::<i64>(&mut conn).await?;
        let rows = page_query
            .order((orders::created_at.desc(), orders::id.desc()))
            .limit(i64::from(filter.limit))
            .offset(filter.offset())
            .load::<OrderRow>(&mut conn)
            .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<OrderResult<Vec<_>>>()?;
        Ok((orders, total))
    }
}
