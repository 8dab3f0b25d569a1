use shared::*;
use std::sync::Arc;
use tracing::{info, warn};

use crate::notifier::{self, Notifier};
use crate::store::{OrderStore, OrderTx};

pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;
pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

pub type OrderNumberSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Places, cancels and advances orders against an `OrderStore`.
pub struct OrderService<S> {
    store: Arc<S>,
    pricing: PricingConfig,
    notifier: Arc<dyn Notifier>,
    order_numbers: OrderNumberSource,
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: Arc<S>, pricing: PricingConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            pricing,
            notifier,
            order_numbers: Arc::new(generate_order_number),
        }
    }

    pub fn with_order_numbers<G>(mut self, source: G) -> Self
    where
        G: Fn() -> String + Send + Sync + 'static,
    {
        self.order_numbers = Arc::new(source);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Validates the cart, reserves stock and records a `pending` order in one
    /// transaction. Nothing is written unless every line can be filled.
    pub async fn place_order(&self, user_id: i64, request: OrderRequest) -> OrderResult<OrderDetails> {
        let order = request.validate()?;
        let pricing = self.pricing.clone();
        let order_numbers = self.order_numbers.clone();

        let details = self
            .store
            .transaction(move |tx| Box::pin(place_in_tx(tx, user_id, order, pricing, order_numbers)))
            .await?;

        info!(
            "Order {} placed by user {}: {} item(s), total {}",
            details.order.order_number,
            user_id,
            details.items.len(),
            details.order.total
        );
        notifier::spawn_publish(self.notifier.clone(), OrderEvent::from(&details));

        Ok(details)
    }

    /// Cancels the order and puts every reserved unit back in stock.
    pub async fn cancel_order(
        &self,
        order_id: i64,
        actor: Actor,
        reason: Option<String>,
    ) -> OrderResult<()> {
        self.cancel(order_id, actor, reason).await.map(|_| ())
    }

    /// Admin-only. Any status may follow any other except that a cancelled order
    /// stays cancelled; moving to `cancelled` restores stock like `cancel_order`.
    pub async fn update_order_status(
        &self,
        order_id: i64,
        actor: Actor,
        new_status: OrderStatus,
        tracking_number: Option<String>,
        notes: Option<String>,
    ) -> OrderResult<Order> {
        if !actor.is_admin {
            return Err(OrderError::Forbidden(
                "Only administrators can update order status".to_string(),
            ));
        }

        if new_status == OrderStatus::Cancelled {
            return self.cancel(order_id, actor, notes).await;
        }

        let tracking_number = non_blank(tracking_number);
        let notes = non_blank(notes);

        let (previous, order) = self
            .store
            .transaction(move |tx| {
                Box::pin(update_status_in_tx(
                    tx,
                    order_id,
                    actor,
                    new_status,
                    tracking_number,
                    notes,
                ))
            })
            .await?;

        if previous == new_status || previous.is_next_step(new_status) {
            info!(
                "Order {} moved from {} to {} by admin {}",
                order.order_number, previous, new_status, actor.id
            );
        } else {
            warn!(
                "Order {} moved from {} to {} by admin {} outside the fulfilment sequence",
                order.order_number, previous, new_status, actor.id
            );
        }

        notifier::spawn_publish(
            self.notifier.clone(),
            OrderEvent::OrderStatusChanged {
                order_id: order.id,
                order_number: order.order_number.clone(),
                status: order.status,
                tracking_number: order.tracking_number.clone(),
            },
        );

        Ok(order)
    }

    /// Customers see only their own orders; a foreign order reads as missing.
    pub async fn get_order(&self, order_id: i64, requester: Actor) -> OrderResult<OrderDetails> {
        self.store
            .find_order(order_id)
            .await?
            .filter(|details| requester.can_view(&details.order))
            .ok_or_else(|| order_not_found(order_id))
    }

    pub async fn list_orders_for_user(
        &self,
        user_id: i64,
        filter: OrderFilter,
    ) -> OrderResult<OrderPage> {
        let (orders, total) = self.store.list_orders(user_id, &filter).await?;

        Ok(OrderPage {
            orders,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn cancel(
        &self,
        order_id: i64,
        actor: Actor,
        reason: Option<String>,
    ) -> OrderResult<Order> {
        let reason = non_blank(reason)
            .or_else(|| (!actor.is_admin).then(|| DEFAULT_CANCEL_REASON.to_string()));
        let recorded_reason = reason.clone();

        let order = self
            .store
            .transaction(move |tx| Box::pin(cancel_in_tx(tx, order_id, actor, reason)))
            .await?;

        info!(
            "Order {} cancelled by {} {}",
            order.order_number,
            if actor.is_admin { "admin" } else { "user" },
            actor.id
        );
        notifier::spawn_publish(
            self.notifier.clone(),
            OrderEvent::OrderCancelled {
                order_id: order.id,
                order_number: order.order_number.clone(),
                cancelled_by: actor.id,
                reason: recorded_reason,
            },
        );

        Ok(order)
    }
}

async fn place_in_tx(
    tx: &mut dyn OrderTx,
    user_id: i64,
    order: ValidatedOrder,
    pricing: PricingConfig,
    order_numbers: OrderNumberSource,
) -> OrderResult<OrderDetails> {
    // Lines arrive sorted by book id, so concurrent orders lock books in the same order.
    let mut books = Vec::with_capacity(order.lines.len());
    let mut items = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        let book = tx
            .lock_book(line.book_id)
            .await?
            .filter(|book| book.status == BookStatus::Active)
            .ok_or_else(|| OrderError::NotFound(format!("Book {} not found", line.book_id)))?;

        if book.stock_quantity < line.quantity {
            return Err(OrderError::InsufficientStock {
                book_id: book.id,
                title: book.title,
                available: book.stock_quantity,
            });
        }

        items.push(NewOrderItem {
            book_id: book.id,
            quantity: line.quantity,
            price: money(&book.price),
            total: line_total(&book.price, line.quantity),
        });
        books.push(book);
    }

    for (item, book) in items.iter().zip(&books) {
        if !tx.decrement_stock(item.book_id, item.quantity).await? {
            let available = tx
                .lock_book(item.book_id)
                .await?
                .map_or(0, |current| current.stock_quantity);
            return Err(OrderError::InsufficientStock {
                book_id: book.id,
                title: book.title.clone(),
                available,
            });
        }
    }

    let draft = NewOrder {
        order_number: String::new(),
        user_id,
        totals: pricing.totals(items.iter().map(|item| &item.total)),
        shipping_address: order.shipping_address,
        payment_method: order.payment_method,
        notes: order.notes,
    };
    let created = insert_with_fresh_number(tx, draft, &order_numbers).await?;
    let items = tx.insert_items(created.id, &items).await?;

    Ok(OrderDetails {
        order: created,
        items,
        history: Vec::new(),
    })
}

async fn insert_with_fresh_number(
    tx: &mut dyn OrderTx,
    draft: NewOrder,
    order_numbers: &OrderNumberSource,
) -> OrderResult<Order> {
    for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
        let candidate = NewOrder {
            order_number: order_numbers(),
            ..draft.clone()
        };

        match tx.insert_order(candidate).await {
            Ok(order) => return Ok(order),
            Err(OrderError::Conflict(detail)) => {
                warn!(
                    "Order number collision (attempt {}/{}): {}",
                    attempt, MAX_ORDER_NUMBER_ATTEMPTS, detail
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(OrderError::Conflict(format!(
        "Could not allocate a unique order number after {} attempts",
        MAX_ORDER_NUMBER_ATTEMPTS
    )))
}

async fn cancel_in_tx(
    tx: &mut dyn OrderTx,
    order_id: i64,
    actor: Actor,
    reason: Option<String>,
) -> OrderResult<Order> {
    let order = tx
        .lock_order(order_id)
        .await?
        .filter(|order| actor.can_view(order))
        .ok_or_else(|| order_not_found(order_id))?;

    order.status.check_cancellable(&actor)?;

    for item in tx.order_items(order.id).await? {
        tx.increment_stock(item.book_id, item.quantity).await?;
    }

    let cancelled = tx.set_status(order.id, OrderStatus::Cancelled, None).await?;
    tx.append_history(NewStatusHistory {
        order_id: order.id,
        status: OrderStatus::Cancelled,
        changed_by: actor.id,
        notes: reason,
    })
    .await?;

    Ok(cancelled)
}

async fn update_status_in_tx(
    tx: &mut dyn OrderTx,
    order_id: i64,
    actor: Actor,
    new_status: OrderStatus,
    tracking_number: Option<String>,
    notes: Option<String>,
) -> OrderResult<(OrderStatus, Order)> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;

    // Its stock has already been released.
    if order.status == OrderStatus::Cancelled {
        return Err(OrderError::State(
            "Cannot change the status of a cancelled order".to_string(),
        ));
    }

    let updated = tx.set_status(order.id, new_status, tracking_number).await?;
    tx.append_history(NewStatusHistory {
        order_id: order.id,
        status: new_status,
        changed_by: actor.id,
        notes,
    })
    .await?;

    Ok((order.status, updated))
}

fn order_not_found(order_id: i64) -> OrderError {
    OrderError::NotFound(format!("Order {} not found", order_id))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
