#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use order_service::handlers::OrderService;
use order_service::memory::MemoryStore;
use order_service::notifier::Notifier;
use shared::*;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CUSTOMER: i64 = 42;
pub const OTHER_CUSTOMER: i64 = 43;
pub const ADMIN: i64 = 1;

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("valid decimal literal")
}

pub fn book(id: i64, title: &str, price: &str, stock_quantity: i32) -> Book {
    Book {
        id,
        title: title.to_string(),
        price: dec(price),
        stock_quantity,
        status: BookStatus::Active,
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        street: "221B Baker Street".to_string(),
        city: "London".to_string(),
        state: "Greater London".to_string(),
        postal_code: "NW1 6XE".to_string(),
        country: "UK".to_string(),
    }
}

pub fn request(lines: &[(i64, i32)]) -> OrderRequest {
    OrderRequest {
        items: lines
            .iter()
            .map(|&(book_id, quantity)| OrderLine { book_id, quantity })
            .collect(),
        shipping_address: address(),
        payment_method: "card".to_string(),
        notes: None,
    }
}

/// Keeps every published event for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Publishing happens on a spawned task, so give it a moment to land.
    pub async fn wait_for(&self, count: usize) -> Vec<OrderEvent> {
        for _ in 0..100 {
            if self.events.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, event: &OrderEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn publish(&self, _event: &OrderEvent) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("mail server unreachable"))
    }
}

pub fn service_with(
    books: Vec<Book>,
    notifier: Arc<dyn Notifier>,
) -> OrderService<MemoryStore> {
    OrderService::new(
        Arc::new(MemoryStore::with_books(books)),
        PricingConfig::default(),
        notifier,
    )
}

pub fn service(books: Vec<Book>) -> OrderService<MemoryStore> {
    service_with(books, Arc::new(RecordingNotifier::default()))
}

pub async fn stock_of(service: &OrderService<MemoryStore>, book_id: i64) -> i32 {
    service
        .store()
        .book(book_id)
        .await
        .expect("book exists")
        .stock_quantity
}
