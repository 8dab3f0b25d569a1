pub mod api;
pub mod config;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod notifier;
pub mod pg;
pub mod schema;
pub mod store;
