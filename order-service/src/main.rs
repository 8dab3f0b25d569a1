use anyhow::Result;
use clap::Parser;
use diesel::{Connection, PgConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use tracing::info;

use order_service::config::Args;
use order_service::handlers::OrderService;
use order_service::memory::MemoryStore;
use order_service::notifier::{KafkaNotifier, LogNotifier, Notifier};
use order_service::pg::PgStore;
use order_service::store::OrderStore;
use order_service::api;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let notifier: Arc<dyn Notifier> = match &args.kafka_brokers {
        Some(brokers) => {
            info!("Publishing order events to {} on {}", args.events_topic, brokers);
            Arc::new(KafkaNotifier::new(brokers, args.events_topic.clone())?)
        }
        None => {
            info!("No Kafka brokers configured, order events will only be logged");
            Arc::new(LogNotifier)
        }
    };

    if args.in_memory {
        info!("Using in-memory order store");
        serve(&args, Arc::new(MemoryStore::new()), notifier).await
    } else {
        // Run migrations first
        info!("Running database migrations...");
        let mut conn = PgConnection::establish(&args.database_url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
        info!("Migrations completed successfully");

        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&args.database_url);
        let pool = bb8::Pool::builder()
            .max_size(args.pool_size)
            .build(config)
            .await?;

        serve(&args, Arc::new(PgStore::new(pool)), notifier).await
    }
}

async fn serve<S: OrderStore>(args: &Args, store: Arc<S>, notifier: Arc<dyn Notifier>) -> Result<()> {
    let service = Arc::new(OrderService::new(store, args.pricing(), notifier));
    let app = api::create_router(service);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    info!("Order service web server started on port {}", args.port);
    info!("Order service ready to accept HTTP requests at http://0.0.0.0:{}/orders", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
