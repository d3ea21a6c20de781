//! Sentra - email campaign platform entry point

use anyhow::Result;
use sentra_api::AppState;
use sentra_common::config::{Config, LoggingConfig};
use sentra_core::{
    CampaignDispatcher, ContentClient, FanOut, SchedulePoller, SendWorker, SmtpMailer,
};
use sentra_storage::db::DatabasePool;
use sentra_storage::repository::{
    CampaignRepository, EventRepository, LinkMappingRepository, ScheduleRepository,
    SegmentRepository, SendJobRepository, SuppressionRepository,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Sentra...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    let pool = db_pool.pool().clone();
    let campaigns = CampaignRepository::new(pool.clone());
    let segments = SegmentRepository::new(pool.clone());
    let send_jobs = SendJobRepository::new(pool.clone());
    let events = EventRepository::new(pool.clone());
    let schedules = ScheduleRepository::new(pool.clone());
    let links = LinkMappingRepository::new(pool.clone());
    let suppressions = SuppressionRepository::new(pool.clone());

    // Campaign engine
    let fanout = FanOut::new(
        campaigns.clone(),
        segments.clone(),
        send_jobs.clone(),
        suppressions.clone(),
    );
    let dispatcher = CampaignDispatcher::new(campaigns.clone(), schedules.clone(), fanout.clone());

    // Send worker draining the delivery queue
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let worker = SendWorker::new(
        send_jobs.clone(),
        campaigns.clone(),
        events.clone(),
        links.clone(),
        mailer,
        &config.tracking,
        &config.queue,
    )?;
    let worker_handle = tokio::spawn(async move {
        worker.run().await;
    });

    // Schedule poller firing due triggers and sweeping completions
    let poller = SchedulePoller::new(schedules, campaigns, send_jobs, links, fanout)
        .with_poll_interval(config.queue.poll_interval_secs);
    let poller_handle = tokio::spawn(async move {
        poller.run().await;
    });

    // Content assist client
    let ai = Arc::new(ContentClient::new(config.ai.clone())?);
    if ai.is_enabled() {
        info!("AI content assist enabled");
    }

    // HTTP API
    let state = Arc::new(AppState {
        db_pool,
        config: config.clone(),
        dispatcher,
        ai,
    });
    let bind = format!("{}:{}", config.server.bind_address, config.server.port);

    let api_handle = tokio::spawn(async move {
        let app = sentra_api::create_router(state);
        let listener = match tokio::net::TcpListener::bind(&bind).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Failed to bind API server on {}: {}", bind, e);
                return;
            }
        };
        info!("API server listening on {}", bind);
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("Sentra started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    api_handle.abort();
    worker_handle.abort();
    poller_handle.abort();

    info!("Sentra shutdown complete");

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sentra=debug", logging.level)));

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}
