//! Mint backend binary.
//!
//! Loads configuration, assembles the workflow and runs the listener,
//! fulfiller and HTTP server until shutdown.

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use mint_backend::api::{self, AppState};
use mint_backend::config::AppConfig;
use mint_backend::coordinator::HmacCoordinator;
use mint_backend::listener::{self, ChannelSink};
use mint_backend::metrics::Metrics;
use mint_backend::{ServiceWorkflow, fulfiller};
use random_mint::{InMemoryLedger, InMemoryPendingStore, MintSettings, RarityTable, Requester};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,actix_web=warn,actix_server=warn")),
        )
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    info!(
        collection = %config.collection_name,
        symbol = %config.collection_symbol,
        owner = %config.collection_owner,
        mint_fee = %config.mint_fee,
        "Starting mint backend"
    );

    let coordinator = Arc::new(HmacCoordinator::new(
        config.hmac_secret.clone(),
        config.key_hash,
        config.oracle_fee,
    ));
    coordinator.fund_subscription(config.subscription_fund_amount);
    info!(
        fee = %coordinator.fee(),
        balance = %coordinator.subscription_balance(),
        "Coordinator subscription funded"
    );

    let rarity = RarityTable::new(&config.rarity_bounds, config.rarity_table_size)
        .context("invalid rarity table")?;
    if config.token_uris.len() < rarity.category_count() {
        anyhow::bail!(
            "TOKEN_URIS has {} entries but the rarity table has {} categories",
            config.token_uris.len(),
            rarity.category_count()
        );
    }

    let ledger = InMemoryLedger::new(
        config.collection_name.clone(),
        config.collection_symbol.clone(),
        config.token_uris.clone(),
    );
    let (sink, event_rx) = ChannelSink::channel();

    let workflow: Arc<ServiceWorkflow> = Arc::new(
        ServiceWorkflow::new(
            coordinator.clone(),
            InMemoryPendingStore::new(),
            ledger,
            sink,
            rarity,
            MintSettings {
                mint_fee: config.mint_fee,
                owner: Requester::new(config.collection_owner.clone()),
            },
        )
        .context("failed to build mint workflow")?,
    );

    let metrics = Arc::new(Metrics::new());
    let in_flight = Arc::new(AtomicU64::new(0));
    let (delivery_tx, delivery_rx) = mpsc::channel(config.channel_capacity);

    // Background: turn registered requests into oracle deliveries.
    let listener_metrics = metrics.clone();
    let delay = Duration::from_millis(config.fulfillment_delay_ms);
    tokio::spawn(async move {
        listener::run_oracle_listener(coordinator, event_rx, delivery_tx, delay, listener_metrics)
            .await;
    });

    // Background: feed deliveries back into the workflow.
    let fulfiller_workflow = workflow.clone();
    let fulfiller_in_flight = in_flight.clone();
    let fulfiller_metrics = metrics.clone();
    let concurrency = config.fulfillment_concurrency;
    tokio::spawn(async move {
        fulfiller::run_fulfiller(
            fulfiller_workflow,
            delivery_rx,
            fulfiller_in_flight,
            fulfiller_metrics,
            concurrency,
        )
        .await;
    });

    let state = web::Data::new(AppState {
        workflow,
        metrics,
        in_flight,
    });

    let addr = config.bind_addr();
    info!(%addr, "Starting HTTP server");

    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
        .bind(&addr)?
        .run()
        .await?;

    Ok(())
}
