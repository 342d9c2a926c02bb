use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use storefront_delivery as api;
use api::repositories::DeliveryRepository;
use api::services::delivery::{DeliveryService, MockDeliveryProvider, ShipmentLedger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool)
            .await
            .context("failed running migrations")?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Provider registry; the mock reads shipments straight from the database
    let deliveries = Arc::new(DeliveryRepository::new(db_arc.clone()));
    let ledger: Arc<dyn ShipmentLedger> = deliveries.clone();
    let mut delivery = DeliveryService::from_store(&cfg.delivery.store);
    delivery.register_provider(
        MockDeliveryProvider::NAME,
        Arc::new(MockDeliveryProvider::new(
            cfg.delivery.mock_display_name.clone(),
            ledger,
        )),
    );
    delivery
        .set_default_provider(&cfg.delivery.provider)
        .context("invalid delivery.provider setting")?;

    let cfg = Arc::new(cfg);
    let app_state = api::AppState::new(
        db_arc,
        cfg.clone(),
        event_sender,
        Arc::new(delivery),
        deliveries,
    );

    let app = api::app(app_state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, environment = %cfg.environment, "storefront-delivery listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
