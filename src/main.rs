use std::{net::SocketAddr, sync::Arc};

use axum::{http::HeaderValue, routing::get, Router};
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use storefront_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db = api::db::establish_connection(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db).await?;
    }
    let db = Arc::new(db);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Aggregate app services used by HTTP handlers
    let cfg = Arc::new(cfg);
    let services = api::handlers::AppServices::new(
        db.clone(),
        Arc::new(event_sender.clone()),
        cfg.clone(),
    );

    let app_state = Arc::new(api::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        services,
    });

    // Build CORS layer from config
    let cors_layer = match cfg.cors_allowed_origins.as_deref() {
        Some(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    let app = Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .nest("/api/v1", api::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
