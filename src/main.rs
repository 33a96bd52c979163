//! Marquee - a kiosk media player with a WebSocket remote control.
//!
//! Marquee serves its control UI over plain HTTP and exposes a JSON command
//! channel at `/ws` for browsing the media library and driving playback;
//! every connected client receives the same status broadcasts.

mod api;
mod config;
mod controller;
mod error;
mod listing;
mod player;
mod protocol;
mod registry;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::AppState;
use crate::config::LogFormat;
use crate::controller::Controller;
use crate::player::LocalEngine;

/// Initialize the tracing/logging subsystem.
fn init_tracing(config: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            subscriber
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}

/// Configure CORS based on application config.
fn configure_cors(config: &config::Config) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "HEAD", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600);

    if config.cors_origins.len() == 1 && config.cors_origins[0] == "*" {
        cors = cors.allow_any_origin();
    } else {
        for origin in &config.cors_origins {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

/// Graceful shutdown handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize configuration; the one optional positional argument is the
    // browsable media root.
    let media_root = std::env::args().nth(1);
    let config = config::init(media_root);

    // Initialize logging
    init_tracing(config);

    // Validate configuration
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Configuration validation failed");
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }

    // Start the control loop
    let controller = Controller::spawn(Box::new(LocalEngine::new()), config.media_root.clone());

    // Create application state
    let app_state = AppState {
        controller: controller.clone(),
        public_dir: config.public_dir.clone(),
    };

    let bind_address = config.bind_address();

    tracing::info!(
        address = %bind_address,
        media_root = %config.media_root,
        public_dir = %config.public_dir.display(),
        "Starting Marquee server"
    );

    // Create and start server
    let server = HttpServer::new(move || {
        App::new()
            // Middleware (order matters - outermost first)
            .wrap(Logger::default())
            .wrap(configure_cors(config))
            // Shared state
            .app_data(web::Data::new(app_state.clone()))
            // WebSocket control channel
            .configure(api::ws::configure)
            // Everything else is a static asset
            .configure(api::files::configure)
    })
    .bind(&bind_address)?
    .shutdown_timeout(30)
    .run();

    // Run server with graceful shutdown
    tokio::select! {
        result = server => {
            result
        }
        _ = shutdown_signal() => {
            controller.shutdown();
            tracing::info!("Shutdown complete");
            Ok(())
        }
    }
}
