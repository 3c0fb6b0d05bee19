//! # Webhook Relay Server
//!
//! Standalone relay service: receives webhooks over HTTP, dispatches them to
//! handlers, and forwards configured endpoints to other services.

mod config;
mod logging;

pub use config::{
    ConfigError, ForwardConfig, PORT_ENV, ReceiverConfig, RelayConfig, SECRET_ENV, SenderSettings, ServerConfig,
    load_config,
};
pub use logging::init_tracing;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use webhook_relay::{WebhookError, WebhookReceiver, WebhookSender};
use webhook_relay_axum::relay_routes;
use webhook_relay_sdk::{ForwardTarget, ReceiverBuilder};

/// Server error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Logging error: {0}")]
    Logging(String),
}

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    pub config: RelayConfig,
    receiver: Arc<WebhookReceiver>,
    sender: Arc<WebhookSender>,
}

impl RelayServer {
    /// Creates a server with only the configured forwarding handlers.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        Self::with_handlers(config, ReceiverBuilder::new())
    }

    /// Creates a server from a builder carrying application handlers.
    ///
    /// The configured secret, when set, replaces the builder's; a forward
    /// entry replaces a handler on the same endpoint.
    pub fn with_handlers(config: RelayConfig, builder: ReceiverBuilder) -> Result<Self, ServerError> {
        config.validate()?;

        let sender = Arc::new(WebhookSender::new(config.sender.to_sender_config())?);

        let mut builder = builder;
        if let Some(secret) = &config.receiver.secret {
            builder = builder.secret(secret.clone());
        }
        for forward in &config.forward {
            let mut target = ForwardTarget::new(forward.endpoint.trim_matches('/')).urls(forward.urls.iter().cloned());
            if let Some(secret) = &forward.secret {
                target = target.secret(secret.clone());
            }
            builder = builder.forward(target, sender.clone());
        }

        Ok(Self {
            config,
            receiver: Arc::new(builder.build()),
            sender,
        })
    }

    /// Returns the receiver.
    pub fn receiver(&self) -> &Arc<WebhookReceiver> {
        &self.receiver
    }

    /// Returns the shared sender.
    pub fn sender(&self) -> &Arc<WebhookSender> {
        &self.sender
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> Router {
        relay_routes(self.receiver.clone())
            .layer(DefaultBodyLimit::max(self.config.server.body_limit_bytes))
            .layer(TraceLayer::new_for_http())
    }

    /// Binds the configured address and serves until Ctrl+C.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.server.bind_address()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = listener.local_addr()?;
        info!(address = %address, "Webhook relay listening");
        info!(
            endpoints = ?self.receiver.registry().endpoints(),
            secret_required = self.receiver.requires_secret(),
            "Registered handlers"
        );
        info!("Webhook URL: http://{}/webhook/<endpoint>", address);

        axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Webhook relay stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
