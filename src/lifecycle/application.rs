//! Application bootstrap
//!
//! Serves a [`Dispatcher`] (plus any extra axum routes) until the process is
//! asked to stop.

use super::shutdown_signal;
use crate::dispatch::Dispatcher;
use axum::Router;
use tokio::net::TcpListener;

/// A dispatcher ready to be served.
///
/// # Example
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = AppConfig::from_config(&ConfigService::new())?;
///     let dispatcher = Dispatcher::builder(config).registry(tasks()?).build();
///     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
///     Application::new(dispatcher).serve(listener).await?;
///     Ok(())
/// }
/// ```
pub struct Application {
    dispatcher: Dispatcher,
    routes: Router,
}

impl Application {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            routes: Router::new(),
        }
    }

    /// Adds routes served ahead of the dispatcher, e.g. health checks.
    pub fn merge(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The combined router; unmatched requests fall through to the dispatcher.
    pub fn router(&self) -> Router {
        self.routes.clone().merge(self.dispatcher.router())
    }

    /// Serves on `listener` until Ctrl+C or SIGTERM, then drains open connections.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
