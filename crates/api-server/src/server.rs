//! API server: REST surface plus the Prometheus exporter.

use std::net::SocketAddr;

use autopilot_core::config::AppConfig;
use autopilot_engine::CampaignEngine;
use tracing::info;

use crate::rest::AppState;
use crate::router::build_router;

pub struct ApiServer {
    config: AppConfig,
    engine: CampaignEngine,
}

impl ApiServer {
    pub fn new(config: AppConfig, engine: CampaignEngine) -> Self {
        Self { config, engine }
    }

    /// Serve the REST API until the listener fails.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState::new(self.engine.clone(), self.config.node_id.clone());
        let app = build_router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Install the global metrics recorder with its own scrape listener.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.metrics.port);
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
