use anyhow::{Context, Result};

use cogwar::config::Config;
use cogwar::dashboard::DashboardServer;
use cogwar::metrics;
use cogwar::storage::open_repository;

// ============================================================================
// Dashboard Server
// ============================================================================

/// Start the dashboard server
///
/// `host` and `port` override the configured bind address.
pub async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    let repo = open_repository(&config.database).with_context(|| {
        format!(
            "Failed to open database {}",
            config.database.sqlite_path.display()
        )
    })?;
    let events = repo.count()?;

    let server = DashboardServer::new(config, repo).context("Failed to create dashboard server")?;
    let info = server.info();

    println!("{}", info.display());
    println!("Events: {events}");
    println!();
    println!("API Endpoints:");
    println!("  GET  /api/health   - Health check");
    println!("  GET  /api/filters  - Sources, languages, categories, date bounds");
    println!("  GET  /api/bursts   - Detected bursts");
    println!("  GET  /api/series   - Bucket series for charts");
    println!("  GET  /api/export   - CSV/JSON download (format, target)");
    println!("  GET  /metrics      - Prometheus metrics endpoint");
    println!();
    println!("Dashboard server listening on http://{}", info.bind_address);
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Dashboard server stopped.");
    Ok(())
}
