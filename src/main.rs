use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod extract;
mod fetcher;
mod models;
mod reconcile;
mod store;
mod tracker;

use crate::error::TrackerError;

const SAMPLE_ROWS: usize = 5;

// Optional proxyconfig.json next to the binary's working directory
#[derive(Deserialize, Debug)]
struct ProxyConfig {
    http_proxy: Option<String>,
    https_proxy: Option<String>,
}

// Exports proxy settings so the reqwest client picks them up from the environment
fn load_and_set_proxy_env_vars(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        tracing::debug!(
            "{} not found, skipping proxy environment variable setup.",
            config_path.display()
        );
        return Ok(());
    }

    tracing::info!("Found {}, loading proxy settings...", config_path.display());
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let proxy_config: ProxyConfig = serde_json::from_str(&config_content)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    let proxies = [
        ("HTTP_PROXY", proxy_config.http_proxy),
        ("HTTPS_PROXY", proxy_config.https_proxy),
    ];
    for (var, value) in proxies {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            // SAFETY: called at the start of main, before the runtime spawns worker tasks
            // that could read the environment concurrently.
            unsafe { env::set_var(var, value) };
            tracing::info!("Set {} environment variable from config.", var);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "shop_tracker=info".into()))
        .with(fmt::layer())
        .init();

    if let Err(e) = load_and_set_proxy_env_vars(Path::new("proxyconfig.json")) {
        // Proxy is optional; a broken file should not stop the run
        tracing::warn!("Failed to load or apply proxy configuration: {:#}", e);
    }

    let settings = match config::Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    // Built after the proxy env vars are set
    let client = fetcher::build_client(&settings)?;

    match tracker::run(&settings, &client).await {
        Ok(summary) => {
            tracing::info!(
                total = summary.snapshot.len(),
                new = summary.new_products,
                updated = summary.updated_products,
                dropped = summary.dropped_products,
                failed_pages = summary.pages_failed,
                "Product list updated successfully."
            );
            if summary.prior_ignored {
                tracing::warn!("Previous snapshot was malformed and has been replaced.");
            }
            for record in summary.snapshot.records().iter().take(SAMPLE_ROWS) {
                tracing::info!(
                    name = %record.name,
                    price = %record.price,
                    updated = %record.observed_at_text(),
                    "Sample row"
                );
            }
        }
        Err(TrackerError::NoData) => {
            tracing::warn!("No products found; existing snapshot left untouched.");
        }
        Err(e) => {
            tracing::error!(error = %e, "Tracking run failed");
        }
    }

    Ok(())
}
