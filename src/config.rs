// Tracker configuration: defaults, then config.toml, then TRACKER_* environment variables

use crate::error::{TrackerError, TrackerResult};
use anyhow::Result;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::collections::HashMap;

/// Placeholder substituted with the page number in `page_url_template`.
pub const PAGE_PLACEHOLDER: &str = "{}";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub catalog_url: String,
    pub page_url_template: String, // e.g. https://shop.example/shop/page/{}/
    pub snapshot_path: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub page_delay_ms: u64,
    pub max_pages: Option<u32>,
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Self::builder()?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., TRACKER_SNAPSHOT_PATH)
            .add_source(
                Environment::with_prefix("TRACKER")
                    .prefix_separator("_")
                    .separator("__"),
            );

        Self::from_builder(builder)
    }

    // Defaults only; callers layer their own sources on top
    pub fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("catalog_url", "https://yoursite.com/shop/")?
            .set_default("page_url_template", "https://www.yoursite.com/shop/page/{}/")?
            .set_default("snapshot_path", "all_products_list.xlsx")?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("request_timeout_secs", 10_i64)?
            .set_default("page_delay_ms", 1000_i64)?;
        Ok(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> TrackerResult<()> {
        if !self.page_url_template.contains(PAGE_PLACEHOLDER) {
            return Err(TrackerError::Config(format!(
                "page_url_template '{}' has no '{}' page-number placeholder",
                self.page_url_template, PAGE_PLACEHOLDER
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(TrackerError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn page_url(&self, page: u32) -> String {
        self.page_url_template.replace(PAGE_PLACEHOLDER, &page.to_string())
    }
}
