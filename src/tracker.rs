// One tracking run: walk the catalog pages, reconcile against the prior
// snapshot and persist the result.

use crate::{
    config::Settings,
    error::{TrackerError, TrackerResult},
    extract,
    fetcher,
    models::{ProductRecord, Snapshot},
    reconcile::{Reconciliation, reconcile},
    store::{SnapshotStore, store_for_path},
};
use chrono::{Local, NaiveDateTime, Timelike};
use reqwest::Client;
use tokio::time::{Duration, sleep};

/// Records gathered across pages. Failed pages contribute nothing but are counted.
#[derive(Debug, Default)]
pub struct Batch {
    pub records: Vec<ProductRecord>,
    pub pages_attempted: u32,
    pub pages_failed: u32,
}

impl Batch {
    pub fn absorb(mut self, page: u32, outcome: TrackerResult<Vec<ProductRecord>>) -> Self {
        self.pages_attempted += 1;
        match outcome {
            Ok(records) => {
                tracing::info!(page, count = records.len(), "Page extracted");
                self.records.extend(records);
            }
            Err(e) => {
                tracing::error!(page, error = %e, "Page failed; continuing without it");
                self.pages_failed += 1;
            }
        }
        self
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub snapshot: Snapshot,
    pub pages_attempted: u32,
    pub pages_failed: u32,
    pub new_products: usize,
    pub updated_products: usize,
    pub dropped_products: usize,
    pub prior_ignored: bool,
}

impl RunSummary {
    fn new(batch: &Batch, reconciliation: Reconciliation) -> Self {
        Self {
            pages_attempted: batch.pages_attempted,
            pages_failed: batch.pages_failed,
            new_products: reconciliation.new_names.len(),
            updated_products: reconciliation.known_names.len(),
            dropped_products: reconciliation.dropped_names.len(),
            prior_ignored: reconciliation.fell_back,
            snapshot: reconciliation.snapshot,
        }
    }
}

// Scrape clock, truncated to whole seconds
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

// Missing or unreadable snapshots both mean "first run"
fn load_prior(store: &dyn SnapshotStore) -> Option<Snapshot> {
    match store.load() {
        Ok(Some(snapshot)) if snapshot.is_empty() => {
            tracing::info!(path = %store.path().display(), "Previous snapshot has no rows");
            Some(snapshot)
        }
        Ok(Some(snapshot)) => {
            tracing::info!(
                path = %store.path().display(),
                products = snapshot.len(),
                "Found previous snapshot"
            );
            Some(snapshot)
        }
        Ok(None) => {
            tracing::info!(path = %store.path().display(), "No previous snapshot; starting fresh");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not read previous snapshot; treating as absent");
            None
        }
    }
}

async fn scrape_page(client: &Client, url: &str) -> TrackerResult<Vec<ProductRecord>> {
    let html = fetcher::fetch_page(client, url).await?;
    Ok(extract::extract_products(&html, now()))
}

/// Fetches every catalog page in order and returns the accumulated batch.
pub async fn collect_batch(settings: &Settings, client: &Client) -> Batch {
    let first = fetcher::fetch_page(client, &settings.catalog_url).await;

    // The first page drives pagination discovery and is extracted from the same body
    let discovered = first.as_ref().map(|html| extract::total_pages(html)).unwrap_or(1);
    let total_pages = match settings.max_pages {
        Some(cap) if cap >= 1 && cap < discovered => {
            tracing::info!(discovered, cap, "Capping page count");
            cap
        }
        _ => discovered,
    };
    tracing::info!(total_pages, "Catalog pagination discovered");

    tracing::info!(page = 1, total_pages, "Extracting page");
    let first_records = first.map(|html| extract::extract_products(&html, now()));
    let mut batch = Batch::default().absorb(1, first_records);

    for page in 2..=total_pages {
        sleep(Duration::from_millis(settings.page_delay_ms)).await;
        tracing::info!(page, total_pages, "Extracting page");
        let url = settings.page_url(page);
        batch = batch.absorb(page, scrape_page(client, &url).await);
    }

    batch
}

/// Runs one full tracking pass.
///
/// Returns `TrackerError::NoData` without touching the stored snapshot when
/// no page yielded a product.
pub async fn run(settings: &Settings, client: &Client) -> TrackerResult<RunSummary> {
    let store = store_for_path(&settings.snapshot_path);
    let prior = load_prior(store.as_ref());

    let mut batch = collect_batch(settings, client).await;
    tracing::info!(
        records = batch.records.len(),
        pages = batch.pages_attempted,
        failed = batch.pages_failed,
        "Catalog scan finished"
    );

    if batch.records.is_empty() {
        return Err(TrackerError::NoData);
    }

    let records = std::mem::take(&mut batch.records);
    let reconciliation = reconcile(records, prior.as_ref());

    tracing::info!(path = %store.path().display(), "Saving snapshot");
    store.save(&reconciliation.snapshot)?;

    Ok(RunSummary::new(&batch, reconciliation))
}
