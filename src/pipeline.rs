//! Store-by-store scrape: fetch pages, normalize entries, merge.

use crate::archiver::Aggregator;
use crate::config::{FetchSettings, Store, StoreSet};
use crate::fetcher::{PageSource, Pages};
use crate::models::{Item, OutputDocument};
use crate::parser;

/// Counters reported in the end-of-run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub pages_fetched: usize,
    pub entries_skipped: usize,
    pub duplicates: usize,
    /// Slugs of stores whose pagination ended on a fetch error.
    pub failed_stores: Vec<String>,
}

#[derive(Debug)]
pub struct Collected {
    pub document: OutputDocument,
    pub stats: RunStats,
}

/// Scrapes every store in configuration order.
///
/// Fetch and entry errors never abort the run: a failing store keeps whatever
/// pages it produced before the error and the next store is tried.
pub fn scrape<S: PageSource + ?Sized>(
    source: &S,
    stores: &StoreSet,
    settings: &FetchSettings,
) -> Collected {
    let mut aggregator = Aggregator::new();
    let mut stats = RunStats::default();

    for store in stores {
        let span = tracing::info_span!("store", slug = %store.slug);
        let _guard = span.enter();
        let items = scrape_store(source, store, settings, &mut stats);
        aggregator.extend_store(store, items);
    }

    stats.duplicates = aggregator.duplicates();
    let document = OutputDocument::new(
        &settings.site_url,
        &settings.query,
        stores,
        aggregator.into_items(),
    );
    Collected { document, stats }
}

fn scrape_store<S: PageSource + ?Sized>(
    source: &S,
    store: &Store,
    settings: &FetchSettings,
    stats: &mut RunStats,
) -> Vec<Item> {
    let mut items = Vec::new();
    for page in Pages::new(source, store, settings) {
        let page = match page {
            Ok(page) => page,
            Err(err) => {
                tracing::error!(city = %store.city, error = %err, "fetch failed, skipping rest of store");
                stats.failed_stores.push(store.slug.clone());
                break;
            }
        };
        stats.pages_fetched += 1;

        let parsed = parser::parse_page(&page.entries, store, page.number, &settings.site_url);
        stats.entries_skipped += parsed.skipped.len();
        tracing::info!(
            city = %store.city,
            page = page.number,
            entries = page.entries.len(),
            kept = parsed.items.len(),
            "page collected"
        );
        items.extend(parsed.items);
    }
    items
}
