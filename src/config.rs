//! Store set and fetch settings.
//!
//! Both are plain values handed to the pipeline so tests can run against an
//! alternate store list or a local mock endpoint.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

pub const DEFAULT_ENDPOINT: &str = "https://www.walmart.ca/api/seo/catalog/search";
pub const DEFAULT_SITE_URL: &str = "https://www.walmart.ca";
pub const DEFAULT_QUERY: &str = "clearance";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) EconodealBot/1.0";

/// One physical Walmart location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub slug: String,
    pub name: String,
    pub city: String,
    pub postal_code: String,
    pub store_id: String,
}

impl Store {
    pub fn new(slug: &str, name: &str, city: &str, postal_code: &str, store_id: &str) -> Self {
        Self {
            slug: slug.to_owned(),
            name: name.to_owned(),
            city: city.to_owned(),
            postal_code: postal_code.to_owned(),
            store_id: store_id.to_owned(),
        }
    }
}

/// Ordered list of stores to scrape. Iteration order is output order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSet {
    pub stores: Vec<Store>,
}

impl Default for StoreSet {
    fn default() -> Self {
        Self {
            stores: vec![
                Store::new(
                    "walmart-st-jerome",
                    "Walmart Saint-Jérôme Supercentre",
                    "Saint-Jérôme",
                    "J7Y5K2",
                    "3126",
                ),
                Store::new(
                    "walmart-blainville",
                    "Walmart Blainville Supercentre",
                    "Blainville",
                    "J7C0M8",
                    "3125",
                ),
            ],
        }
    }
}

impl StoreSet {
    /// Parses a YAML document of the form `stores: [{slug, name, city, postal_code, store_id}]`.
    pub fn from_yaml(text: &str) -> Result<Self, ScrapeError> {
        let set: Self = serde_yaml::from_str(text)
            .map_err(|e| ScrapeError::Config(format!("stores file: {e}")))?;
        set.validate()?;
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScrapeError::Config(format!("cannot read stores file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Keeps only the stores whose slug is listed, in configuration order.
    /// An empty filter keeps everything.
    pub fn select(self, slugs: &[String]) -> Result<Self, ScrapeError> {
        if slugs.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = slugs
            .iter()
            .find(|slug| !self.stores.iter().any(|s| &s.slug == *slug))
        {
            return Err(ScrapeError::Config(format!("unknown store slug `{unknown}`")));
        }
        let stores = self
            .stores
            .into_iter()
            .filter(|s| slugs.contains(&s.slug))
            .collect();
        Ok(Self { stores })
    }

    /// True when `(name, city)` matches a configured store.
    pub fn contains(&self, name: &str, city: &str) -> bool {
        self.stores.iter().any(|s| s.name == name && s.city == city)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Store> {
        self.stores.iter()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    fn validate(&self) -> Result<(), ScrapeError> {
        if self.stores.is_empty() {
            return Err(ScrapeError::Config("store set is empty".into()));
        }
        for (idx, store) in self.stores.iter().enumerate() {
            if self.stores[..idx].iter().any(|s| s.slug == store.slug) {
                return Err(ScrapeError::Config(format!(
                    "duplicate store slug `{}`",
                    store.slug
                )));
            }
            if store.name.trim().is_empty() || store.city.trim().is_empty() {
                return Err(ScrapeError::Config(format!(
                    "store `{}` needs a name and a city",
                    store.slug
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a StoreSet {
    type Item = &'a Store;
    type IntoIter = std::slice::Iter<'a, Store>;

    fn into_iter(self) -> Self::IntoIter {
        self.stores.iter()
    }
}

/// Everything the fetcher needs besides the store itself.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub endpoint: String,
    /// Origin prepended to site-relative product links.
    pub site_url: String,
    pub query: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Wait before the n-th retry is `backoff_base * 2^(n-1)`.
    pub backoff_base: Duration,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            site_url: DEFAULT_SITE_URL.to_owned(),
            query: DEFAULT_QUERY.to_owned(),
            page_size: 24,
            max_pages: 2,
            delay: Duration::from_millis(1500),
            timeout: Duration::from_secs(20),
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_covers_both_locations() {
        let set = StoreSet::default();
        let cities: Vec<&str> = set.iter().map(|s| s.city.as_str()).collect();
        assert_eq!(cities, ["Saint-Jérôme", "Blainville"]);
        assert!(set.contains("Walmart Blainville Supercentre", "Blainville"));
        assert!(!set.contains("Walmart Blainville Supercentre", "Saint-Jérôme"));
    }

    #[test]
    fn select_keeps_configuration_order() {
        let slugs = vec!["walmart-blainville".to_owned()];
        let set = StoreSet::default().select(&slugs).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.stores[0].store_id, "3125");
    }

    #[test]
    fn select_rejects_unknown_slug() {
        let slugs = vec!["walmart-laval".to_owned()];
        let err = StoreSet::default().select(&slugs).unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)), "got {err:?}");
    }

    #[test]
    fn loads_yaml_store_file() {
        let yaml = r"
stores:
  - slug: walmart-mirabel
    name: Walmart Mirabel
    city: Mirabel
    postal_code: J7J0T8
    store_id: '1234'
";
        let set = StoreSet::from_yaml(yaml).unwrap();
        assert_eq!(set.stores, vec![Store::new(
            "walmart-mirabel",
            "Walmart Mirabel",
            "Mirabel",
            "J7J0T8",
            "1234"
        )]);
    }

    #[test]
    fn rejects_duplicate_slugs() {
        let yaml = r"
stores:
  - {slug: a, name: A, city: X, postal_code: P, store_id: '1'}
  - {slug: a, name: B, city: Y, postal_code: Q, store_id: '2'}
";
        assert!(StoreSet::from_yaml(yaml).is_err());
    }

    #[test]
    fn rejects_empty_store_file() {
        assert!(StoreSet::from_yaml("stores: []").is_err());
    }
}
