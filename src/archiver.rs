use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::Store;
use crate::error::ScrapeError;
use crate::models::{Item, OutputDocument};

/// Merges per-store item lists in arrival order, keeping the first
/// occurrence of each listing.
#[derive(Debug, Default)]
pub struct Aggregator {
    items: Vec<Item>,
    seen: HashSet<(String, String)>,
    duplicates: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one store's items. Listings are identified by sku, then url,
    /// then title, scoped to the store.
    pub fn extend_store(&mut self, store: &Store, items: Vec<Item>) {
        for item in items {
            let identity = item
                .sku
                .clone()
                .or_else(|| item.url.clone())
                .unwrap_or_else(|| item.title.clone());
            if self.seen.insert((store.slug.clone(), identity)) {
                self.items.push(item);
            } else {
                tracing::debug!(store = %store.slug, title = %item.title, "duplicate listing dropped");
                self.duplicates += 1;
            }
        }
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

/// Writes `document` as pretty JSON to `path`, replacing it atomically.
///
/// The JSON goes to `<path>.tmp` first and is renamed over `path`, so a
/// failed run leaves any previous file intact.
pub fn save_to_file(document: &OutputDocument, path: &Path) -> Result<(), ScrapeError> {
    let json = serde_json::to_string_pretty(document).map_err(ScrapeError::Serialize)?;
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| ScrapeError::Write { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err(parent))?;
    }

    let tmp = tmp_path(path);
    let result = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()
        })
        .map_err(write_err(&tmp))
        .and_then(|()| fs::rename(&tmp, path).map_err(write_err(path)));

    if result.is_err() && tmp.is_file() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    tracing::info!(path = %path.display(), items = document.items.len(), "output written");
    Ok(())
}

/// Writes `document` as pretty JSON to an arbitrary sink (stdout for demo runs).
pub fn write_to<W: Write>(document: &OutputDocument, mut out: W) -> Result<(), ScrapeError> {
    let to_write_err = |source: io::Error| ScrapeError::Write {
        path: PathBuf::from("<stdout>"),
        source,
    };
    serde_json::to_writer_pretty(&mut out, document).map_err(ScrapeError::Serialize)?;
    out.write_all(b"\n").map_err(to_write_err)?;
    out.flush().map_err(to_write_err)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}
