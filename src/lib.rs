pub mod archiver;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod pipeline;

pub use config::{FetchSettings, Store, StoreSet};
pub use error::{ErrorKind, ScrapeError};
pub use fetcher::{HttpSource, PageSource, Pages, RawPage};
pub use models::{Discount, Item, OutputDocument};
