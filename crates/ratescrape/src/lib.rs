pub mod browser;
pub mod fetch;
pub mod parser;
pub mod pipeline;
pub mod scraper;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

pub use browser::{BrowserOptions, ChromeSession};
pub use fetch::HttpFetcher;
pub use pipeline::{HarvestError, Harvester};
pub use scraper::{LinkScraper, RatingScraper};
pub use store::{StoreConfig, SupabaseStore};

pub(crate) const BASE_URL: &str = "https://www.ratemyprofessors.com";

/// Search results for department 11 at school 971.
pub const DEFAULT_SEARCH_URL: &str =
    "https://www.ratemyprofessors.com/search/professors/971?q=*&did=11";
