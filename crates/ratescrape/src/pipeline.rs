use std::collections::HashSet;

use crate::browser::BrowserDriver;
use crate::fetch::PageFetcher;
use crate::parser::{RelayStoreExtractor, StateExtractor};
use crate::scraper::{LinkScraper, RatingScraper, ScraperError};
use crate::store::{ProfessorStore, StoreError, upsert_professor};
use crate::types::{ProfessorLink, ProfessorRecord};
use crate::utils::RunStats;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Store is unreachable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("Link scraping failed: {0}")]
    Scrape(#[from] ScraperError),
}

/// Runs the search page → profile pages → table pipeline, one professor at
/// a time.
pub struct Harvester<F, S, E = RelayStoreExtractor> {
    links: LinkScraper,
    ratings: RatingScraper<F, E>,
    store: S,
    search_url: String,
}

impl<F: PageFetcher, S: ProfessorStore> Harvester<F, S> {
    pub fn new(fetcher: F, store: S, search_url: impl Into<String>) -> Self {
        Self::with_scrapers(LinkScraper::new(), RatingScraper::new(fetcher), store, search_url)
    }
}

impl<F: PageFetcher, S: ProfessorStore, E: StateExtractor> Harvester<F, S, E> {
    pub fn with_scrapers(
        links: LinkScraper,
        ratings: RatingScraper<F, E>,
        store: S,
        search_url: impl Into<String>,
    ) -> Self {
        Self {
            links,
            ratings,
            store,
            search_url: search_url.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads one row to make sure the store answers.
    pub async fn verify_store(&self) -> Result<(), HarvestError> {
        match self.store.probe().await {
            Ok(sample) => {
                log::info!("Successfully connected to the store");
                log::debug!("Sample data: {:?}", sample);
                Ok(())
            }
            Err(e) => {
                log::error!("Error connecting to the store: {}", e);
                Err(HarvestError::StoreUnavailable(e))
            }
        }
    }

    /// Verifies the store, then harvests. Nothing is scraped when the store
    /// does not answer.
    pub async fn run<D: BrowserDriver>(&self, driver: &mut D) -> Result<RunStats, HarvestError> {
        self.verify_store().await?;
        self.harvest(driver).await
    }

    /// Scrapes every professor link, then stores each professor that has
    /// rating data. Per-professor failures are logged and counted, never
    /// fatal.
    pub async fn harvest<D: BrowserDriver>(
        &self,
        driver: &mut D,
    ) -> Result<RunStats, HarvestError> {
        let professors = self.links.scrape_links(driver, &self.search_url).await?;
        let mut stats = RunStats {
            scraped: professors.len(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        for professor in &professors {
            if !seen.insert(professor.name.as_str()) {
                stats.duplicates += 1;
                log::warn!(
                    "Professor name '{}' appears more than once; {} overwrites the earlier entry",
                    professor.name,
                    professor.profile_url
                );
            }
            self.process(professor, &mut stats).await;
        }

        log::info!("Completed scraping and storing professor data.");
        Ok(stats)
    }

    async fn process(&self, professor: &ProfessorLink, stats: &mut RunStats) {
        log::info!("Fetching ratings for {}", professor.name);

        let distribution = match self.ratings.fetch_distribution(&professor.profile_url).await {
            Ok(Some(distribution)) => distribution,
            Ok(None) => {
                log::info!("No rating distributions found for {}", professor.name);
                stats.missing += 1;
                return;
            }
            Err(e) => {
                log::error!("Error fetching ratings for {}: {}", professor.name, e);
                stats.failed += 1;
                return;
            }
        };

        let record = ProfessorRecord::new(professor, &distribution);
        match upsert_professor(&self.store, &record).await {
            Ok(outcome) => {
                log::info!("Stored ratings for {} ({:?})", professor.name, outcome);
                stats.record_upsert(outcome);
            }
            Err(e) => {
                log::error!("Error storing data for {}: {}", professor.name, e);
                stats.failed += 1;
            }
        }
    }
}
