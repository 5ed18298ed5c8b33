use std::time::Duration;

use crate::browser::{BrowserDriver, BrowserError, Locator};
use crate::fetch::{FetchError, PageFetcher};
use crate::parser::{
    ParseError, RelayStoreExtractor, StateExtractor, find_rating_distribution,
    parse_professor_cards,
};
use crate::types::{ProfessorLink, RatingDistribution};

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Browser error: {0}")]
    BrowserError(#[from] BrowserError),
    #[error("HTTP request failed: {0}")]
    FetchError(#[from] FetchError),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

pub(crate) const COOKIE_CONSENT_BUTTON: Locator =
    Locator::XPath("//div[starts-with(@class, 'FullPageModal__')]//button");
pub(crate) const AD_CLOSE_BUTTON: Locator = Locator::XPath("//a[@id='bx-close-inside-1177612']");
pub(crate) const SHOW_MORE_BUTTON: Locator = Locator::XPath("//button[text()='Show More']");

const SCROLL_PAST_HEADER_JS: &str = "window.scrollBy(0, -500);";

/// Waits and limits used while driving the search page.
#[derive(Debug, Clone)]
pub struct ScrapeTimings {
    pub page_load: Duration,
    pub cookie_wait: Duration,
    pub ad_wait: Duration,
    /// Pause before each lookup of the "Show More" button.
    pub load_more_pause: Duration,
    /// Back-off after a click lands on an overlay.
    pub blocked_backoff: Duration,
    /// Consecutive blocked clicks tolerated before pagination gives up.
    pub max_blocked_clicks: u32,
}

impl Default for ScrapeTimings {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(300),
            cookie_wait: Duration::from_secs(10),
            ad_wait: Duration::from_secs(5),
            load_more_pause: Duration::from_millis(500),
            blocked_backoff: Duration::from_secs(2),
            max_blocked_clicks: 10,
        }
    }
}

/// Collects professor cards from a search results page.
#[derive(Debug, Clone)]
pub struct LinkScraper {
    origin: String,
    timings: ScrapeTimings,
}

impl Default for LinkScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkScraper {
    pub fn new() -> Self {
        Self {
            origin: crate::BASE_URL.to_string(),
            timings: ScrapeTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: ScrapeTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub async fn scrape_links<D: BrowserDriver>(
        &self,
        driver: &mut D,
        url: &str,
    ) -> Result<Vec<ProfessorLink>, ScraperError> {
        log::info!("Starting professor link scraping...");
        driver.navigate(url, self.timings.page_load).await?;

        match self
            .dismiss_overlay(driver, COOKIE_CONSENT_BUTTON, self.timings.cookie_wait)
            .await
        {
            Ok(()) => log::info!("Dismissed cookie popup"),
            Err(e) => log::info!("No cookie popup found: {}", e),
        }
        match self
            .dismiss_overlay(driver, AD_CLOSE_BUTTON, self.timings.ad_wait)
            .await
        {
            Ok(()) => log::info!("Closed ad popup"),
            Err(e) => log::info!("Ad popup not found or already closed: {}", e),
        }

        let pages = self.load_all_results(driver).await?;
        log::debug!("Expanded results {} time(s)", pages);

        let html = driver.page_source().await?;
        let links = parse_professor_cards(&html, &self.origin)?;
        log::info!("Scraped {} professor links.", links.len());
        Ok(links)
    }

    async fn dismiss_overlay<D: BrowserDriver>(
        &self,
        driver: &mut D,
        locator: Locator,
        wait: Duration,
    ) -> Result<(), BrowserError> {
        let button = driver.wait_until_clickable(locator, wait).await?;
        driver.click(&button).await
    }

    /// Clicks "Show More" until it disappears. Returns the number of
    /// successful clicks.
    async fn load_all_results<D: BrowserDriver>(&self, driver: &mut D) -> Result<u32, ScraperError> {
        let mut clicks = 0;
        let mut blocked = 0;

        loop {
            tokio::time::sleep(self.timings.load_more_pause).await;

            let button = match driver.find(SHOW_MORE_BUTTON).await {
                Ok(button) => button,
                Err(BrowserError::NoSuchElement(_)) => {
                    log::info!("No more 'Show More' button found.");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            driver.scroll_into_view(&button).await?;
            driver.execute_script(SCROLL_PAST_HEADER_JS).await?;

            match driver.click(&button).await {
                Ok(()) => {
                    clicks += 1;
                    blocked = 0;
                    log::info!("Clicked 'Show More' button");
                }
                Err(BrowserError::ClickIntercepted(_)) => {
                    blocked += 1;
                    if blocked >= self.timings.max_blocked_clicks {
                        log::warn!(
                            "'Show More' blocked {} times in a row, continuing with loaded results",
                            blocked
                        );
                        break;
                    }
                    log::warn!("Element is blocked by another element (likely an ad).");
                    tokio::time::sleep(self.timings.blocked_backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(clicks)
    }
}

/// Fetches profile pages over plain HTTP and reads their rating
/// distribution from the embedded page state.
#[derive(Debug, Clone)]
pub struct RatingScraper<F, E = RelayStoreExtractor> {
    fetcher: F,
    extractor: E,
}

impl<F: PageFetcher> RatingScraper<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            extractor: RelayStoreExtractor,
        }
    }
}

impl<F: PageFetcher, E: StateExtractor> RatingScraper<F, E> {
    pub fn with_extractor(fetcher: F, extractor: E) -> Self {
        Self { fetcher, extractor }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// `Ok(None)` means the page carries no distribution, which is normal.
    pub async fn fetch_distribution(
        &self,
        url: &str,
    ) -> Result<Option<RatingDistribution>, ScraperError> {
        log::debug!("Fetching profile: {}", url);
        let page = self.fetcher.get(url).await?;
        if !page.is_success() {
            log::warn!("Profile {} returned status {}", url, page.status);
        }

        let Some(state) = self.extractor.extract(&page.body) else {
            return Ok(None);
        };
        Ok(find_rating_distribution(&state))
    }
}
