//! In-memory stand-ins for the browser, HTTP and the table store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::browser::{BrowserDriver, BrowserError, Locator};
use crate::fetch::{FetchError, FetchedPage, PageFetcher};
use crate::scraper::{AD_CLOSE_BUTTON, COOKIE_CONSENT_BUTTON, SHOW_MORE_BUTTON, ScrapeTimings};
use crate::store::{ProfessorStore, StoreError};
use crate::types::ProfessorRecord;

pub fn fast_timings() -> ScrapeTimings {
    ScrapeTimings {
        page_load: Duration::from_secs(1),
        cookie_wait: Duration::ZERO,
        ad_wait: Duration::ZERO,
        load_more_pause: Duration::ZERO,
        blocked_backoff: Duration::ZERO,
        max_blocked_clicks: 10,
    }
}

pub fn card_html(cards: &[(&str, &str)]) -> String {
    let cards: String = cards
        .iter()
        .map(|(name, href)| {
            format!(
                r#"<a class="TeacherCard__StyledTeacherCard-syjs0d-0 dLJIlx" href="{href}">
                     <div class="CardName__StyledCardName-sc-1gyrgim-0">{name}</div>
                   </a>"#
            )
        })
        .collect();
    format!("<html><body><div>{cards}</div></body></html>")
}

pub fn profile_html(counts: Option<(u32, u32, u32, u32, u32)>) -> String {
    let dist = counts
        .map(|(r1, r2, r3, r4, r5)| {
            format!(
                r#","client:VGVhY2hlci0x:ratingsDistribution":{{"__typename":"ratingsDistribution","r1":{r1},"r2":{r2},"r3":{r3},"r4":{r4},"r5":{r5}}}"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><script>
        window.__RELAY_STORE__ = {{"VGVhY2hlci0x":{{"__typename":"Teacher","firstName":"Ada"}}{dist}}};
        window.__APP_CONFIG__ = {{}};
        </script></body></html>"#
    )
}

/// Replays a search page that grows by one snapshot per "Show More" click.
#[derive(Debug, Default)]
pub struct FakeDriver {
    pages: Vec<String>,
    current: usize,
    cookie_banner: bool,
    ad: bool,
    blocked_remaining: u32,
    fail_navigation: bool,
    pub navigations: Vec<String>,
    pub load_timeouts: Vec<Duration>,
    pub overlay_clicks: u32,
    pub show_more_clicks: u32,
    pub blocked_clicks: u32,
    pub scrolls: u32,
    pub calls: u32,
}

impl FakeDriver {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn with_cookie_banner(mut self) -> Self {
        self.cookie_banner = true;
        self
    }

    pub fn with_ad(mut self) -> Self {
        self.ad = true;
        self
    }

    pub fn with_blocked_clicks(mut self, n: u32) -> Self {
        self.blocked_remaining = n;
        self
    }

    pub fn with_failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    fn has_more(&self) -> bool {
        self.current + 1 < self.pages.len()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Element = Locator;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.calls += 1;
        self.navigations.push(url.to_string());
        self.load_timeouts.push(timeout);
        if self.fail_navigation {
            return Err(BrowserError::Timeout {
                what: format!("page load of {url}"),
                timeout,
            });
        }
        Ok(())
    }

    async fn find(&mut self, locator: Locator) -> Result<Locator, BrowserError> {
        self.calls += 1;
        if locator == SHOW_MORE_BUTTON && self.has_more() {
            Ok(locator)
        } else {
            Err(BrowserError::NoSuchElement(locator))
        }
    }

    async fn wait_until_clickable(
        &mut self,
        locator: Locator,
        timeout: Duration,
    ) -> Result<Locator, BrowserError> {
        self.calls += 1;
        let present = (locator == COOKIE_CONSENT_BUTTON && self.cookie_banner)
            || (locator == AD_CLOSE_BUTTON && self.ad);
        if present {
            Ok(locator)
        } else {
            Err(BrowserError::Timeout {
                what: format!("{locator} to become clickable"),
                timeout,
            })
        }
    }

    async fn scroll_into_view(&mut self, _element: &Locator) -> Result<(), BrowserError> {
        self.calls += 1;
        self.scrolls += 1;
        Ok(())
    }

    async fn click(&mut self, element: &Locator) -> Result<(), BrowserError> {
        self.calls += 1;
        if *element == COOKIE_CONSENT_BUTTON {
            self.cookie_banner = false;
            self.overlay_clicks += 1;
        } else if *element == AD_CLOSE_BUTTON {
            self.ad = false;
            self.overlay_clicks += 1;
        } else if *element == SHOW_MORE_BUTTON {
            if self.blocked_remaining > 0 {
                self.blocked_remaining -= 1;
                self.blocked_clicks += 1;
                return Err(BrowserError::ClickIntercepted(*element));
            }
            self.current += 1;
            self.show_more_clicks += 1;
        }
        Ok(())
    }

    async fn execute_script(&mut self, _script: &str) -> Result<(), BrowserError> {
        self.calls += 1;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        self.calls += 1;
        Ok(self.pages.get(self.current).cloned().unwrap_or_default())
    }
}

/// Serves fixed bodies; anything else is a 404 with an empty body.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    pub requests: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: String) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(match self.pages.get(url) {
            Some(body) => FetchedPage {
                status: 200,
                body: body.clone(),
            },
            None => FetchedPage {
                status: 404,
                body: String::new(),
            },
        })
    }
}

fn as_row(record: &ProfessorRecord) -> Value {
    serde_json::to_value(record).unwrap()
}

/// A `professors` table held in memory, counting every call.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<ProfessorRecord>>,
    unreachable: bool,
    failing_names: Vec<String>,
    pub probes: AtomicUsize,
    pub selects: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
}

impl MemoryStore {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing_names.push(name.to_string());
        self
    }

    pub fn rows(&self) -> Vec<ProfessorRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.inserts.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }

    fn check(&self, name: Option<&str>) -> Result<(), StoreError> {
        if self.unreachable || name.is_some_and(|n| self.failing_names.iter().any(|f| f == n)) {
            return Err(StoreError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProfessorStore for MemoryStore {
    async fn probe(&self) -> Result<Vec<Value>, StoreError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.check(None)?;
        Ok(self.rows().iter().take(1).map(as_row).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Value>, StoreError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.check(Some(name))?;
        Ok(self
            .rows()
            .iter()
            .filter(|r| r.name == name)
            .map(as_row)
            .collect())
    }

    async fn insert(&self, record: &ProfessorRecord) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.check(Some(&record.name))?;
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &ProfessorRecord) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check(Some(&record.name))?;
        for row in self
            .rows
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|r| r.name == record.name)
        {
            *row = record.clone();
        }
        Ok(())
    }
}
