use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("No element matches {0}")]
    NoSuchElement(Locator),
    #[error("Click on {0} was intercepted by another element")]
    ClickIntercepted(Locator),
    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Browser protocol error: {0}")]
    Cdp(#[from] CdpError),
}

/// Where to find an element on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    XPath(&'static str),
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::XPath(x) => write!(f, "xpath {x}"),
        }
    }
}

/// The browser capabilities the link scraper needs.
#[async_trait]
pub trait BrowserDriver: Send {
    type Element: Send + Sync;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Fails with [`BrowserError::NoSuchElement`] when nothing matches.
    async fn find(&mut self, locator: Locator) -> Result<Self::Element, BrowserError>;

    async fn wait_until_clickable(
        &mut self,
        locator: Locator,
        timeout: Duration,
    ) -> Result<Self::Element, BrowserError>;

    async fn scroll_into_view(&mut self, element: &Self::Element) -> Result<(), BrowserError>;

    /// Fails with [`BrowserError::ClickIntercepted`] when another element
    /// covers the target.
    async fn click(&mut self, element: &Self::Element) -> Result<(), BrowserError>;

    async fn execute_script(&mut self, script: &str) -> Result<(), BrowserError>;

    async fn page_source(&mut self) -> Result<String, BrowserError>;
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            window_size: (1920, 1080),
            request_timeout: Duration::from_secs(60),
        }
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Waits for a page load within `budget`.
///
/// The CDP handler gives up on a navigation after its own fixed request
/// timeout, which can be shorter than `budget`. Those timeouts are retried
/// with `resume` until the load settles or the budget runs out.
async fn load_within<S, SF, R, RF>(
    url: &str,
    budget: Duration,
    start: S,
    mut resume: R,
) -> Result<(), BrowserError>
where
    S: FnOnce() -> SF,
    SF: Future<Output = Result<(), CdpError>>,
    R: FnMut() -> RF,
    RF: Future<Output = Result<(), CdpError>>,
{
    let deadline = Instant::now() + budget;
    let timed_out = || BrowserError::Timeout {
        what: format!("page load of {url}"),
        timeout: budget,
    };

    match tokio::time::timeout(budget, start()).await {
        Err(_) => return Err(timed_out()),
        Ok(Ok(())) => return Ok(()),
        Ok(Err(CdpError::Timeout)) => {}
        Ok(Err(e)) => return Err(e.into()),
    }

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out());
        }
        log::debug!("{} is still loading, {:?} left", url, remaining);
        match tokio::time::timeout(remaining, resume()).await {
            Err(_) => return Err(timed_out()),
            Ok(Ok(())) => return Ok(()),
            Ok(Err(CdpError::Timeout)) => continue,
            Ok(Err(e)) => return Err(e.into()),
        }
    }
}

const IS_CLICKABLE_JS: &str = r#"function() {
    const style = window.getComputedStyle(this);
    const rect = this.getBoundingClientRect();
    return !this.disabled && style.visibility !== "hidden" && style.display !== "none"
        && rect.width > 0 && rect.height > 0;
}"#;

const IS_TOPMOST_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const hit = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
    return hit !== null && (hit === this || this.contains(hit));
}"#;

/// A single Chromium tab driven over CDP.
///
/// Open with [`ChromeSession::launch`] and release with
/// [`ChromeSession::close`].
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .incognito()
            .arg("--ignore-certificate-errors")
            .request_timeout(options.request_timeout)
            .window_size(options.window_size.0, options.window_size.1);
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        log::info!(
            "Launching {} browser",
            if options.headless { "headless" } else { "headed" }
        );
        let (browser, mut events) = Browser::launch(config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e.into());
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Shuts the browser down and waits for the process to exit.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        log::info!("Closing browser");
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            log::warn!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        closed?;
        Ok(())
    }

    async fn locate(&self, locator: Locator) -> Result<Element, BrowserError> {
        let Locator::XPath(xpath) = locator;
        self.page.find_xpath(xpath).await.map_err(|e| {
            log::trace!("Lookup of {} failed: {}", locator, e);
            BrowserError::NoSuchElement(locator)
        })
    }

    async fn js_predicate(element: &Element, function: &str) -> Result<bool, BrowserError> {
        let returns = element.call_js_fn(function, false).await?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[async_trait]
impl BrowserDriver for ChromeSession {
    type Element = (Locator, Element);

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        log::info!("Navigating to {}", url);
        let page = &self.page;
        load_within(
            url,
            timeout,
            move || async move { page.goto(url).await.map(|_| ()) },
            move || async move { page.wait_for_navigation().await.map(|_| ()) },
        )
        .await
    }

    async fn find(&mut self, locator: Locator) -> Result<Self::Element, BrowserError> {
        Ok((locator, self.locate(locator).await?))
    }

    async fn wait_until_clickable(
        &mut self,
        locator: Locator,
        timeout: Duration,
    ) -> Result<Self::Element, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.locate(locator).await
                && Self::js_predicate(&element, IS_CLICKABLE_JS)
                    .await
                    .unwrap_or(false)
            {
                return Ok((locator, element));
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: format!("{locator} to become clickable"),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn scroll_into_view(&mut self, element: &Self::Element) -> Result<(), BrowserError> {
        element.1.scroll_into_view().await?;
        Ok(())
    }

    async fn click(&mut self, element: &Self::Element) -> Result<(), BrowserError> {
        let (locator, element) = element;
        if !Self::js_predicate(element, IS_TOPMOST_JS).await? {
            return Err(BrowserError::ClickIntercepted(*locator));
        }
        element.click().await?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<(), BrowserError> {
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.page.content().await?)
    }
}
