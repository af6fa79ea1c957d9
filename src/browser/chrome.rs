//! Headless Chrome driver
//!
//! Wraps the `headless_chrome` crate behind [`BrowserDriver`]. The crate's API is
//! blocking, so every call runs on tokio's blocking pool against a cloned handle.
//!
//! Fault classification:
//! - errors that mention a timeout map to [`DriverFault::Timeout`]
//! - any other error triggers a liveness probe (`Browser.getVersion`); a dead browser
//!   is a [`DriverFault::Backend`], a live one means the page itself was the problem
//!   and the error becomes [`DriverFault::Rejected`]

use crate::browser::cookies::CookieRecord;
use crate::browser::driver::{BrowserDriver, DriverFactory, DriverFault};
use crate::config::SessionConfig;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How long the DevTools connection may stay silent before the browser is dropped
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// Launch options for Chrome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeOptions {
    pub headless: bool,
    pub sandbox: bool,
    pub window_size: (u32, u32),
    pub chrome_path: Option<PathBuf>,
    /// Default timeout for navigation and element lookups
    pub page_timeout: Duration,
}

impl ChromeOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            headless: config.headless,
            sandbox: config.sandbox,
            window_size: (config.window_width, config.window_height),
            chrome_path: config.chrome_path.as_ref().map(PathBuf::from),
            page_timeout: config.fetch_timeout(),
        }
    }
}

/// Starts a fresh Chrome process per session
#[derive(Debug, Clone)]
pub struct ChromeFactory {
    options: ChromeOptions,
}

impl ChromeFactory {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(ChromeOptions::from_config(config))
    }
}

#[async_trait]
impl DriverFactory for ChromeFactory {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverFault> {
        let options = self.options.clone();
        let driver = tokio::task::spawn_blocking(move || launch_chrome(&options))
            .await
            .map_err(|e| DriverFault::Launch(e.to_string()))??;
        Ok(Box::new(driver))
    }
}

fn launch_chrome(options: &ChromeOptions) -> Result<ChromeDriver, DriverFault> {
    let launch_options = LaunchOptionsBuilder::default()
        .headless(options.headless)
        .sandbox(options.sandbox)
        .window_size(Some(options.window_size))
        .path(options.chrome_path.clone())
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .build()
        .map_err(|e| DriverFault::Launch(e.to_string()))?;

    let browser = Browser::new(launch_options).map_err(|e| DriverFault::Launch(format!("{:#}", e)))?;
    let tab = browser
        .new_tab()
        .map_err(|e| DriverFault::Launch(format!("{:#}", e)))?;
    tab.set_default_timeout(options.page_timeout);

    tracing::debug!(
        headless = options.headless,
        sandbox = options.sandbox,
        "Launched Chrome"
    );

    Ok(ChromeDriver {
        browser: Some(browser),
        tab: Some(tab),
    })
}

/// A running Chrome process with one working tab
///
/// Dropping the driver kills the process.
pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl ChromeDriver {
    fn tab(&self) -> Result<Arc<Tab>, DriverFault> {
        self.tab
            .clone()
            .ok_or_else(|| DriverFault::Backend("browser already terminated".to_string()))
    }

    /// Runs a blocking tab operation and classifies its error
    async fn with_tab<T, F>(&self, op: F) -> Result<T, DriverFault>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = self.tab()?;
        let result = tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| DriverFault::Backend(e.to_string()))?;

        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.classify(e).await),
        }
    }

    /// A dead connection also surfaces as a wait that "never came", so the
    /// browser is checked whatever the message says
    async fn classify(&self, error: anyhow::Error) -> DriverFault {
        let message = format!("{:#}", error);
        let alive = self.is_alive().await;
        classify_message(message, alive)
    }

    async fn is_alive(&self) -> bool {
        let Some(browser) = self.browser.clone() else {
            return false;
        };
        tokio::task::spawn_blocking(move || browser.get_version().is_ok())
            .await
            .unwrap_or(false)
    }
}

fn classify_message(message: String, alive: bool) -> DriverFault {
    if !alive {
        DriverFault::Backend(message)
    } else if is_timeout_message(&message) {
        DriverFault::Timeout
    } else {
        DriverFault::Rejected(message)
    }
}

fn is_timeout_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("timed out") || lower.contains("timeout") || lower.contains("never came")
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverFault> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn wait_until_present(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverFault> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)?;
            Ok(())
        })
        .await
    }

    async fn current_markup(&mut self) -> Result<String, DriverFault> {
        self.with_tab(|tab| tab.get_content()).await
    }

    async fn inject_cookie(&mut self, cookie: &CookieRecord) -> Result<(), DriverFault> {
        let cookie = cookie.clone();
        self.with_tab(move |tab| {
            // CDP needs either a domain or a url to scope the cookie
            let url = match cookie.domain {
                Some(_) => None,
                None => Some(tab.get_url()),
            };
            let param: CookieParam = serde_json::from_value(json!({
                "name": cookie.name,
                "value": cookie.value,
                "url": url,
                "domain": cookie.domain,
                "path": cookie.path,
                "secure": cookie.secure,
                "httpOnly": cookie.http_only,
                "expires": cookie.expiry,
            }))?;
            tab.set_cookies(vec![param])?;
            Ok(())
        })
        .await
    }

    async fn reload(&mut self) -> Result<(), DriverFault> {
        self.with_tab(|tab| {
            tab.reload(false, None)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn terminate(&mut self) {
        let tab = self.tab.take();
        let browser = self.browser.take();
        if tab.is_none() && browser.is_none() {
            return;
        }

        let closed = tokio::task::spawn_blocking(move || {
            if let Some(tab) = tab {
                if let Err(e) = tab.close(false) {
                    tracing::debug!("Closing Chrome tab failed: {:#}", e);
                }
            }
            drop(browser);
        })
        .await;

        if let Err(e) = closed {
            tracing::warn!("Chrome shutdown task failed: {}", e);
        } else {
            tracing::debug!("Chrome terminated");
        }
    }
}
