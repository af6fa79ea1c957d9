//! Extraction session
//!
//! An [`ExtractionSession`] owns exactly one live browser driver. It is created by a
//! [`DriverFactory`], handed by `&mut` to whoever needs a page fetched, and replaced
//! wholesale on [`recycle`](ExtractionSession::recycle). There is never more than one
//! live driver per session: the old one is terminated before the new one launches.

use crate::browser::cookies::CookieBootstrap;
use crate::browser::driver::{BrowserDriver, DriverFactory, DriverFault};
use crate::config::SessionConfig;
use crate::extract::{ExtractionOutcome, ValueExtractor};
use std::sync::Arc;
use std::time::Duration;

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Element tag and class fragment the values live in
    pub extractor: ValueExtractor,
    /// How long to wait for the first value element to appear
    pub fetch_timeout: Duration,
    /// Fetches after which the session counts as worn and should be recycled
    pub recycle_after: u32,
    pub cookies: Option<CookieBootstrap>,
}

impl SessionSettings {
    pub fn from_config(config: &SessionConfig, cookies: Option<CookieBootstrap>) -> Self {
        Self {
            extractor: ValueExtractor::new(&config.value_element, &config.value_class),
            fetch_timeout: config.fetch_timeout(),
            recycle_after: config.recycle_after.max(1),
            cookies,
        }
    }
}

/// Exclusive owner of one rendering backend instance
pub struct ExtractionSession {
    factory: Arc<dyn DriverFactory>,
    driver: Option<Box<dyn BrowserDriver>>,
    settings: SessionSettings,
    fetches: u32,
    generation: u32,
}

impl ExtractionSession {
    /// Launches the backend and applies the cookie bootstrap
    ///
    /// A launch failure is returned; a bootstrap failure is only logged.
    pub async fn create(
        factory: Arc<dyn DriverFactory>,
        settings: SessionSettings,
    ) -> Result<Self, DriverFault> {
        let mut driver = factory.launch().await?;
        bootstrap(driver.as_mut(), settings.cookies.as_ref()).await;
        tracing::info!("Extraction session started");

        Ok(Self {
            factory,
            driver: Some(driver),
            settings,
            fetches: 0,
            generation: 1,
        })
    }

    /// Loads `locator` and extracts its values
    ///
    /// Never fails outright: every fault is folded into an [`ExtractionOutcome`].
    pub async fn fetch(&mut self, locator: &str) -> ExtractionOutcome {
        let selector = self.settings.extractor.selector();
        let timeout = self.settings.fetch_timeout;
        let Some(driver) = self.driver.as_mut() else {
            return ExtractionOutcome::SessionCrashed;
        };

        let markup = load_markup(driver.as_mut(), locator, &selector, timeout).await;
        self.fetches += 1;

        match markup {
            Ok(markup) => {
                let values = self.settings.extractor.extract(&markup);
                ExtractionOutcome::from_values(values)
            }
            Err(fault) => {
                tracing::debug!(locator, "Fetch fault: {}", fault);
                ExtractionOutcome::from_fault(&fault)
            }
        }
    }

    /// Tears down the current backend and starts a new one
    ///
    /// If the relaunch fails the session is left without a driver; later fetches
    /// report `SessionCrashed` until a recycle succeeds.
    pub async fn recycle(&mut self) -> Result<(), DriverFault> {
        if let Some(mut old) = self.driver.take() {
            old.terminate().await;
        }

        let mut driver = self.factory.launch().await?;
        bootstrap(driver.as_mut(), self.settings.cookies.as_ref()).await;

        self.driver = Some(driver);
        self.fetches = 0;
        self.generation += 1;
        tracing::info!(generation = self.generation, "Extraction session recycled");
        Ok(())
    }

    /// True once the session has served `recycle_after` fetches
    pub fn is_worn(&self) -> bool {
        self.fetches >= self.settings.recycle_after
    }

    pub fn is_live(&self) -> bool {
        self.driver.is_some()
    }

    /// Fetches served by the current backend instance
    pub fn fetches(&self) -> u32 {
        self.fetches
    }

    /// Backend instances started so far, including the current one
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Terminates the backend
    pub async fn release(mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.terminate().await;
            tracing::info!("Extraction session released");
        }
    }
}

async fn load_markup(
    driver: &mut dyn BrowserDriver,
    locator: &str,
    selector: &str,
    timeout: Duration,
) -> Result<String, DriverFault> {
    driver.navigate(locator).await?;
    driver.wait_until_present(selector, timeout).await?;
    driver.current_markup().await
}

async fn bootstrap(driver: &mut dyn BrowserDriver, cookies: Option<&CookieBootstrap>) {
    let Some(bootstrap) = cookies else {
        return;
    };
    if bootstrap.cookies.is_empty() {
        return;
    }

    if let Err(e) = driver.navigate(&bootstrap.origin).await {
        tracing::warn!("Cookie bootstrap could not open {}: {}", bootstrap.origin, e);
        return;
    }

    let mut applied = 0;
    for cookie in &bootstrap.cookies {
        match driver.inject_cookie(cookie).await {
            Ok(()) => applied += 1,
            Err(e) => tracing::warn!("Failed to inject cookie {}: {}", cookie.name, e),
        }
    }

    if let Err(e) = driver.reload().await {
        tracing::warn!("Reload after cookie bootstrap failed: {}", e);
    }
    tracing::debug!(applied, total = bootstrap.cookies.len(), "Applied cookies");
}
