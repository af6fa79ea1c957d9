//! Browser automation driver traits

use crate::browser::cookies::CookieRecord;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a browser driver
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverFault {
    /// Waiting for the page or an element exceeded its deadline
    #[error("Timed out waiting for page content")]
    Timeout,

    /// The browser process itself is unusable
    #[error("Browser backend fault: {0}")]
    Backend(String),

    /// The page could not be loaded, but the browser is healthy
    #[error("Page rejected: {0}")]
    Rejected(String),

    /// The browser could not be started
    #[error("Failed to launch browser: {0}")]
    Launch(String),
}

impl DriverFault {
    /// True if the fault condemns the whole browser rather than one page
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Launch(_))
    }
}

/// One live browser instance
///
/// Drivers are owned by exactly one [`ExtractionSession`](crate::browser::ExtractionSession)
/// and are never shared.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Loads `url` in the active tab and waits for navigation to settle
    async fn navigate(&mut self, url: &str) -> Result<(), DriverFault>;

    /// Waits until an element matching the CSS `selector` exists
    async fn wait_until_present(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverFault>;

    /// Returns the serialized DOM of the active tab
    async fn current_markup(&mut self) -> Result<String, DriverFault>;

    /// Adds one cookie to the browser's jar for the current origin
    async fn inject_cookie(&mut self, cookie: &CookieRecord) -> Result<(), DriverFault>;

    /// Reloads the active tab
    async fn reload(&mut self) -> Result<(), DriverFault>;

    /// Shuts the browser down; safe to call more than once
    async fn terminate(&mut self);
}

/// Creates browser drivers
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverFault>;
}
