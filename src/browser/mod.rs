//! Browser automation
//!
//! Pages are rendered in a real browser because the metric values are filled in by
//! client-side scripts. This module holds the driver abstraction, the headless Chrome
//! implementation, cookie bootstrap, and the [`ExtractionSession`] that owns one
//! browser at a time.

mod chrome;
mod cookies;
mod driver;
mod session;

pub use chrome::{ChromeDriver, ChromeFactory, ChromeOptions};
pub use cookies::{load_cookie_file, CookieBootstrap, CookieError, CookieRecord};
pub use driver::{BrowserDriver, DriverFactory, DriverFault};
pub use session::{ExtractionSession, SessionSettings};

use crate::config::SessionConfig;
use std::path::Path;

/// Resolves the cookie bootstrap named in the session config
///
/// A missing or unreadable cookie file is logged and treated as no bootstrap.
pub fn cookie_bootstrap(config: &SessionConfig) -> Option<CookieBootstrap> {
    let path = config.cookie_file.as_ref()?;

    match load_cookie_file(Path::new(path)) {
        Ok(cookies) => {
            tracing::info!("Loaded {} cookies from {}", cookies.len(), path);
            Some(CookieBootstrap {
                origin: config.cookie_domain.clone(),
                cookies,
            })
        }
        Err(e) => {
            tracing::warn!("Skipping cookie bootstrap: {}", e);
            None
        }
    }
}
