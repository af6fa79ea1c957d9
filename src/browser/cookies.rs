//! Cookie bootstrap file
//!
//! The file is a JSON array of cookie records as exported by common browser tooling:
//!
//! ```json
//! [{"name": "sessionid", "value": "abc", "domain": ".example.com", "path": "/"}]
//! ```
//!
//! Unknown keys are ignored.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// One cookie to inject at session start
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,

    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub secure: Option<bool>,

    #[serde(default, rename = "httpOnly")]
    pub http_only: Option<bool>,

    /// Expiry as seconds since the Unix epoch
    #[serde(default, alias = "expirationDate")]
    pub expiry: Option<f64>,
}

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("Failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode cookie file: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Reads every cookie record from `path`
pub fn load_cookie_file(path: &Path) -> Result<Vec<CookieRecord>, CookieError> {
    let content = std::fs::read_to_string(path)?;
    let records = serde_json::from_str(&content)?;
    Ok(records)
}

/// Cookies to apply against one origin whenever a session starts
#[derive(Debug, Clone, PartialEq)]
pub struct CookieBootstrap {
    /// Page loaded before the cookies are injected
    pub origin: String,
    pub cookies: Vec<CookieRecord>,
}
