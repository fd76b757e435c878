//! Browser automation abstraction.
//!
//! Defines the `PortalDriver` trait the exporter drives the search portal
//! through. The production implementation is Chromium via chromiumoxide;
//! tests script their own drivers.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Something to wait for on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// An element matching a CSS selector.
    Css(String),
    /// Any visible text containing this substring.
    Text(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn text(needle: impl Into<String>) -> Self {
        Self::Text(needle.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css `{s}`"),
            Self::Text(t) => write!(f, "text `{t}`"),
        }
    }
}

/// A live browser session on the search portal.
#[async_trait]
pub trait PortalDriver: Send {
    /// Load a URL and wait for it to finish loading.
    async fn navigate(&mut self, url: &str) -> Result<()>;
    /// Clear the input matching `selector` and type `text` into it.
    async fn fill(&mut self, selector: &str, text: &str) -> Result<()>;
    /// Click the element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<()>;
    /// Poll until `locator` is present. `Ok(false)` means the deadline passed.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<bool>;
    /// Shut the browser down.
    async fn close(self: Box<Self>) -> Result<()>;
}
