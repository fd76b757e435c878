//! Chromium-based portal driver using chromiumoxide.

use super::{Locator, PortalDriver};
use crate::config::ENV_CHROMIUM_PATH;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Interval between DOM polls while waiting for a locator.
const DOM_POLL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. CRN_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(ENV_CHROMIUM_PATH) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launch options for [`ChromiumDriver`].
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// Browser binary. Discovered with [`find_chromium`] when `None`.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Where the browser saves exports.
    pub download_dir: PathBuf,
    /// Deadline for each element lookup before `fill`/`click`.
    pub element_timeout: Duration,
}

/// Drives the portal in a single Chromium page.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    element_timeout: Duration,
}

impl ChromiumDriver {
    /// Launch Chromium and route its downloads into `options.download_dir`.
    pub async fn launch(options: ChromiumOptions) -> Result<Self> {
        let chrome_path = match options.executable {
            Some(path) => path,
            None => find_chromium()
                .context("Chromium not found. Install Chrome/Chromium or set CRN_CHROMIUM_PATH.")?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Pump CDP events for the lifetime of the browser
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        allow_downloads(&browser, &options.download_dir).await?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        Ok(Self {
            browser,
            page,
            handler,
            element_timeout: options.element_timeout,
        })
    }

    async fn element(&self, selector: &str) -> Result<Element> {
        let deadline = Instant::now() + self.element_timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                bail!(
                    "element {selector} not found within {}ms",
                    self.element_timeout.as_millis()
                );
            }
            tokio::time::sleep(DOM_POLL).await;
        }
    }

    async fn is_present(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Css(selector) => self.page.find_element(selector.as_str()).await.is_ok(),
            Locator::Text(needle) => {
                let script = text_probe_script(needle);
                match self.page.evaluate(script).await {
                    Ok(result) => result.into_value::<bool>().unwrap_or(false),
                    // Evaluation fails while a postback is replacing the document
                    Err(_) => false,
                }
            }
        }
    }
}

async fn allow_downloads(browser: &Browser, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create download dir {}", dir.display()))?;
    let params = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(dir.to_string_lossy().into_owned())
        .build()
        .map_err(|e| anyhow::anyhow!("invalid download behavior: {e}"))?;
    browser
        .execute(params)
        .await
        .context("failed to set download behavior")?;
    Ok(())
}

/// JS expression that is true when the page body contains `needle`.
fn text_probe_script(needle: &str) -> String {
    let quoted = serde_json::to_string(needle).unwrap_or_else(|_| "\"\"".to_string());
    format!("(() => {{ const b = document.body; return !!b && b.innerText.includes({quoted}); }})()")
}

#[async_trait]
impl PortalDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        if let Err(e) = self.page.wait_for_navigation().await {
            debug!(%url, error = %e, "navigation did not settle");
        }
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> Result<()> {
        let element = self.element(selector).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .with_context(|| format!("failed to clear {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("failed to focus {selector}"))?;
        element
            .type_str(text)
            .await
            .with_context(|| format!("failed to type into {selector}"))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        self.element(selector)
            .await?
            .click()
            .await
            .with_context(|| format!("failed to click {selector}"))?;
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_present(locator).await {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(DOM_POLL).await;
        }
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let _ = self.page.clone().close().await;
        let closed = self.browser.close().await;
        self.handler.abort();
        closed.context("failed to close Chromium")?;
        Ok(())
    }
}
