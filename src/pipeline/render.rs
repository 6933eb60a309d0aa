//! HTML to paginated PDF via a headless browser.
//!
//! ## Why spawn_blocking?
//!
//! `headless_chrome` drives the browser over a synchronous DevTools
//! connection; navigation and `printToPDF` block the calling thread for
//! the whole render. `tokio::task::spawn_blocking` moves that work onto
//! the blocking pool so Tokio worker threads keep making progress, and a
//! `tokio::time::timeout` around the join bounds a wedged browser.
//!
//! ## Browser lifetime
//!
//! Launching Chromium costs hundreds of milliseconds, so the engine
//! launches lazily on the first render and reuses the instance for every
//! subsequent one (a document with a title page renders twice). The
//! orchestrator closes the engine when conversion finishes, on the error
//! path included.

use crate::config::PdfOptions;
use crate::error::MdpressError;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Reusable, lazily launched browser handle. Cloning shares the instance.
#[derive(Clone)]
pub struct PdfEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    browser: Mutex<Option<Browser>>,
}

impl PdfEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                browser: Mutex::new(None),
            }),
        }
    }

    /// Render one HTML document to PDF bytes.
    ///
    /// Header and footer templates must already have their placeholders
    /// substituted; the browser only expands its own `pageNumber` /
    /// `totalPages` spans.
    pub async fn render(
        &self,
        html: String,
        header: String,
        footer: String,
        options: &PdfOptions,
    ) -> Result<Vec<u8>, MdpressError> {
        let inner = Arc::clone(&self.inner);
        let options = options.clone();
        let render_timeout_secs = options.render_timeout_secs;
        let timeout = Duration::from_secs(render_timeout_secs);

        let task = tokio::task::spawn_blocking(move || {
            inner.render_blocking(&html, &header, &footer, &options)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| MdpressError::Internal(format!("Render task panicked: {e}")))?,
            Err(_) => Err(MdpressError::RenderTimeout {
                secs: render_timeout_secs,
            }),
        }
    }

    /// Shut the browser down. Safe to call when it was never launched.
    pub fn close(&self) {
        if self.inner.lock_browser().take().is_some() {
            debug!("Closing headless browser");
        }
    }
}

impl Default for PdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineInner {
    // A poisoned lock only means a render thread panicked mid-launch;
    // the slot itself stays usable.
    fn lock_browser(&self) -> MutexGuard<'_, Option<Browser>> {
        self.browser.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn browser(&self) -> Result<Browser, MdpressError> {
        let mut guard = self.lock_browser();
        if let Some(browser) = guard.as_ref() {
            return Ok(browser.clone());
        }

        info!("Launching headless browser");
        let launch = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .build()
            .map_err(|e| MdpressError::BrowserLaunch(e.to_string()))?;
        let browser =
            Browser::new(launch).map_err(|e| MdpressError::BrowserLaunch(e.to_string()))?;
        *guard = Some(browser.clone());
        Ok(browser)
    }

    fn render_blocking(
        &self,
        html: &str,
        header: &str,
        footer: &str,
        options: &PdfOptions,
    ) -> Result<Vec<u8>, MdpressError> {
        let browser = self.browser()?;

        // The page is served from disk so relative file:// references
        // keep working; the file lives until the render returns.
        let mut page = tempfile::Builder::new()
            .prefix("mdpress-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| MdpressError::RenderFailed(format!("cannot stage page: {e}")))?;
        page.write_all(html.as_bytes())
            .map_err(|e| MdpressError::RenderFailed(format!("cannot stage page: {e}")))?;
        page.flush()
            .map_err(|e| MdpressError::RenderFailed(format!("cannot stage page: {e}")))?;
        let url = format!("file://{}", page.path().display());

        debug!("Rendering {url}");
        let tab = browser
            .new_tab()
            .map_err(|e| MdpressError::RenderFailed(e.to_string()))?;
        let result = (|| {
            tab.navigate_to(&url)
                .map_err(|e| MdpressError::RenderFailed(e.to_string()))?;
            tab.wait_until_navigated()
                .map_err(|e| MdpressError::RenderFailed(e.to_string()))?;
            tab.print_to_pdf(Some(PrintToPdfOptions {
                display_header_footer: Some(options.display_header_footer),
                print_background: Some(options.print_background),
                prefer_css_page_size: Some(options.prefer_css_page_size),
                scale: Some(options.scale),
                header_template: Some(header.to_string()),
                footer_template: Some(footer.to_string()),
                ..Default::default()
            }))
            .map_err(|e| MdpressError::RenderFailed(e.to_string()))
        })();
        // Tab teardown failures are uninteresting once we have the bytes.
        let _ = tab.close(true);

        let pdf = result?;
        if pdf.is_empty() {
            return Err(MdpressError::EmptyRender);
        }
        debug!("Rendered {} bytes of PDF", pdf.len());
        Ok(pdf)
    }
}
