//! DOM-based XSS confirmation in a real browser.
//!
//! The pass drives one browser session over every crawled page: it types each
//! payload into the visible inputs, clicks the visible buttons and checks whether
//! a native dialog opened. A dialog is the proof of execution.
//!
//! Browser control sits behind [`BrowserSession`] so the pass itself can be
//! exercised without Chrome.

use crate::finding::Finding;
use crate::payloads;
use crate::probe::{Detection, Detector, Probe, ProbeFailure};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scour_scanner::ScanError;
use scour_scanner::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// A live browser tab. All calls block.
pub trait BrowserSession: Send {
    /// Load `url` and wait for navigation to finish. Clears any pending dialog.
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Set the value of every visible `tag` element to `text`; returns how many were filled.
    fn fill_visible(&mut self, tag: &str, text: &str) -> Result<usize>;

    /// Click every visible `tag` element; returns how many were clicked.
    fn click_visible(&mut self, tag: &str) -> Result<usize>;

    /// Accept a dialog opened since the last navigation or check. `false` if none.
    fn take_dialog(&mut self) -> Result<bool>;
}

pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Headless Chrome through the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    idle_timeout: Duration,
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl ChromeLauncher {
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        Ok(Box::new(ChromeSession::launch(self.idle_timeout)?))
    }
}

pub struct ChromeSession {
    // Dropping the browser ends the Chrome process
    _browser: Browser,
    tab: Arc<Tab>,
    dialog_opened: Arc<AtomicBool>,
}

impl ChromeSession {
    pub fn launch(idle_timeout: Duration) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1280, 800)))
            .idle_browser_timeout(idle_timeout)
            .build()
            .map_err(|e| ScanError::Browser(format!("launch options: {}", e)))?;

        let browser = Browser::new(options).map_err(browser_error)?;
        let tab = browser.new_tab().map_err(browser_error)?;

        let dialog_opened = Arc::new(AtomicBool::new(false));
        let flag = dialog_opened.clone();
        tab.add_event_listener(Arc::new(move |event: &Event| {
            if let Event::PageJavascriptDialogOpening(_) = event {
                flag.store(true, Ordering::SeqCst);
            }
        }))
        .map_err(browser_error)?;

        Ok(Self {
            _browser: browser,
            tab,
            dialog_opened,
        })
    }

    fn eval_count(&self, script: &str) -> Result<usize> {
        let result = self.tab.evaluate(script, false).map_err(browser_error)?;
        Ok(result
            .value
            .and_then(|v| v.as_u64())
            .unwrap_or_default() as usize)
    }
}

fn browser_error(e: impl std::fmt::Display) -> ScanError {
    ScanError::Browser(e.to_string())
}

// Shared by the fill and click scripts
const VISIBLE_JS: &str = "const visible = el => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);";

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab.navigate_to(url).map_err(browser_error)?;
        self.tab.wait_until_navigated().map_err(browser_error)?;
        // A dialog raised by the page itself is not a payload hit
        if self.take_dialog()? {
            debug!("[DOM] {} opened a dialog while loading", url);
        }
        Ok(())
    }

    fn fill_visible(&mut self, tag: &str, text: &str) -> Result<usize> {
        let tag = serde_json::to_string(tag).map_err(browser_error)?;
        let text = serde_json::to_string(text).map_err(browser_error)?;
        // Events fire after the script returns so a dialog cannot block evaluation
        let script = format!(
            r#"(() => {{
                {VISIBLE_JS}
                const els = Array.from(document.getElementsByTagName({tag})).filter(visible);
                for (const el of els) {{
                    try {{ el.value = {text}; }} catch (e) {{}}
                    setTimeout(() => {{
                        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    }}, 0);
                }}
                return els.length;
            }})()"#
        );
        self.eval_count(&script)
    }

    fn click_visible(&mut self, tag: &str) -> Result<usize> {
        let tag = serde_json::to_string(tag).map_err(browser_error)?;
        let script = format!(
            r#"(() => {{
                {VISIBLE_JS}
                const els = Array.from(document.getElementsByTagName({tag})).filter(visible);
                for (const el of els) {{
                    setTimeout(() => {{ try {{ el.click(); }} catch (e) {{}} }}, 0);
                }}
                return els.length;
            }})()"#
        );
        self.eval_count(&script)
    }

    fn take_dialog(&mut self) -> Result<bool> {
        if !self.dialog_opened.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.tab
            .call_method(Page::HandleJavaScriptDialog {
                accept: true,
                prompt_text: None,
            })
            .map_err(browser_error)?;
        Ok(true)
    }
}

/// The serial DOM-XSS stage.
#[derive(Debug, Clone)]
pub struct DomXssPass {
    payloads: Vec<String>,
    settle: Duration,
}

impl Default for DomXssPass {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}

impl DomXssPass {
    pub fn new(settle: Duration) -> Self {
        Self {
            payloads: payloads::xss_catalog(),
            settle,
        }
    }

    pub fn with_payloads(mut self, payloads: Vec<String>) -> Self {
        self.payloads = payloads;
        self
    }

    /// Launch a session and run the pass. A launch failure turns the stage into a no-op.
    pub fn launch_and_run(&self, launcher: &dyn BrowserLauncher, urls: &[String]) -> Detection {
        match launcher.launch() {
            Ok(mut session) => self.run(session.as_mut(), urls),
            Err(e) => {
                warn!("[DOM] browser unavailable, skipping DOM-XSS pass: {}", e);
                Detection::default()
            }
        }
    }

    pub fn run(&self, session: &mut dyn BrowserSession, urls: &[String]) -> Detection {
        let mut detection = Detection::default();

        for url in urls {
            if let Err(e) = session.navigate(url) {
                detection.record(Probe::Failed(ProbeFailure::new(Detector::DomXss, url, &e)));
                continue;
            }
            std::thread::sleep(self.settle);
            match session.take_dialog() {
                Ok(true) => debug!("[DOM] {} opened a dialog before any payload", url),
                Ok(false) => {}
                Err(e) => debug!("[DOM] could not dismiss load-time dialog: {}", e),
            }

            for payload in &self.payloads {
                match self.try_payload(session, payload) {
                    Ok(true) => {
                        info!("[DOM] {} opened a dialog with {:?}", url, payload);
                        detection.record(Probe::Hit(Finding::dom(url, payload)));
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        detection
                            .record(Probe::Failed(ProbeFailure::new(Detector::DomXss, url, &e)));
                    }
                }
            }
        }

        detection
    }

    fn try_payload(&self, session: &mut dyn BrowserSession, payload: &str) -> Result<bool> {
        // Element-level failures do not end the attempt
        if let Err(e) = session.fill_visible("input", payload) {
            debug!("[DOM] fill failed: {}", e);
        }
        if let Err(e) = session.click_visible("button") {
            debug!("[DOM] click failed: {}", e);
        }
        std::thread::sleep(self.settle);
        session.take_dialog()
    }
}
