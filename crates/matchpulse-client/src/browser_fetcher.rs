use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use matchpulse_core::config::ConnectorConfig;
use matchpulse_core::error::AppError;
use matchpulse_core::traits::SourceConnector;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Consent prompt container.
pub const CONSENT_DIALOG: &str = "#CybotCookiebotDialog";

/// Accept controls, primary first.
pub const CONSENT_ACCEPT: &[&str] = &[
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "button[data-testid=\"accept-cookies\"]",
    ".CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "[aria-label*=\"Accept\"]",
];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Headless-browser connector using Chromium via the Chrome DevTools Protocol.
///
/// Every [`SourceConnector::acquire`] call launches its own Chromium
/// process and closes it before returning, whatever the outcome. Sessions
/// are never shared between calls.
#[derive(Clone)]
pub struct BrowserConnector {
    config: ConnectorConfig,
}

impl BrowserConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self { config }
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>), AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        if let Some(bin) = find_chrome_binary() {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg(format!("--user-agent={}", self.config.user_agent))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::ConnectionError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<String, AppError> {
        let navigation = self.config.navigation_timeout;
        let page = tokio::time::timeout(navigation, async {
            let page = browser.new_page(url).await.map_err(|e| {
                AppError::ConnectionError(format!("Failed to navigate to {url}: {e}"))
            })?;
            page.wait_for_navigation().await.map_err(|e| {
                AppError::ConnectionError(format!("Page did not stabilize: {e}"))
            })?;
            Ok::<Page, AppError>(page)
        })
        .await
        .map_err(|_| AppError::Timeout(navigation.as_secs()))??;

        self.dismiss_consent(&page).await;
        tokio::time::sleep(self.config.settle_delay).await;

        page.content()
            .await
            .map_err(|e| AppError::ConnectionError(format!("Failed to read page content: {e}")))
    }

    /// Best effort: nothing here fails the acquisition.
    async fn dismiss_consent(&self, page: &Page) {
        if !wait_until(self.config.consent_timeout, || present(page, CONSENT_DIALOG)).await {
            tracing::debug!("No consent dialog shown");
            return;
        }

        let mut clicked = false;
        for selector in CONSENT_ACCEPT {
            if let Ok(button) = page.find_element(*selector).await {
                match button.click().await {
                    Ok(_) => {
                        clicked = true;
                        break;
                    }
                    Err(e) => tracing::debug!(selector, error = %e, "Consent button click failed"),
                }
            }
        }
        if !clicked {
            tracing::warn!("Consent dialog shown but no accept control found");
            return;
        }

        if wait_until(self.config.dismiss_timeout, || dialog_hidden(page)).await {
            tracing::debug!("Consent dialog dismissed");
        } else {
            tracing::warn!(
                timeout_secs = self.config.dismiss_timeout.as_secs(),
                "Consent dialog still visible after accepting"
            );
        }
    }
}

impl SourceConnector for BrowserConnector {
    async fn acquire(&self, url: &str) -> Result<String, AppError> {
        let (mut browser, handler_task) = self.launch().await?;

        let result = self.render(&browser, url).await;

        if let Err(e) = browser.close().await {
            tracing::debug!(error = %e, "Browser close failed");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "Browser process wait failed");
        }
        handler_task.abort();

        result
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn present(page: &Page, selector: &str) -> bool {
    page.find_element(selector).await.is_ok()
}

async fn dialog_hidden(page: &Page) -> bool {
    let script = format!(
        "(() => {{ const el = document.querySelector('{CONSENT_DIALOG}'); \
         return !el || getComputedStyle(el).display === 'none'; }})()"
    );
    match page.evaluate(script).await {
        Ok(result) => result.into_value::<bool>().unwrap_or(false),
        Err(_) => false,
    }
}

/// Locate a Chrome/Chromium binary, honouring `CHROME_BIN`.
///
/// Snap-packaged Chromium exposes a wrapper that strips headless flags, so
/// the real binary inside the snap is preferred. `None` lets chromiumoxide
/// do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    [
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_gives_up_at_deadline() {
        let start = Instant::now();
        let found = wait_until(Duration::from_secs(5), || async { false }).await;
        assert!(!found);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(5) + POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_returns_on_first_hit() {
        let mut polls = 0;
        let found = wait_until(Duration::from_secs(5), || {
            polls += 1;
            let ready = polls >= 3;
            async move { ready }
        })
        .await;
        assert!(found);
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_primary_accept_control_is_first() {
        assert_eq!(
            CONSENT_ACCEPT[0],
            "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll"
        );
    }
}
