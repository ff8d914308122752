//! Browser automation using chromiumoxide.

use chromiumoxide::browser::{Browser as ChromeBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, FrameId, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::ExtractError;

/// Interval between checks for the table element
const TABLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lifecycle event fired once the frame has had at most 2 open connections
/// for 500ms
const NETWORK_IDLE_EVENT: &str = "networkAlmostIdle";

/// Browser wrapper for a single scrape.
///
/// Each run launches its own instance; nothing is shared between runs.
pub struct Browser {
    browser: ChromeBrowser,
    handle: tokio::task::JoinHandle<()>,
}

impl Browser {
    /// Launch a new headless browser instance
    pub async fn launch(source: &SourceConfig) -> Result<Self, ExtractError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--mute-audio")
            .arg("--lang=en-US")
            .window_size(source.viewport_width, source.viewport_height)
            .viewport(Viewport {
                width: source.viewport_width,
                height: source.viewport_height,
                ..Default::default()
            });

        if let Some(path) = &source.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(ExtractError::Launch)?;

        let (browser, mut handler) = ChromeBrowser::launch(config)
            .await
            .map_err(|e| ExtractError::Launch(e.to_string()))?;

        // Spawn handler task - must keep running for browser to work
        let handle = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => continue, // Don't break on errors
                    None => break,
                }
            }
        });

        Ok(Self { browser, handle })
    }

    /// Load the source page, wait for a table to render and return the HTML
    pub async fn fetch_table_page(&self, source: &SourceConfig) -> Result<String, ExtractError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to create new page: {}", e)))?;

        page.set_user_agent(source.user_agent.as_str())
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to set user agent: {}", e)))?;

        let result = Self::load_and_read(&page, source).await;

        // Close the page
        let _ = page.close().await;

        result
    }

    async fn load_and_read(page: &Page, source: &SourceConfig) -> Result<String, ExtractError> {
        Self::navigate(page, &source.url, source.navigation_timeout()).await?;
        Self::wait_for_table(page, source.table_timeout()).await?;

        // Late client-side rendering
        sleep(source.settle_delay()).await;

        page.content()
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to get page content: {}", e)))
    }

    /// Navigate and wait for the main frame to go network-idle, bounded by `limit`
    async fn navigate(page: &Page, url: &str, limit: Duration) -> Result<(), ExtractError> {
        let navigation = async {
            page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
            // Subscribe before navigating so an early idle event is not missed
            let mut lifecycle = page.event_listener::<EventLifecycleEvent>().await?;

            page.goto(url).await?;
            let main_frame = page.mainframe().await?;

            while let Some(event) = lifecycle.next().await {
                if is_network_idle(&event, main_frame.as_ref()) {
                    return Ok(true);
                }
            }
            Ok::<_, chromiumoxide::error::CdpError>(false)
        };

        let reason = match timeout(limit, navigation).await {
            Ok(Ok(true)) => {
                debug!(url, "Page reached network idle");
                return Ok(());
            }
            Ok(Ok(false)) => "page closed before reaching network idle".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no network idle within {}s", limit.as_secs()),
        };

        Err(ExtractError::Navigation {
            url: url.to_string(),
            reason,
        })
    }

    /// Poll until at least one table element exists
    async fn wait_for_table(page: &Page, limit: Duration) -> Result<(), ExtractError> {
        let deadline = Instant::now() + limit;

        loop {
            if page.find_element("table").await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ExtractError::TableNotFound {
                    timeout_secs: limit.as_secs(),
                });
            }
            sleep(TABLE_POLL_INTERVAL).await;
        }
    }

    /// Close the browser
    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handle.abort();
    }
}

/// Idle event for the main frame; any frame counts while it is unknown
fn is_network_idle(event: &EventLifecycleEvent, main_frame: Option<&FrameId>) -> bool {
    event.name == NETWORK_IDLE_EVENT && main_frame.map_or(true, |id| *id == event.frame_id)
}
