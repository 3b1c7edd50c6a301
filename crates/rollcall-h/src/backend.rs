use crate::cdp::CdpClient;
use crate::storage;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams, TimeSinceEpoch};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use rollcall_core::automation::{AutomationError, AutomationSession, NavigationResult};
use rollcall_core::config::BrowserConfig as BrowserOptions;
use rollcall_core::session::SnapshotCookie;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Delay between selector probes while waiting for an element.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Chromium session driven over the DevTools protocol.
pub struct HeadlessSession {
    client: Option<CdpClient>,
    options: BrowserOptions,
}

impl HeadlessSession {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            client: None,
            options,
        }
    }

    pub fn get_client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn page(&self) -> Result<&chromiumoxide::Page, AutomationError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(AutomationError::NotReady)
    }

    async fn get_navigation_result(
        page: &chromiumoxide::Page,
    ) -> Result<NavigationResult, AutomationError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| AutomationError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }

    /// Poll until at least `index + 1` elements match `selector`, then return the `index`-th.
    async fn find_nth(
        &self,
        selector: &str,
        index: usize,
        timeout: Duration,
    ) -> Result<Element, AutomationError> {
        let page = self.page()?;
        let search = async {
            loop {
                match page.find_elements(selector).await {
                    Ok(mut elements) if elements.len() > index => {
                        return elements.swap_remove(index);
                    }
                    Ok(elements) => {
                        debug!("{} matched {} elements, waiting", selector, elements.len())
                    }
                    Err(e) => debug!("{} not found yet: {}", selector, e),
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, search)
            .await
            .map_err(|_| AutomationError::Timeout {
                what: selector.to_string(),
                after: timeout,
            })
    }

    async fn dispatch_key(
        page: &chromiumoxide::Page,
        kind: DispatchKeyEventType,
        key: &str,
    ) -> Result<(), AutomationError> {
        let mut builder = DispatchKeyEventParams::builder().r#type(kind).key(key).code(key);
        if let Some(code) = virtual_key_code(key) {
            builder = builder
                .windows_virtual_key_code(code)
                .native_virtual_key_code(code);
        }
        let event = builder
            .build()
            .map_err(|e| AutomationError::Other(format!("Failed to build key event: {:?}", e)))?;
        page.execute(event)
            .await
            .map_err(|e| AutomationError::Other(format!("press_key {} failed: {}", key, e)))?;
        Ok(())
    }
}

fn virtual_key_code(key: &str) -> Option<i64> {
    match key {
        "Backspace" => Some(8),
        "Tab" => Some(9),
        "Enter" => Some(13),
        "Escape" => Some(27),
        _ => None,
    }
}

fn to_cookie_param(cookie: &SnapshotCookie) -> Result<CookieParam, AutomationError> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .http_only(cookie.http_only)
        .secure(cookie.secure);
    if !cookie.is_session_cookie() {
        builder = builder.expires(TimeSinceEpoch::new(cookie.expires));
    }
    builder
        .build()
        .map_err(|e| AutomationError::Other(format!("Invalid cookie {}: {}", cookie.name, e)))
}

#[async_trait]
impl AutomationSession for HeadlessSession {
    async fn launch(&mut self) -> Result<(), AutomationError> {
        info!("Launching headless session (Chromium)...");
        self.client = Some(CdpClient::launch(&self.options).await?);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, AutomationError> {
        let page = self.page()?;
        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| AutomationError::Navigation(e.to_string()))?;
        Self::get_navigation_result(page).await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), AutomationError> {
        self.find_nth(selector, 0, timeout).await.map(|_| ())
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), AutomationError> {
        let element = self.find_nth(selector, 0, timeout).await?;
        element
            .click()
            .await
            .map_err(|e| AutomationError::Other(format!("click {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn type_into_nth(
        &mut self,
        selector: &str,
        index: usize,
        text: &str,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        let element = self.find_nth(selector, index, timeout).await?;
        element
            .click()
            .await
            .map_err(|e| AutomationError::Other(format!("focus {} failed: {}", selector, e)))?
            .type_str(text)
            .await
            .map_err(|e| AutomationError::Other(format!("typing into {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), AutomationError> {
        let page = self.page()?;
        Self::dispatch_key(page, DispatchKeyEventType::KeyDown, key).await?;
        Self::dispatch_key(page, DispatchKeyEventType::KeyUp, key).await
    }

    async fn type_text(&mut self, text: &str) -> Result<(), AutomationError> {
        let page = self.page()?;
        page.execute(InsertTextParams::new(text))
            .await
            .map_err(|e| AutomationError::Other(format!("type_text failed: {}", e)))?;
        Ok(())
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<(), AutomationError> {
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
            Err(_) => Err(AutomationError::Timeout {
                what: "navigation".to_string(),
                after: timeout,
            }),
            Ok(Err(e)) => Err(AutomationError::Navigation(e.to_string())),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, AutomationError> {
        let page = self.page()?;
        page.screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| AutomationError::Other(format!("Screenshot failed: {}", e)))
    }

    async fn get_cookies(&mut self) -> Result<Vec<SnapshotCookie>, AutomationError> {
        let page = self.page()?;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| AutomationError::Other(format!("Get cookies failed: {}", e)))?;

        Ok(cookies
            .into_iter()
            .map(|c| SnapshotCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: c.expires,
                http_only: c.http_only,
                secure: c.secure,
            })
            .collect())
    }

    async fn set_cookies(&mut self, cookies: &[SnapshotCookie]) -> Result<(), AutomationError> {
        if cookies.is_empty() {
            return Ok(());
        }
        let page = self.page()?;
        let params = cookies
            .iter()
            .map(to_cookie_param)
            .collect::<Result<Vec<_>, _>>()?;
        page.execute(SetCookiesParams::new(params))
            .await
            .map_err(|e| AutomationError::Other(format!("Set cookies failed: {}", e)))?;
        debug!("Restored {} cookies", cookies.len());
        Ok(())
    }

    async fn read_local_storage(&mut self) -> Result<BTreeMap<String, String>, AutomationError> {
        let page = self.page()?;
        storage::read_local_storage(page)
            .await
            .map_err(|e| AutomationError::Script(e.to_string()))
    }

    async fn write_local_storage(
        &mut self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), AutomationError> {
        let page = self.page()?;
        storage::write_local_storage(page, entries)
            .await
            .map_err(|e| AutomationError::Script(e.to_string()))
    }
}
