use crate::session::SnapshotCookie;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Browser session not launched")]
    NotReady,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("{0}")]
    Other(String),
}

impl AutomationError {
    /// True when the error only says "the thing was not there".
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ElementNotFound(_))
    }
}

/// Selector-driven browser interface the poll poster is written against.
///
/// Every wait takes an explicit timeout; implementations report an expired
/// wait as [`AutomationError::Timeout`].
#[async_trait]
pub trait AutomationSession: Send {
    /// Start the browser and open a blank page.
    async fn launch(&mut self) -> Result<(), AutomationError>;

    /// Close the browser and release its resources.
    async fn close(&mut self) -> Result<(), AutomationError>;

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, AutomationError>;

    /// Wait until an element matching `selector` is present.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), AutomationError>;

    /// Wait for `selector` and click the first match.
    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), AutomationError>;

    /// Wait for `selector`, focus the first match and type `text` into it.
    async fn type_into(
        &mut self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        self.type_into_nth(selector, 0, text, timeout).await
    }

    /// Like [`type_into`](Self::type_into) but targets the `index`-th match.
    async fn type_into_nth(
        &mut self,
        selector: &str,
        index: usize,
        text: &str,
        timeout: Duration,
    ) -> Result<(), AutomationError>;

    /// Press and release a single key on the focused element.
    async fn press_key(&mut self, key: &str) -> Result<(), AutomationError>;

    /// Type text into whatever element currently has focus.
    async fn type_text(&mut self, text: &str) -> Result<(), AutomationError>;

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<(), AutomationError>;

    /// Capture a full-page PNG screenshot.
    async fn screenshot(&mut self) -> Result<Vec<u8>, AutomationError>;

    async fn get_cookies(&mut self) -> Result<Vec<SnapshotCookie>, AutomationError>;

    async fn set_cookies(&mut self, cookies: &[SnapshotCookie]) -> Result<(), AutomationError>;

    /// Read every localStorage entry of the current origin.
    async fn read_local_storage(&mut self) -> Result<BTreeMap<String, String>, AutomationError>;

    async fn write_local_storage(
        &mut self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), AutomationError>;
}
