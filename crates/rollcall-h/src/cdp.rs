use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use rollcall_core::automation::AutomationError;
use rollcall_core::config::BrowserConfig as BrowserOptions;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Chromium profile directory. An isolated profile is deleted when dropped.
enum Profile {
    Configured(PathBuf),
    Isolated(TempDir),
}

impl Profile {
    fn resolve(options: &BrowserOptions) -> Result<Self, AutomationError> {
        if let Some(path) = &options.user_data_dir {
            std::fs::create_dir_all(path).map_err(|e| {
                AutomationError::Launch(format!("user data dir {}: {}", path.display(), e))
            })?;
            tracing::info!("Using user data dir: {}", path.display());
            return Ok(Profile::Configured(path.clone()));
        }

        let dir = tempfile::Builder::new()
            .prefix("rollcall-profile-")
            .tempdir()
            .map_err(|e| AutomationError::Launch(format!("temporary profile: {}", e)))?;
        tracing::debug!("Using isolated user data dir: {}", dir.path().display());
        Ok(Profile::Isolated(dir))
    }

    fn path(&self) -> &Path {
        match self {
            Profile::Configured(path) => path,
            Profile::Isolated(dir) => dir.path(),
        }
    }
}

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    profile: Profile,
}

impl CdpClient {
    pub async fn launch(options: &BrowserOptions) -> Result<Self, AutomationError> {
        let profile = Profile::resolve(options)?;

        // Chromium's sandbox refuses to start as root inside containers.
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile.path());
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(chrome_bin) = &options.chrome_executable {
            tracing::info!("Using Chrome binary {}", chrome_bin.display());
            builder = builder.chrome_executable(chrome_bin);
        }
        let config = builder.build().map_err(AutomationError::Launch)?;

        tracing::info!(
            "Starting Chromium ({})",
            if options.headless { "headless" } else { "visible" }
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {}", e);
                }
            }
            tracing::debug!("CDP handler stopped");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AutomationError::Launch(format!("new page: {}", e)))?;

        forward_console(&page).await?;
        accept_js_dialogs(&page).await?;

        Ok(Self {
            browser,
            handler_task,
            page,
            profile,
        })
    }

    /// Shut Chromium down. The isolated profile, if any, goes with it.
    pub async fn close(mut self) -> Result<(), AutomationError> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| AutomationError::Other(format!("closing browser: {}", e)));
        if result.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();

        if let Profile::Isolated(dir) = self.profile {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::debug!("Could not remove profile {}: {}", path.display(), e);
            }
        }
        result
    }
}

async fn forward_console(page: &Page) -> Result<(), AutomationError> {
    let mut events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| AutomationError::Launch(format!("console events: {}", e)))?;

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let line = event
                .args
                .iter()
                .map(|arg| arg.description.as_deref().unwrap_or("?"))
                .collect::<Vec<_>>()
                .join(" ");
            tracing::debug!("console.{:?}: {}", event.r#type, line);
        }
    });
    Ok(())
}

/// alert/confirm/beforeunload prompts block every later CDP call until answered.
async fn accept_js_dialogs(page: &Page) -> Result<(), AutomationError> {
    let mut events = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| AutomationError::Launch(format!("dialog events: {}", e)))?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            tracing::info!("Accepting {:?} prompt: {}", event.r#type, event.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                tracing::warn!("Could not accept prompt: {}", e);
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_profile_is_created_and_kept() {
        let root = tempfile::tempdir().unwrap();
        let options = BrowserOptions {
            user_data_dir: Some(root.path().join("profile")),
            ..BrowserOptions::default()
        };

        let profile = Profile::resolve(&options).unwrap();
        assert!(matches!(profile, Profile::Configured(_)));
        let path = profile.path().to_path_buf();
        assert!(path.is_dir());
        drop(profile);
        assert!(path.is_dir());
    }

    #[test]
    fn test_isolated_profile_removed_on_drop() {
        let profile = Profile::resolve(&BrowserOptions::default()).unwrap();
        let path = profile.path().to_path_buf();
        assert!(path.is_dir());
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("rollcall-profile-")
        );
        drop(profile);
        assert!(!path.exists());
    }
}
