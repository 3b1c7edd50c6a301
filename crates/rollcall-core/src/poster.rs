//! Session-authenticated poll posting.
//!
//! A run goes: lock session file -> launch -> replay saved session (or log in
//! and save a new one) -> open chat -> drain restore dialogs -> create poll.
//! The browser is closed on every path, and a failed run leaves a screenshot.

use crate::automation::{AutomationError, AutomationSession};
use crate::config::{ConfigError, RollcallConfig, Selectors};
use crate::error::{RunError, Stage};
use crate::session::{SessionSnapshot, SessionStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The two fixed answers of every poll.
pub const POLL_OPTIONS: [&str; 2] = ["Yes", "No"];

#[derive(Clone)]
pub struct PosterConfig {
    pub root_url: String,
    pub login_url: String,
    pub chat_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub selectors: Selectors,
    pub step_timeout: Duration,
    pub session_check_timeout: Duration,
    pub interactive_login_timeout: Duration,
    pub dialog_timeout: Duration,
    pub max_dialog_rounds: usize,
    pub session_path: PathBuf,
    pub screenshot_path: PathBuf,
    pub lock_stale_after: Duration,
    pub question_prefix: Option<String>,
    pub headless: bool,
}

impl std::fmt::Debug for PosterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosterConfig")
            .field("chat_url", &self.chat_url)
            .field("login_url", &self.login_url)
            .field("email", &self.email)
            .field("session_path", &self.session_path)
            .field("headless", &self.headless)
            .finish_non_exhaustive()
    }
}

impl PosterConfig {
    pub fn from_config(config: &RollcallConfig) -> Result<Self, ConfigError> {
        let chat_id = config.site.chat_id.trim();
        if chat_id.is_empty() {
            return Err(ConfigError::Missing("site.chat_id"));
        }

        let root = url::Url::parse(&config.site.base_url).map_err(|source| {
            ConfigError::InvalidUrl {
                url: config.site.base_url.clone(),
                source,
            }
        })?;
        let join = |path: &str| {
            root.join(path)
                .map(|u| u.to_string())
                .map_err(|source| ConfigError::InvalidUrl {
                    url: format!("{}{}", root, path),
                    source,
                })
        };

        let timeouts = &config.timeouts;
        Ok(Self {
            root_url: root.to_string(),
            login_url: join("login")?,
            chat_url: join(&format!("t/{}", chat_id))?,
            email: config.credentials.email.clone(),
            password: config.credentials.password.clone(),
            selectors: config.site.selectors.clone(),
            step_timeout: Duration::from_millis(timeouts.step_timeout_ms),
            session_check_timeout: Duration::from_millis(timeouts.session_check_timeout_ms),
            interactive_login_timeout: Duration::from_millis(
                timeouts.interactive_login_timeout_ms,
            ),
            dialog_timeout: Duration::from_millis(timeouts.dialog_timeout_ms),
            max_dialog_rounds: timeouts.max_dialog_rounds.max(1),
            session_path: config.paths.session.clone(),
            screenshot_path: config.paths.screenshot.clone(),
            lock_stale_after: Duration::from_secs(timeouts.lock_stale_after_secs),
            question_prefix: config.poll.question_prefix.clone(),
            headless: config.browser.headless,
        })
    }

    /// Full poll question for a practice label.
    pub fn question_for(&self, label: &str) -> String {
        match self.question_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{} {}", prefix, label),
            _ => label.to_string(),
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReceipt {
    pub question: String,
    pub reused_session: bool,
}

pub struct PollPoster<S: AutomationSession> {
    session: S,
    config: PosterConfig,
    store: SessionStore,
}

impl<S: AutomationSession> PollPoster<S> {
    pub fn new(session: S, config: PosterConfig) -> Self {
        let store =
            SessionStore::new(config.session_path.clone()).with_stale_after(config.lock_stale_after);
        Self {
            session,
            config,
            store,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Post one poll for `label` in the configured chat.
    pub async fn post_poll(&mut self, label: &str) -> Result<PollReceipt, RunError> {
        let _lock = self.store.lock()?;
        let question = self.config.question_for(label);

        let (launched, result) = match self.session.launch().await {
            Ok(()) => (true, self.drive(&question).await),
            Err(e) => (
                false,
                Err(RunError::Resource(format!("browser launch failed: {}", e))),
            ),
        };

        if let Err(e) = &result {
            error!("Poll run failed: {}", e);
            if launched {
                self.capture_screenshot().await;
            }
        }

        match self.session.close().await {
            Ok(()) => info!("Browser closed"),
            Err(e) => warn!("Failed to close browser: {}", e),
        }

        result
    }

    async fn drive(&mut self, question: &str) -> Result<PollReceipt, RunError> {
        let reused_session = self.establish_session().await?;
        self.open_chat().await?;
        self.dismiss_dialogs().await;
        self.create_poll(question).await?;
        Ok(PollReceipt {
            question: question.to_string(),
            reused_session,
        })
    }

    /// Returns true when the saved session was reused.
    async fn establish_session(&mut self) -> Result<bool, RunError> {
        if self.replay_session().await? {
            info!("Session restored");
            return Ok(true);
        }
        self.login().await?;
        Ok(false)
    }

    async fn replay_session(&mut self) -> Result<bool, RunError> {
        let snapshot = match self.store.load().await {
            Ok(Some(snapshot)) if !snapshot.is_empty() => snapshot,
            Ok(_) => {
                info!("No saved session, logging in");
                return Ok(false);
            }
            Err(e) => {
                warn!("Ignoring unusable session file: {}", e);
                return Ok(false);
            }
        };

        let cfg = &self.config;
        self.session
            .set_cookies(&snapshot.cookies)
            .await
            .map_err(RunError::interaction(Stage::SessionReplay))?;
        // localStorage is per origin, so be on the site before writing it.
        self.session
            .navigate(&cfg.root_url)
            .await
            .map_err(RunError::interaction(Stage::SessionReplay))?;
        self.session
            .write_local_storage(&snapshot.local_storage)
            .await
            .map_err(RunError::interaction(Stage::SessionReplay))?;
        self.session
            .navigate(&cfg.chat_url)
            .await
            .map_err(RunError::interaction(Stage::SessionReplay))?;
        debug!(
            "Replayed {} cookies and {} storage entries",
            snapshot.cookies.len(),
            snapshot.local_storage.len()
        );

        match self
            .session
            .wait_for(&cfg.selectors.compose_marker, cfg.session_check_timeout)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_absent() => {
                warn!("Saved session is stale, logging in again");
                Ok(false)
            }
            Err(e) => Err(RunError::Interaction {
                stage: Stage::SessionReplay,
                source: e,
            }),
        }
    }

    async fn login(&mut self) -> Result<(), RunError> {
        let has_credentials = self.config.email.is_some() && self.config.password.is_some();
        match (has_credentials, self.config.headless) {
            (true, _) => self.login_with_credentials().await?,
            (false, false) => self.login_interactively().await?,
            (false, true) => {
                return Err(RunError::Auth(
                    "no credentials configured (set ROLLCALL_EMAIL and ROLLCALL_PASSWORD, \
                     or run with --visible to log in by hand)"
                        .into(),
                ));
            }
        }

        let snapshot = self.capture_snapshot().await?;
        self.store.save(&snapshot)?;
        Ok(())
    }

    async fn login_with_credentials(&mut self) -> Result<(), RunError> {
        let cfg = &self.config;
        let (Some(email), Some(password)) = (cfg.email.as_deref(), cfg.password.as_deref()) else {
            return Err(RunError::Auth("no credentials configured".into()));
        };

        info!("Logging in as {}", email);
        let s = &cfg.selectors;
        self.session
            .navigate(&cfg.login_url)
            .await
            .map_err(RunError::auth)?;
        self.session
            .type_into(&s.login_email, email, cfg.step_timeout)
            .await
            .map_err(RunError::auth)?;
        self.session
            .type_into(&s.login_password, password, cfg.step_timeout)
            .await
            .map_err(RunError::auth)?;
        self.session
            .click(&s.login_submit, cfg.step_timeout)
            .await
            .map_err(RunError::auth)?;
        self.session
            .wait_for_navigation(cfg.step_timeout)
            .await
            .map_err(RunError::auth)?;

        // Checkpoint and 2FA pages also end the navigation.
        self.session
            .wait_for(&s.compose_marker, cfg.session_check_timeout)
            .await
            .map_err(|e| {
                RunError::Auth(format!("not signed in after submitting the login form: {}", e))
            })?;
        info!("Logged in");
        Ok(())
    }

    async fn login_interactively(&mut self) -> Result<(), RunError> {
        let cfg = &self.config;
        self.session
            .navigate(&cfg.login_url)
            .await
            .map_err(RunError::auth)?;
        info!(
            "Please log in manually (username, password, 2FA). You have {}s.",
            cfg.interactive_login_timeout.as_secs()
        );
        self.session
            .wait_for(&cfg.selectors.compose_marker, cfg.interactive_login_timeout)
            .await
            .map_err(|e| RunError::Auth(format!("manual login did not complete: {}", e)))?;
        info!("Logged in");
        Ok(())
    }

    async fn capture_snapshot(&mut self) -> Result<SessionSnapshot, RunError> {
        let capture =
            |e: AutomationError| RunError::Resource(format!("failed to capture session: {}", e));
        let cookies = self.session.get_cookies().await.map_err(capture)?;
        let local_storage = self.session.read_local_storage().await.map_err(capture)?;
        Ok(SessionSnapshot {
            cookies,
            local_storage,
        })
    }

    async fn open_chat(&mut self) -> Result<(), RunError> {
        let result = self
            .session
            .navigate(&self.config.chat_url)
            .await
            .map_err(RunError::interaction(Stage::OpenChat))?;
        info!("Opened chat {}", result.url);
        Ok(())
    }

    /// Best-effort drain: stops at the first round where no dialog shows up.
    async fn dismiss_dialogs(&mut self) {
        let close = self.config.selectors.close_dialog.clone();
        let dont_restore = self.config.selectors.dont_restore.clone();

        for round in 1..=self.config.max_dialog_rounds {
            let closed = self.try_dismiss(&close).await;
            let skipped = self.try_dismiss(&dont_restore).await;
            if !closed && !skipped {
                debug!("No restore dialog found (round {})", round);
                return;
            }
            info!("Restore bypassed (round {})", round);
        }

        warn!(
            "Dialogs kept appearing after {} rounds, continuing",
            self.config.max_dialog_rounds
        );
    }

    async fn try_dismiss(&mut self, selector: &str) -> bool {
        match self.session.click(selector, self.config.dialog_timeout).await {
            Ok(()) => true,
            Err(e) if e.is_absent() => false,
            Err(e) => {
                warn!("Could not dismiss dialog {}: {}", selector, e);
                false
            }
        }
    }

    async fn create_poll(&mut self, question: &str) -> Result<(), RunError> {
        let timeout = self.config.step_timeout;
        let s = &self.config.selectors;

        self.session
            .click(&s.overflow_menu, timeout)
            .await
            .map_err(RunError::interaction(Stage::OpenMenu))?;
        info!("Menu loaded");

        self.session
            .click(&s.create_poll_item, timeout)
            .await
            .map_err(RunError::interaction(Stage::ChoosePoll))?;
        info!("Poll loaded");

        self.session
            .type_into(&s.question_input, question, timeout)
            .await
            .map_err(RunError::interaction(Stage::Question))?;

        let [first, second] = POLL_OPTIONS;
        self.session
            .type_into_nth(&s.option_input, 0, first, timeout)
            .await
            .map_err(RunError::interaction(Stage::Options))?;
        self.session
            .press_key("Tab")
            .await
            .map_err(RunError::interaction(Stage::Options))?;
        self.session
            .type_text(second)
            .await
            .map_err(RunError::interaction(Stage::Options))?;
        info!("Poll question and options entered");

        self.session
            .click(&s.submit_poll, timeout)
            .await
            .map_err(RunError::interaction(Stage::Submit))?;
        info!("Poll created: {}", question);
        Ok(())
    }

    async fn capture_screenshot(&mut self) {
        let path = &self.config.screenshot_path;
        match self.session.screenshot().await {
            Ok(bytes) => match tokio::fs::write(path, bytes).await {
                Ok(()) => info!("Saved failure screenshot to {}", path.display()),
                Err(e) => warn!("Failed to write screenshot {}: {}", path.display(), e),
            },
            Err(e) => warn!("Failed to capture screenshot: {}", e),
        }
    }
}
