use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollcallConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Group chat the poll is posted to.
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub selectors: Selectors,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_id: String::new(),
            selectors: Selectors::default(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.messenger.com/".to_string()
}

/// CSS selectors for every element the poster touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub compose_marker: String,
    pub login_email: String,
    pub login_password: String,
    pub login_submit: String,
    pub close_dialog: String,
    pub dont_restore: String,
    pub overflow_menu: String,
    pub create_poll_item: String,
    pub question_input: String,
    pub option_input: String,
    pub submit_poll: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            compose_marker: r#"div[role="textbox"][aria-label="Message"]"#.to_string(),
            login_email: r#"input[name="email"]"#.to_string(),
            login_password: r#"input[name="pass"]"#.to_string(),
            login_submit: r#"button[name="login"]"#.to_string(),
            close_dialog: r#"div[role="button"][aria-label="Close"]"#.to_string(),
            dont_restore: r#"div[role="button"][aria-label="Don't restore messages"]"#
                .to_string(),
            overflow_menu: r#"div[role="button"][aria-haspopup="menu"]"#.to_string(),
            create_poll_item: r#"div[role="menuitem"][aria-label="Create a poll"]"#.to_string(),
            question_input: r#"input[aria-label="Ask a question"]"#.to_string(),
            option_input: r#"input[aria-label="Add option..."]"#.to_string(),
            submit_poll: r#"div[aria-label="Create poll"]"#.to_string(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    /// Fixed profile directory; an isolated temporary profile is used when unset.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_executable: None,
            user_data_dir: None,
        }
    }
}

fn default_headless() -> bool {
    false
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_practices_path")]
    pub practices: PathBuf,
    #[serde(default = "default_session_path")]
    pub session: PathBuf,
    #[serde(default = "default_screenshot_path")]
    pub screenshot: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            practices: default_practices_path(),
            session: default_session_path(),
            screenshot: default_screenshot_path(),
        }
    }
}

fn default_practices_path() -> PathBuf {
    PathBuf::from("./practices.json")
}

fn default_session_path() -> PathBuf {
    PathBuf::from("./session.json")
}

fn default_screenshot_path() -> PathBuf {
    PathBuf::from("./poll-error.png")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    #[serde(default = "default_session_check_timeout_ms")]
    pub session_check_timeout_ms: u64,
    /// How long a headed run waits for someone to finish logging in by hand.
    #[serde(default = "default_interactive_login_timeout_ms")]
    pub interactive_login_timeout_ms: u64,
    #[serde(default = "default_dialog_timeout_ms")]
    pub dialog_timeout_ms: u64,
    #[serde(default = "default_max_dialog_rounds")]
    pub max_dialog_rounds: usize,
    #[serde(default = "default_lock_stale_after_secs")]
    pub lock_stale_after_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: default_step_timeout_ms(),
            session_check_timeout_ms: default_session_check_timeout_ms(),
            interactive_login_timeout_ms: default_interactive_login_timeout_ms(),
            dialog_timeout_ms: default_dialog_timeout_ms(),
            max_dialog_rounds: default_max_dialog_rounds(),
            lock_stale_after_secs: default_lock_stale_after_secs(),
        }
    }
}

fn default_step_timeout_ms() -> u64 {
    30000
}

fn default_session_check_timeout_ms() -> u64 {
    15000
}

fn default_interactive_login_timeout_ms() -> u64 {
    60000
}

fn default_dialog_timeout_ms() -> u64 {
    5000
}

fn default_max_dialog_rounds() -> usize {
    5
}

fn default_lock_stale_after_secs() -> u64 {
    15 * 60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollConfig {
    /// Text placed before the practice label, e.g. "Practice this week:".
    #[serde(default)]
    pub question_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_cron")]
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
        }
    }
}

fn default_cron() -> String {
    "22 22 * * *".to_string()
}
