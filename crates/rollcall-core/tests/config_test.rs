use rollcall_core::config::{ConfigError, ConfigLoader, RollcallConfig};
use rollcall_core::poster::PosterConfig;
use std::collections::HashMap;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = RollcallConfig::default();
    assert_eq!(config.site.base_url, "https://www.messenger.com/");
    assert_eq!(config.schedule.cron, "22 22 * * *");
    assert_eq!(config.timeouts.step_timeout_ms, 30000);
    assert!(config.timeouts.dialog_timeout_ms < config.timeouts.step_timeout_ms);
    assert!(!config.browser.headless);
}

#[tokio::test]
async fn test_load_partial_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollcall.yaml");
    std::fs::write(
        &path,
        r#"
site:
  chat_id: "12345"
  selectors:
    close_dialog: 'div[aria-label="Dismiss"]'
poll:
  question_prefix: "Practice this week:"
timeouts:
  dialog_timeout_ms: 2000
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from(&path).await.unwrap();
    assert_eq!(config.site.chat_id, "12345");
    assert_eq!(config.site.selectors.close_dialog, r#"div[aria-label="Dismiss"]"#);
    // Unset selectors keep their defaults.
    assert_eq!(
        config.site.selectors.submit_poll,
        r#"div[aria-label="Create poll"]"#
    );
    assert_eq!(config.timeouts.dialog_timeout_ms, 2000);
    assert_eq!(config.timeouts.step_timeout_ms, 30000);
    assert_eq!(
        config.poll.question_prefix.as_deref(),
        Some("Practice this week:")
    );
}

#[tokio::test]
async fn test_bad_yaml_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollcall.yaml");
    std::fs::write(&path, "site: [unclosed").unwrap();
    assert!(matches!(
        ConfigLoader::load_from(&path).await,
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_env_overrides() {
    let mut config = RollcallConfig::default();
    ConfigLoader::apply_env(
        &mut config,
        env(&[
            ("ROLLCALL_CHAT_ID", "999"),
            ("ROLLCALL_EMAIL", "a@b.c"),
            ("ROLLCALL_PASSWORD", "pw"),
            ("ROLLCALL_SCHEDULE", "0 18 * * 1"),
        ]),
    )
    .unwrap();

    assert_eq!(config.site.chat_id, "999");
    assert_eq!(config.credentials.email.as_deref(), Some("a@b.c"));
    assert_eq!(config.credentials.password.as_deref(), Some("pw"));
    assert_eq!(config.schedule.cron, "0 18 * * 1");
}

#[test]
fn test_production_runs_headless() {
    let mut config = RollcallConfig::default();
    ConfigLoader::apply_env(&mut config, env(&[("ROLLCALL_ENV", "Production")])).unwrap();
    assert!(config.browser.headless);

    let mut config = RollcallConfig::default();
    ConfigLoader::apply_env(
        &mut config,
        env(&[("ROLLCALL_ENV", "production"), ("ROLLCALL_HEADLESS", "false")]),
    )
    .unwrap();
    assert!(!config.browser.headless);

    let mut config = RollcallConfig::default();
    ConfigLoader::apply_env(&mut config, env(&[("ROLLCALL_ENV", "development")])).unwrap();
    assert!(!config.browser.headless);
}

#[test]
fn test_invalid_headless_flag() {
    let mut config = RollcallConfig::default();
    let err = ConfigLoader::apply_env(&mut config, env(&[("ROLLCALL_HEADLESS", "maybe")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnv { .. }));
}

#[test]
fn test_password_not_in_debug_output() {
    let mut config = RollcallConfig::default();
    config.credentials.password = Some("hunter2".to_string());
    let debug = format!("{:?}", config);
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_poster_config_urls() {
    let mut config = RollcallConfig::default();
    config.site.chat_id = "809433941499799".to_string();
    config.timeouts.dialog_timeout_ms = 1500;

    let poster = PosterConfig::from_config(&config).unwrap();
    assert_eq!(poster.root_url, "https://www.messenger.com/");
    assert_eq!(poster.login_url, "https://www.messenger.com/login");
    assert_eq!(poster.chat_url, "https://www.messenger.com/t/809433941499799");
    assert_eq!(poster.dialog_timeout, Duration::from_millis(1500));
}

#[test]
fn test_poster_config_requires_chat_id() {
    let config = RollcallConfig::default();
    assert!(matches!(
        PosterConfig::from_config(&config),
        Err(ConfigError::Missing(_))
    ));
}

#[test]
fn test_invalid_base_url() {
    let mut config = RollcallConfig::default();
    config.site.base_url = "not a url".to_string();
    assert!(matches!(
        ConfigLoader::validate(&config),
        Err(ConfigError::InvalidUrl { .. })
    ));
}

#[test]
fn test_question_prefix() {
    let mut config = RollcallConfig::default();
    config.site.chat_id = "1".to_string();
    let plain = PosterConfig::from_config(&config).unwrap();
    assert_eq!(plain.question_for("Friday"), "Friday");

    config.poll.question_prefix = Some("Practice this week:".to_string());
    let prefixed = PosterConfig::from_config(&config).unwrap();
    assert_eq!(
        prefixed.question_for("Friday"),
        "Practice this week: Friday"
    );
}

#[test]
fn test_poster_config_carries_login_mode() {
    let mut config = RollcallConfig::default();
    config.site.chat_id = "1".to_string();

    let headed = PosterConfig::from_config(&config).unwrap();
    assert!(!headed.headless);
    assert_eq!(headed.interactive_login_timeout, Duration::from_secs(60));

    config.browser.headless = true;
    config.timeouts.interactive_login_timeout_ms = 90_000;
    let headless = PosterConfig::from_config(&config).unwrap();
    assert!(headless.headless);
    assert_eq!(headless.interactive_login_timeout, Duration::from_secs(90));
}
