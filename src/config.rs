//! Runtime configuration
//!
//! Everything comes from environment variables: the binary runs as a one-shot
//! job under cron/CI, so the environment is the whole configuration surface.
//! Validation happens before any browser is launched.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors, all fatal before launch
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "no credentials configured: set REMEMBER_WEB_COOKIE, or both \
         WEIRDHOST_EMAIL and WEIRDHOST_PASSWORD"
    )]
    MissingCredentials,

    #[error("no servers configured: set WEIRDHOST_SERVER_URLS to a comma-separated list of server URLs")]
    NoTargets,
}

/// One remotely hosted server instance to renew and start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Management page URL.
    pub url: String,
    /// Display identifier, the final path segment of the URL.
    pub id: String,
}

impl Target {
    pub fn from_url(url: &str) -> Self {
        let id = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                    .map(str::to_string)
            })
            .or_else(|| {
                url.trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            url: url.to_string(),
            id,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Panel base URL.
    pub base_url: String,
    /// Login form URL.
    pub login_url: String,
    /// Servers to process, in configured order.
    pub targets: Vec<Target>,
    /// Remember-me cookie value, the preferred credential.
    pub session_cookie: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub headless: bool,
    /// Human-interaction pacing delay.
    pub slow_mo: Duration,
}

impl Config {
    /// Read configuration from the environment and validate it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_or("WEIRDHOST_URL", "https://hub.weirdhost.xyz");
        let login_url = non_empty(std::env::var("WEIRDHOST_LOGIN_URL").ok())
            .unwrap_or_else(|| format!("{}/auth/login", base_url.trim_end_matches('/')));

        let targets = parse_target_list(
            &std::env::var("WEIRDHOST_SERVER_URLS").unwrap_or_default(),
        );

        let slow_mo_ms = std::env::var("SLOW_MO")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100u64);

        let config = Self {
            base_url,
            login_url,
            targets,
            session_cookie: non_empty(std::env::var("REMEMBER_WEB_COOKIE").ok()),
            email: non_empty(std::env::var("WEIRDHOST_EMAIL").ok()),
            password: non_empty(std::env::var("WEIRDHOST_PASSWORD").ok()),
            headless: env_or("HEADLESS", "true").to_lowercase() == "true",
            slow_mo: Duration::from_millis(slow_mo_ms),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.has_cookie_auth() && !self.has_email_auth() {
            return Err(ConfigError::MissingCredentials);
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(())
    }

    pub fn has_cookie_auth(&self) -> bool {
        self.session_cookie.is_some()
    }

    pub fn has_email_auth(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }

    /// Host the session cookie is scoped to, from the base URL.
    pub fn cookie_domain(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.base_url.clone())
    }
}

/// Parse a comma-separated URL list, skipping empty entries.
pub fn parse_target_list(raw: &str) -> Vec<Target> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Target::from_url)
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    non_empty(std::env::var(key).ok()).unwrap_or_else(|| default.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Every wait the pipeline performs, in one table. Tests swap in
/// [`Timing::instant`] so flows run without real sleeps.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Global pacing delay applied around interactions.
    pub slow_mo: Duration,
    /// Pause between login form fields.
    pub form_field_pause: Duration,
    /// Budget for one matcher to become visible.
    pub selector_budget: Duration,
    /// Poll interval inside bounded waits.
    pub selector_poll: Duration,
    /// Settle pause before scanning for controls.
    pub scan_settle: Duration,
    /// First wait once a challenge interstitial is detected.
    pub challenge_wait: Duration,
    /// Extra wait when the interstitial survives the first wait.
    pub challenge_rewait: Duration,
    /// Budget for the main content area to appear.
    pub content_budget: Duration,
    /// Settle pause after the content wait.
    pub page_settle: Duration,
    /// Hover-to-click pause.
    pub pre_click_pause: Duration,
    /// Wait for the page to react after a click.
    pub post_click_settle: Duration,
    /// Wait before retrying a disabled control.
    pub disabled_retry_pause: Duration,
    /// Pause between the renew and start sub-flows.
    pub between_steps: Duration,
    /// Pause between targets.
    pub between_targets: Duration,
    /// Ceiling for one navigation.
    pub nav_timeout: Duration,
    /// Ceiling for the post-login navigation.
    pub login_nav_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            slow_mo: Duration::from_millis(100),
            form_field_pause: Duration::from_secs(1),
            selector_budget: Duration::from_secs(8),
            selector_poll: Duration::from_millis(500),
            scan_settle: Duration::from_secs(2),
            challenge_wait: Duration::from_secs(10),
            challenge_rewait: Duration::from_secs(5),
            content_budget: Duration::from_secs(15),
            page_settle: Duration::from_secs(3),
            pre_click_pause: Duration::from_secs(1),
            post_click_settle: Duration::from_secs(8),
            disabled_retry_pause: Duration::from_secs(5),
            between_steps: Duration::from_secs(5),
            between_targets: Duration::from_secs(8),
            nav_timeout: Duration::from_secs(120),
            login_nav_timeout: Duration::from_secs(90),
        }
    }
}

impl Timing {
    pub fn with_slow_mo(slow_mo: Duration) -> Self {
        Self {
            slow_mo,
            ..Self::default()
        }
    }

    /// All-zero timing for tests.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            slow_mo: Duration::ZERO,
            form_field_pause: Duration::ZERO,
            selector_budget: Duration::ZERO,
            selector_poll: Duration::ZERO,
            scan_settle: Duration::ZERO,
            challenge_wait: Duration::ZERO,
            challenge_rewait: Duration::ZERO,
            content_budget: Duration::ZERO,
            page_settle: Duration::ZERO,
            pre_click_pause: Duration::ZERO,
            post_click_settle: Duration::ZERO,
            disabled_retry_pause: Duration::ZERO,
            between_steps: Duration::ZERO,
            between_targets: Duration::ZERO,
            nav_timeout: Duration::from_secs(1),
            login_nav_timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            base_url: "https://hub.weirdhost.xyz".to_string(),
            login_url: "https://hub.weirdhost.xyz/auth/login".to_string(),
            targets: parse_target_list("https://hub.weirdhost.xyz/server/abc12345"),
            session_cookie: Some("token".to_string()),
            email: None,
            password: None,
            headless: true,
            slow_mo: Duration::from_millis(100),
        }
    }

    #[test]
    fn target_id_is_final_path_segment() {
        let target = Target::from_url("https://hub.weirdhost.xyz/server/abc12345");
        assert_eq!(target.id, "abc12345");

        let trailing = Target::from_url("https://hub.weirdhost.xyz/server/abc12345/");
        assert_eq!(trailing.id, "abc12345");
    }

    #[test]
    fn target_list_skips_blank_entries() {
        let targets = parse_target_list(" https://h/server/a , https://h/server/b ,, ");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "a");
        assert_eq!(targets[1].id, "b");
    }

    #[test]
    fn missing_both_credential_forms_is_rejected() {
        let config = Config {
            session_cookie: None,
            ..base_config()
        };
        assert_eq!(config.validate(), Err(ConfigError::MissingCredentials));
    }

    #[test]
    fn email_without_password_is_not_a_credential() {
        let config = Config {
            session_cookie: None,
            email: Some("user@example.com".to_string()),
            ..base_config()
        };
        assert_eq!(config.validate(), Err(ConfigError::MissingCredentials));
    }

    #[test]
    fn empty_target_list_is_rejected() {
        let config = Config {
            targets: vec![],
            ..base_config()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoTargets));
    }

    #[test]
    fn cookie_domain_comes_from_base_url() {
        assert_eq!(base_config().cookie_domain(), "hub.weirdhost.xyz");
    }

    #[test]
    fn either_credential_form_passes_validation() {
        assert!(base_config().validate().is_ok());

        let email_config = Config {
            session_cookie: None,
            email: Some("user@example.com".to_string()),
            password: Some("secret".to_string()),
            ..base_config()
        };
        assert!(email_config.validate().is_ok());
    }
}
