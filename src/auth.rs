//! Session establishment
//!
//! Two ways in: install the panel's remember-me cookie, or drive the login
//! form. The cookie is preferred and tried first; the form is the fallback.
//! Either way, "authenticated" is judged by the same URL heuristic the rest
//! of the run uses: we are logged in iff the landing URL does not point at a
//! login/auth path. The panel exposes no stronger signal we could check
//! without scraping authenticated-only markup.

use tokio::time::sleep;
use tracing::{info, warn};

use crate::browser::{BrowserError, BrowserSession, PageOps};
use crate::challenge;
use crate::config::{Config, Timing};

/// The panel's Laravel remember-me cookie.
pub const SESSION_COOKIE_NAME: &str = "remember_web_59ba36addc2b2f9401580f014c7f58ea4e30989d";

const USERNAME_INPUT: &str = r#"input[name="username"]"#;
const PASSWORD_INPUT: &str = r#"input[name="password"]"#;
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// URL heuristic for the authenticated state. Known weak point: any
/// unrelated path containing `login` or `auth` reads as logged-out.
pub fn looks_logged_in(url: &str) -> bool {
    !(url.contains("login") || url.contains("auth"))
}

/// Try the credential paths in preference order. `Ok(false)` means every
/// path was tried and rejected; `Err` means the panel stopped answering and
/// the run cannot continue.
pub async fn establish(
    session: &BrowserSession,
    page: &dyn PageOps,
    config: &Config,
    timing: &Timing,
) -> Result<bool, BrowserError> {
    if let Some(token) = &config.session_cookie {
        info!("Trying cookie login");
        match cookie_login(session, page, config, token, timing).await {
            Ok(true) => {
                info!("Cookie login succeeded");
                return Ok(true);
            }
            Ok(false) => warn!("Cookie login failed, token may be expired"),
            Err(e) => return Err(e),
        }
    }

    if config.has_email_auth() {
        info!("Trying email/password login");
        match form_login(session, page, config, timing).await {
            Ok(true) => {
                info!("Email/password login succeeded");
                return Ok(true);
            }
            Ok(false) => warn!("Email/password login failed, still on a login page"),
            Err(e) => warn!("Email/password login errored: {}", e),
        }
    }

    Ok(false)
}

async fn cookie_login(
    session: &BrowserSession,
    page: &dyn PageOps,
    config: &Config,
    token: &str,
    timing: &Timing,
) -> Result<bool, BrowserError> {
    session
        .set_session_cookie(SESSION_COOKIE_NAME, token, &config.cookie_domain())
        .await?;

    // Any authenticated-only page would do; the panel home redirects to the
    // login path when the cookie is rejected.
    page.goto(&config.base_url).await?;
    challenge::wait_out(page, "login-check", timing).await;

    let url = page.current_url().await?;
    Ok(looks_logged_in(&url))
}

async fn form_login(
    session: &BrowserSession,
    page: &dyn PageOps,
    config: &Config,
    timing: &Timing,
) -> Result<bool, BrowserError> {
    let (email, password) = match (&config.email, &config.password) {
        (Some(email), Some(password)) => (email.as_str(), password.as_str()),
        _ => return Ok(false),
    };

    page.goto(&config.login_url).await?;
    challenge::wait_out(page, "login-form", timing).await;

    for selector in [USERNAME_INPUT, PASSWORD_INPUT, SUBMIT_BUTTON] {
        session
            .wait_for_element(selector, timing.selector_budget, timing.selector_poll)
            .await?;
    }

    info!("Filling login form");
    session.fill_human(USERNAME_INPUT, email).await?;
    sleep(timing.form_field_pause).await;
    session.fill_human(PASSWORD_INPUT, password).await?;
    sleep(timing.form_field_pause).await;

    session.click(SUBMIT_BUTTON).await?;
    session.wait_for_navigation(timing.login_nav_timeout).await?;
    challenge::wait_out(page, "login-form", timing).await;

    let url = page.current_url().await?;
    Ok(looks_logged_in(&url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_and_auth_paths_read_as_logged_out() {
        assert!(!looks_logged_in("https://hub.weirdhost.xyz/auth/login"));
        assert!(!looks_logged_in("https://hub.weirdhost.xyz/login?next=/server/a"));
        assert!(!looks_logged_in("https://hub.weirdhost.xyz/auth"));
    }

    #[test]
    fn other_paths_read_as_logged_in() {
        assert!(looks_logged_in("https://hub.weirdhost.xyz/"));
        assert!(looks_logged_in("https://hub.weirdhost.xyz/server/abc12345"));
    }
}
