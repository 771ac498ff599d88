//! Run orchestration
//!
//! One browser session and one page are owned for the whole run; targets are
//! processed strictly in configured order with fixed pauses between them.
//! Per-target failures are recorded as outcome tags and never stop the run;
//! only launch and authentication failures do, and those still leave every
//! target with a recorded pair.

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::auth;
use crate::browser::{BrowserSession, LivePage, PageOps};
use crate::challenge;
use crate::config::{Config, Target, Timing};
use crate::flows;
use crate::outcome::{OutcomeBook, TargetOutcome};

pub struct Runner {
    config: Config,
    timing: Timing,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        let timing = Timing::with_slow_mo(config.slow_mo);
        Self { config, timing }
    }

    #[cfg(test)]
    pub fn with_timing(config: Config, timing: Timing) -> Self {
        Self { config, timing }
    }

    /// Execute the whole run and return the completed outcome ledger.
    pub async fn run(&self) -> OutcomeBook {
        let mut book = OutcomeBook::seeded(&self.config.targets);

        let launch = BrowserSession::launch(
            self.config.headless,
            self.timing.nav_timeout,
            self.timing.slow_mo,
        );
        match launch.await {
            Ok(session) => {
                self.drive(&session, &mut book).await;
                session.close().await;
            }
            Err(e) => {
                error!("Failed to launch browser: {}", e);
                book.mark_unprocessed_error();
            }
        }

        book
    }

    async fn drive(&self, session: &BrowserSession, book: &mut OutcomeBook) {
        let page = LivePage::new(session);

        match auth::establish(session, &page, &self.config, &self.timing).await {
            Ok(true) => {}
            Ok(false) => {
                error!("All login methods failed");
                book.mark_all_login_failed();
                return;
            }
            Err(e) => {
                error!("Authentication aborted: {}", e);
                book.mark_unprocessed_error();
                return;
            }
        }

        let total = self.config.targets.len();
        for (i, target) in self.config.targets.iter().enumerate() {
            info!("Processing server {}/{}: {}", i + 1, total, target.id);
            let outcome = self.process_target(&page, target).await;
            info!("{}: {}", target.id, outcome.combined());
            book.record(&target.id, outcome);

            if i + 1 < total {
                sleep(self.timing.between_targets).await;
            }
        }
    }

    /// Process one target: renewal first, then startup.
    pub async fn process_target(&self, page: &dyn PageOps, target: &Target) -> TargetOutcome {
        if let Err(e) = page.goto(&target.url).await {
            warn!("{}: navigation failed: {}", target.id, e);
            return TargetOutcome::run_error();
        }
        challenge::wait_out(page, &target.id, &self.timing).await;

        // The session can expire mid-run; a target page that lands on the
        // login path is skipped rather than fought.
        match page.current_url().await {
            Ok(url) if !auth::looks_logged_in(&url) => {
                warn!("{}: session no longer authenticated", target.id);
                return TargetOutcome::login_failed();
            }
            Err(e) => {
                warn!("{}: could not read page URL: {}", target.id, e);
                return TargetOutcome::run_error();
            }
            Ok(_) => {}
        }

        let renew = flows::renew_server(page, target, &self.timing).await;
        sleep(self.timing.between_steps).await;
        let start = flows::start_server(page, target, &self.timing).await;

        TargetOutcome { renew, start }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;
    use crate::config::parse_target_list;
    use crate::outcome::{RenewOutcome, StartOutcome};
    use std::time::Duration;

    fn runner() -> Runner {
        let config = Config {
            base_url: "https://hub.weirdhost.xyz".to_string(),
            login_url: "https://hub.weirdhost.xyz/auth/login".to_string(),
            targets: parse_target_list("https://hub.weirdhost.xyz/server/abc12345"),
            session_cookie: Some("token".to_string()),
            email: None,
            password: None,
            headless: true,
            slow_mo: Duration::ZERO,
        };
        Runner::with_timing(config, Timing::instant())
    }

    #[tokio::test]
    async fn expired_session_short_circuits_the_target() {
        let runner = runner();
        let target = &runner.config.targets[0];
        let page = FakePage::new()
            .with_redirect("https://hub.weirdhost.xyz/auth/login")
            .with_button("시간추가", false);

        let outcome = runner.process_target(&page, target).await;
        assert_eq!(outcome, TargetOutcome::login_failed());
        assert_eq!(page.clicks(), 0);
        // We navigated there once, saw the login redirect, and backed off.
        assert_eq!(page.navigations(), vec![target.url.clone()]);
    }

    #[tokio::test]
    async fn authenticated_target_runs_both_flows() {
        let runner = runner();
        let target = &runner.config.targets[0];
        let page = FakePage::new()
            .with_content("<main>server page</main>")
            .with_content_after_click("<main>추가되었습니다</main>")
            .with_button("시간추가", false)
            .with_button("Start", true);

        let outcome = runner.process_target(&page, target).await;
        assert_eq!(outcome.renew, RenewOutcome::Success);
        assert_eq!(outcome.start, StartOutcome::AlreadyStarted);
        // Only the renew control was clicked; the pre-disabled start control
        // was classified without a click.
        assert_eq!(page.clicks(), 1);
    }
}
