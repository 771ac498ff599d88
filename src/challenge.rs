//! Bot-mitigation interstitial handling
//!
//! The panel sits behind a browser-check interstitial that can swallow the
//! first page load. There is nothing to solve from here: detection is a fixed
//! selector list plus a page-text scan, and the only remedy is waiting it
//! out. A failed detection is treated as "no challenge present"; this path
//! never errors the run.

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::browser::PageOps;
use crate::config::Timing;

/// Selectors known to mark the interstitial page.
const CHALLENGE_SELECTORS: [&str; 5] = [
    "#challenge-form",
    ".challenge-form",
    "#challenge-running",
    "#cf-content",
    "#challenge-stage",
];

/// Challenge phrases scanned for in the page text.
const CHALLENGE_PHRASES: [&str; 4] = [
    "checking your browser",
    "verify",
    "security check",
    "cloudflare",
];

/// Selector for the panel's main content area.
const MAIN_CONTENT_SELECTOR: &str =
    ".server-details, .server-info, .card, .panel, .container, main, article";

/// Detect the interstitial and passively wait it out. Returns whether a
/// challenge was seen; the wait does not confirm resolution, only elapsed
/// time.
pub async fn wait_out(page: &dyn PageOps, label: &str, timing: &Timing) -> bool {
    for selector in CHALLENGE_SELECTORS {
        match page.selector_visible(selector).await {
            Ok(true) => {
                warn!("{}: challenge interstitial detected ({})", label, selector);
                sleep(timing.challenge_wait).await;

                if page.selector_visible(selector).await.unwrap_or(false) {
                    warn!("{}: challenge still present, waiting longer", label);
                    sleep(timing.challenge_rewait).await;
                }

                info!("{}: challenge wait finished", label);
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                debug!("{}: challenge probe failed on {}: {}", label, selector, e);
            }
        }
    }

    let text = match page.content().await {
        Ok(content) => content.to_lowercase(),
        Err(e) => {
            debug!("{}: could not read page text for challenge scan: {}", label, e);
            return false;
        }
    };

    for phrase in CHALLENGE_PHRASES {
        if text.contains(phrase) {
            warn!("{}: challenge text detected ({:?})", label, phrase);
            sleep(timing.challenge_wait).await;
            return true;
        }
    }

    false
}

/// Wait until the page looks settled: challenge out of the way, main content
/// present, dynamic content given time to land, challenge re-checked.
pub async fn wait_for_page_ready(page: &dyn PageOps, label: &str, timing: &Timing) {
    wait_out(page, label, timing).await;

    let deadline = Instant::now() + timing.content_budget;
    let mut content_found = false;
    loop {
        if page
            .selector_visible(MAIN_CONTENT_SELECTOR)
            .await
            .unwrap_or(false)
        {
            content_found = true;
            break;
        }
        if Instant::now() >= deadline {
            break;
        }
        sleep(timing.selector_poll).await;
    }

    if content_found {
        debug!("{}: main content loaded", label);
    } else {
        warn!("{}: main content area not found", label);
    }

    sleep(timing.page_settle).await;
    wait_out(page, label, timing).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;

    #[tokio::test]
    async fn clean_page_has_no_challenge() {
        let page = FakePage::new().with_content("<html><body>Server panel</body></html>");
        assert!(!wait_out(&page, "test", &Timing::instant()).await);
    }

    #[tokio::test]
    async fn visible_interstitial_selector_is_detected() {
        let page = FakePage::new().with_visible_selector("#cf-content");
        assert!(wait_out(&page, "test", &Timing::instant()).await);
    }

    #[tokio::test]
    async fn challenge_phrase_in_page_text_is_detected() {
        let page = FakePage::new().with_content("<p>Checking your browser before accessing</p>");
        assert!(wait_out(&page, "test", &Timing::instant()).await);
    }

    #[tokio::test]
    async fn page_ready_tolerates_missing_content_area() {
        let page = FakePage::new().with_content("<html></html>");
        // Must return without erroring even when nothing matches.
        wait_for_page_ready(&page, "test", &Timing::instant()).await;
    }
}
