//! Renew and start sub-flows
//!
//! Both flows share a shape: settle the page, resolve the control, handle the
//! disabled case, click, settle again, classify. The panel exposes no
//! structured signal, so classification is substring matching over the page
//! text and the keyword tables below (its two display languages) are the
//! contract. Failure keywords are checked before success keywords; a page can
//! contain both and the failure reading wins.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::PageOps;
use crate::challenge;
use crate::config::{Target, Timing};
use crate::outcome::{RenewOutcome, StartOutcome};
use crate::resolve::{self, ControlKind};

/// Post-click text meaning the renewal was already consumed (or refused).
const RENEW_FAILURE_PATTERNS: [&str; 10] = [
    "already renewed",
    "can't renew",
    "only once",
    "이미",
    "한번",
    "불가능",
    "already added",
    "failed",
    "error",
    "오류",
];

/// Post-click text meaning the renewal landed.
const RENEW_SUCCESS_PATTERNS: [&str; 6] = [
    "success",
    "성공",
    "added",
    "추가됨",
    "시간이 추가",
    "추가되었습니다",
];

/// Page text meaning the server is up.
const RUNNING_PATTERNS: [&str; 4] = ["started", "running", "启动", "시작"];

/// Classify the page state after a renew click. Failure patterns take
/// precedence over success patterns.
pub fn classify_renew(before: &str, after: &str) -> RenewOutcome {
    let haystack = after.to_lowercase();

    if RENEW_FAILURE_PATTERNS.iter().any(|p| haystack.contains(p)) {
        return RenewOutcome::AlreadyRenewed;
    }
    if RENEW_SUCCESS_PATTERNS.iter().any(|p| haystack.contains(p)) {
        return RenewOutcome::Success;
    }
    if before != after {
        RenewOutcome::UnknownChanged
    } else {
        RenewOutcome::NoChange
    }
}

/// Whether the page text claims the server is running.
pub fn mentions_running(content: &str) -> bool {
    let haystack = content.to_lowercase();
    RUNNING_PATTERNS.iter().any(|p| haystack.contains(p))
}

/// Renew one server: navigate, resolve the renew control, click, classify.
pub async fn renew_server(page: &dyn PageOps, target: &Target, timing: &Timing) -> RenewOutcome {
    info!("{}: starting renewal", target.id);

    if let Err(e) = page.goto(&target.url).await {
        warn!("{}: navigation failed: {}", target.id, e);
        return RenewOutcome::Error;
    }
    challenge::wait_for_page_ready(page, &target.id, timing).await;
    sleep(timing.scan_settle).await;

    let Some(control) = resolve::find_control(page, ControlKind::Renew, &target.id, timing).await
    else {
        return RenewOutcome::ButtonMissing;
    };

    if control.disabled {
        warn!(
            "{}: renew control disabled, reloading and retrying once",
            target.id
        );
        sleep(timing.disabled_retry_pause).await;

        if let Err(e) = page.reload().await {
            warn!("{}: reload failed: {}", target.id, e);
            return RenewOutcome::Error;
        }
        challenge::wait_for_page_ready(page, &target.id, timing).await;

        match resolve::find_control(page, ControlKind::Renew, &target.id, timing).await {
            Some(retry) if !retry.disabled => {}
            _ => {
                warn!("{}: renew control still disabled", target.id);
                return RenewOutcome::ButtonDisabled;
            }
        }
    }

    click_renew_and_classify(page, target, timing).await
}

async fn click_renew_and_classify(
    page: &dyn PageOps,
    target: &Target,
    timing: &Timing,
) -> RenewOutcome {
    let before = match page.content().await {
        Ok(content) => content,
        Err(e) => {
            warn!("{}: could not capture page before click: {}", target.id, e);
            return RenewOutcome::Error;
        }
    };

    info!("{}: clicking renew control", target.id);
    if let Err(e) = page.hover_selected().await {
        debug!("{}: hover failed: {}", target.id, e);
    }
    sleep(timing.pre_click_pause).await;

    if let Err(e) = page.click_selected().await {
        warn!("{}: renew click failed: {}", target.id, e);
        return RenewOutcome::ClickError;
    }

    sleep(timing.post_click_settle).await;
    challenge::wait_out(page, &target.id, timing).await;

    let after = match page.content().await {
        Ok(content) => content,
        Err(e) => {
            warn!("{}: could not capture page after click: {}", target.id, e);
            return RenewOutcome::ClickError;
        }
    };

    let outcome = classify_renew(&before, &after);
    info!("{}: renewal result: {}", target.id, outcome.tag());
    outcome
}

/// Start one server. A start control that is disabled before any click is
/// read as the running state itself and classified without clicking.
pub async fn start_server(page: &dyn PageOps, target: &Target, timing: &Timing) -> StartOutcome {
    info!("{}: starting server", target.id);

    if let Err(e) = page.reload().await {
        warn!("{}: reload failed: {}", target.id, e);
        return StartOutcome::Error;
    }
    challenge::wait_for_page_ready(page, &target.id, timing).await;

    let Some(mut control) = resolve::find_control(page, ControlKind::Start, &target.id, timing).await
    else {
        return StartOutcome::ButtonMissing;
    };

    if control.disabled {
        debug!(
            "{}: start control disabled on first sight, re-checking",
            target.id
        );
        sleep(timing.disabled_retry_pause).await;

        control = match resolve::find_control(page, ControlKind::Start, &target.id, timing).await {
            Some(retry) => retry,
            None => {
                info!("{}: start control gone, treating as already running", target.id);
                return StartOutcome::AlreadyStarted;
            }
        };
    }

    if control.disabled {
        info!("{}: start control disabled, server already running", target.id);
        return StartOutcome::AlreadyStarted;
    }

    info!("{}: clicking start control", target.id);
    if let Err(e) = page.hover_selected().await {
        debug!("{}: hover failed: {}", target.id, e);
    }
    sleep(timing.pre_click_pause).await;

    if let Err(e) = page.click_selected().await {
        warn!("{}: start click failed: {}", target.id, e);
        return StartOutcome::Error;
    }

    sleep(timing.post_click_settle).await;
    challenge::wait_out(page, &target.id, timing).await;

    // A freshly re-resolved control that is now disabled is the strongest
    // "running" signal the panel gives.
    match resolve::find_control(page, ControlKind::Start, &target.id, timing).await {
        Some(after) if after.disabled => {
            info!("{}: start control now disabled, server started", target.id);
            StartOutcome::Success
        }
        _ => match page.content().await {
            Ok(content) if mentions_running(&content) => {
                info!("{}: page reports server running", target.id);
                StartOutcome::Success
            }
            Ok(_) => {
                warn!("{}: start issued but state unknown", target.id);
                StartOutcome::Unknown
            }
            Err(e) => {
                warn!("{}: could not read page after start click: {}", target.id, e);
                StartOutcome::Unknown
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;

    fn target() -> Target {
        Target::from_url("https://hub.weirdhost.xyz/server/abc12345")
    }

    #[test]
    fn failure_keywords_take_precedence_over_success_keywords() {
        let after = "Success! ... but: you can renew only once per day";
        assert_eq!(classify_renew("before", after), RenewOutcome::AlreadyRenewed);
    }

    #[test]
    fn success_keywords_classify_as_renewed() {
        assert_eq!(
            classify_renew("before", "시간이 추가되었습니다"),
            RenewOutcome::Success
        );
    }

    #[test]
    fn changed_page_without_keywords_is_unknown() {
        assert_eq!(
            classify_renew("<p>old</p>", "<p>new</p>"),
            RenewOutcome::UnknownChanged
        );
    }

    #[test]
    fn unchanged_page_is_no_change() {
        assert_eq!(classify_renew("<p>same</p>", "<p>same</p>"), RenewOutcome::NoChange);
    }

    #[tokio::test]
    async fn renew_click_is_classified_from_page_text() {
        let page = FakePage::new()
            .with_content("<main>server page</main>")
            .with_content_after_click("<main>30분 추가되었습니다</main>")
            .with_button("시간추가", false);

        let outcome = renew_server(&page, &target(), &Timing::instant()).await;
        assert_eq!(outcome, RenewOutcome::Success);
        assert_eq!(page.clicks(), 1);
    }

    #[tokio::test]
    async fn missing_renew_control_reports_button_missing() {
        let page = FakePage::new().with_content("<main>bare page</main>");
        let outcome = renew_server(&page, &target(), &Timing::instant()).await;
        assert_eq!(outcome, RenewOutcome::ButtonMissing);
        assert_eq!(page.clicks(), 0);
    }

    #[tokio::test]
    async fn persistently_disabled_renew_control_is_reported_without_click() {
        let page = FakePage::new()
            .with_content("<main>server page</main>")
            .with_button("시간추가", true);

        let outcome = renew_server(&page, &target(), &Timing::instant()).await;
        assert_eq!(outcome, RenewOutcome::ButtonDisabled);
        assert_eq!(page.clicks(), 0);
        assert_eq!(page.reloads(), 1);
    }

    #[tokio::test]
    async fn pre_disabled_start_control_means_already_started_without_click() {
        let page = FakePage::new()
            .with_content("<main>server page</main>")
            .with_button("Start", true);

        let outcome = start_server(&page, &target(), &Timing::instant()).await;
        assert_eq!(outcome, StartOutcome::AlreadyStarted);
        assert_eq!(page.clicks(), 0);
    }

    #[tokio::test]
    async fn start_control_disabling_after_click_is_success() {
        let page = FakePage::new()
            .with_content("<main>server page</main>")
            .with_button("Start", false)
            .disable_selected_on_click();

        let outcome = start_server(&page, &target(), &Timing::instant()).await;
        assert_eq!(outcome, StartOutcome::Success);
        assert_eq!(page.clicks(), 1);
    }

    #[tokio::test]
    async fn start_falls_back_to_running_text_when_control_stays_enabled() {
        let page = FakePage::new()
            .with_content("<main>server page</main>")
            .with_content_after_click("<main>Status: running</main>")
            .with_button("Start", false);

        let outcome = start_server(&page, &target(), &Timing::instant()).await;
        assert_eq!(outcome, StartOutcome::Success);
    }

    #[tokio::test]
    async fn start_with_no_signal_at_all_is_unknown() {
        let page = FakePage::new()
            .with_content("<main>server page</main>")
            .with_content_after_click("<main>nothing conclusive here</main>")
            .with_button("Start", false);

        let outcome = start_server(&page, &target(), &Timing::instant()).await;
        assert_eq!(outcome, StartOutcome::Unknown);
    }
}
