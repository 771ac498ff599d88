//! Control lookup
//!
//! The panel's markup is not ours and drifts between languages and themes, so
//! lookup is layered: an ordered list of role-specific matchers probed with a
//! bounded wait, then a scan of every visible button, then a scan restricted
//! to primary-action styled controls. Text comparison is exact for the start
//! role and substring for the renew role. Every failure mode degrades to
//! "absent"; the flows turn absence into an outcome tag.

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::browser::{ControlInfo, ControlScope, Matcher, PageOps};
use crate::config::Timing;

/// Semantic role of the control being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Renew,
    Start,
}

impl ControlKind {
    pub fn label(self) -> &'static str {
        match self {
            ControlKind::Renew => "renew",
            ControlKind::Start => "start",
        }
    }
}

/// Fallback keyword set for the renew role (substring match).
const RENEW_KEYWORDS: [&str; 4] = ["시간", "Renew", "Add", "추가"];

/// Fallback keyword set for the start role (exact match).
const START_KEYWORDS: [&str; 2] = ["Start", "시작"];

/// Role-specific matcher list, most specific first. The Korean labels are
/// what the panel actually renders; the English ones cover its other locale.
pub fn matchers_for(kind: ControlKind) -> Vec<Matcher> {
    match kind {
        ControlKind::Renew => vec![
            Matcher::text("시간추가"),
            Matcher::text("시간 추가"),
            Matcher::xpath(r#"//button[contains(., "시간추가")]"#),
            Matcher::xpath(r#"//button[contains(., "시간 추가")]"#),
            Matcher::text("Renew"),
            Matcher::text("Add Time"),
        ],
        ControlKind::Start => vec![
            Matcher::text("Start"),
            Matcher::xpath(r#"//button[text()="Start"]"#),
            Matcher::text("Start Server"),
            Matcher::exact_text("시작"),
            Matcher::xpath(r#"//button[contains(., "Start")]"#),
        ],
    }
}

/// Fallback keywords and the comparison mode for a role.
pub fn keywords_for(kind: ControlKind) -> (&'static [&'static str], bool) {
    match kind {
        ControlKind::Renew => (&RENEW_KEYWORDS, false),
        ControlKind::Start => (&START_KEYWORDS, true),
    }
}

/// Compare trimmed control text against a keyword set.
pub fn text_matches(text: &str, keywords: &[&str], exact: bool) -> bool {
    let text = text.trim();
    if exact {
        keywords.iter().any(|k| text == *k)
    } else {
        keywords.iter().any(|k| text.contains(k))
    }
}

/// Find the control for a role, leaving it selected for hover/click.
/// Absence covers both "nothing matched" and "the page would not answer".
pub async fn find_control(
    page: &dyn PageOps,
    kind: ControlKind,
    label: &str,
    timing: &Timing,
) -> Option<ControlInfo> {
    for matcher in matchers_for(kind) {
        if let Some(control) = probe_until_visible(page, &matcher, timing).await {
            info!(
                "{}: found {} control via {}",
                label,
                kind.label(),
                matcher.describe()
            );
            return Some(control);
        }
    }

    let (keywords, exact) = keywords_for(kind);
    for scope in [ControlScope::AllButtons, ControlScope::StyledButtons] {
        let controls = match page.list_controls(scope).await {
            Ok(controls) => controls,
            Err(e) => {
                debug!("{}: control scan failed ({:?}): {}", label, scope, e);
                continue;
            }
        };

        for control in &controls {
            if !text_matches(&control.text, keywords, exact) {
                continue;
            }
            match page.pick_control(scope, control.index).await {
                Ok(Some(picked)) => {
                    info!(
                        "{}: found {} control via {:?} text scan: {:?}",
                        label,
                        kind.label(),
                        scope,
                        picked.text
                    );
                    return Some(picked);
                }
                Ok(None) => debug!("{}: scanned control vanished before pick", label),
                Err(e) => debug!("{}: picking scanned control failed: {}", label, e),
            }
        }
    }

    warn!("{}: no {} control found", label, kind.label());
    None
}

/// Probe one matcher until it reports a visible hit or the budget runs out.
async fn probe_until_visible(
    page: &dyn PageOps,
    matcher: &Matcher,
    timing: &Timing,
) -> Option<ControlInfo> {
    let deadline = Instant::now() + timing.selector_budget;
    loop {
        match page.probe(matcher).await {
            Ok(Some(control)) => return Some(control),
            Ok(None) => {}
            Err(e) => {
                debug!("probe {} failed: {}", matcher.describe(), e);
                return None;
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(timing.selector_poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;

    #[test]
    fn renew_keywords_match_on_substring() {
        let (keywords, exact) = keywords_for(ControlKind::Renew);
        assert!(!exact);
        assert!(text_matches("시간추가 (30분)", keywords, exact));
        assert!(text_matches("  Add 24 hours  ", keywords, exact));
        assert!(!text_matches("Delete", keywords, exact));
    }

    #[test]
    fn start_keywords_require_exact_text() {
        let (keywords, exact) = keywords_for(ControlKind::Start);
        assert!(exact);
        assert!(text_matches("Start", keywords, exact));
        assert!(text_matches("  시작  ", keywords, exact));
        assert!(!text_matches("Restart", keywords, exact));
        assert!(!text_matches("Start Server", keywords, exact));
    }

    #[tokio::test]
    async fn primary_matcher_wins_over_scan() {
        let page = FakePage::new()
            .with_button("Delete", false)
            .with_button("시간추가", false);

        let control = find_control(&page, ControlKind::Renew, "t", &Timing::instant())
            .await
            .unwrap();
        assert_eq!(control.text, "시간추가");
    }

    #[tokio::test]
    async fn keyword_scan_catches_drifted_button_text() {
        // No primary matcher hits "Add 24 hours", the substring scan does.
        let page = FakePage::new()
            .with_button("Delete", false)
            .with_button("Add 24 hours", false);

        let control = find_control(&page, ControlKind::Renew, "t", &Timing::instant())
            .await
            .unwrap();
        assert_eq!(control.text, "Add 24 hours");
    }

    #[tokio::test]
    async fn styled_scan_is_the_last_resort() {
        let page = FakePage::new()
            .with_button("Delete", false)
            .with_styled_control("시작", false);

        let control = find_control(&page, ControlKind::Start, "t", &Timing::instant())
            .await
            .unwrap();
        assert_eq!(control.text, "시작");
    }

    #[tokio::test]
    async fn absence_is_reported_as_none() {
        let page = FakePage::new().with_button("Delete", false);
        assert!(find_control(&page, ControlKind::Start, "t", &Timing::instant())
            .await
            .is_none());
    }
}
