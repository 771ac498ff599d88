//! Outcome taxonomy
//!
//! Closed enumerations for the renewal and start results, their stable string
//! tags, the display mapping used by the report, and the ordered per-target
//! ledger. The ledger is pre-seeded so every configured target carries exactly
//! one outcome pair even when a run aborts early.

use crate::config::Target;

/// Result of one renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewOutcome {
    Success,
    AlreadyRenewed,
    ButtonMissing,
    ButtonDisabled,
    /// Page changed after the click but matched no known pattern.
    UnknownChanged,
    NoChange,
    ClickError,
    Error,
    LoginFailed,
    NotExecuted,
}

impl RenewOutcome {
    pub fn tag(self) -> &'static str {
        match self {
            RenewOutcome::Success => "renew_success",
            RenewOutcome::AlreadyRenewed => "already_renewed",
            RenewOutcome::ButtonMissing => "no_renew_button",
            RenewOutcome::ButtonDisabled => "renew_button_disabled",
            RenewOutcome::UnknownChanged => "renew_unknown_changed",
            RenewOutcome::NoChange => "renew_no_change",
            RenewOutcome::ClickError => "renew_click_error",
            RenewOutcome::Error => "renew_error",
            RenewOutcome::LoginFailed => "login_failed",
            RenewOutcome::NotExecuted => "not_executed",
        }
    }

    /// Counted as a successful renewal in the report summary.
    pub fn is_success(self) -> bool {
        matches!(self, RenewOutcome::Success | RenewOutcome::AlreadyRenewed)
    }
}

/// Result of one start attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Success,
    AlreadyStarted,
    ButtonMissing,
    /// Click issued but the resulting state matched no known pattern.
    Unknown,
    Error,
    LoginFailed,
    NotExecuted,
}

impl StartOutcome {
    pub fn tag(self) -> &'static str {
        match self {
            StartOutcome::Success => "start_success",
            StartOutcome::AlreadyStarted => "already_started",
            StartOutcome::ButtonMissing => "no_start_button",
            StartOutcome::Unknown => "start_unknown",
            StartOutcome::Error => "start_error",
            StartOutcome::LoginFailed => "login_failed",
            StartOutcome::NotExecuted => "not_executed",
        }
    }

    /// Counted as a successful start in the report summary.
    pub fn is_success(self) -> bool {
        matches!(self, StartOutcome::Success | StartOutcome::AlreadyStarted)
    }
}

/// The outcome pair recorded for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetOutcome {
    pub renew: RenewOutcome,
    pub start: StartOutcome,
}

impl TargetOutcome {
    pub fn not_executed() -> Self {
        Self {
            renew: RenewOutcome::NotExecuted,
            start: StartOutcome::NotExecuted,
        }
    }

    pub fn login_failed() -> Self {
        Self {
            renew: RenewOutcome::LoginFailed,
            start: StartOutcome::LoginFailed,
        }
    }

    pub fn run_error() -> Self {
        Self {
            renew: RenewOutcome::Error,
            start: StartOutcome::Error,
        }
    }

    /// Combined `renew:...,start:...` result string.
    pub fn combined(&self) -> String {
        format!("renew:{},start:{}", self.renew.tag(), self.start.tag())
    }

    /// Whether this pair carries a login-failure or error marker.
    pub fn is_failure(&self) -> bool {
        let combined = self.combined();
        combined.contains("login_failed") || combined.contains("error")
    }
}

/// Map an outcome tag to its report display string. Unrecognized tags fall
/// through to a generic unknown-status wrapper carrying the raw tag.
pub fn display_tag(tag: &str) -> String {
    let fixed = match tag {
        "renew_success" => "✅ Renewed",
        "already_renewed" => "🔄 Already renewed",
        "no_renew_button" => "❌ Renew button not found",
        "renew_button_disabled" => "❌ Renew button disabled (possibly challenge-blocked)",
        "renew_unknown_changed" => "⚠️ Page changed, result unclear",
        "renew_no_change" => "⚠️ No page change",
        "renew_click_error" => "💥 Renew click failed",
        "renew_error" => "💥 Renewal errored",
        "start_success" => "✅ Started",
        "already_started" => "🔄 Already running",
        "no_start_button" => "❌ Start button not found",
        "start_unknown" => "⚠️ Start issued, state unknown",
        "start_error" => "💥 Startup errored",
        "login_failed" => "❌ Login failed",
        "not_executed" => "⏸️ Not executed",
        other => return format!("❓ Unknown status ({other})"),
    };
    fixed.to_string()
}

/// Ordered per-target outcome ledger.
#[derive(Debug, Clone, Default)]
pub struct OutcomeBook {
    entries: Vec<(String, TargetOutcome)>,
}

impl OutcomeBook {
    /// Seed one `not_executed` pair per configured target, in order.
    pub fn seeded(targets: &[Target]) -> Self {
        Self {
            entries: targets
                .iter()
                .map(|t| (t.id.clone(), TargetOutcome::not_executed()))
                .collect(),
        }
    }

    /// Record the outcome pair for a target.
    pub fn record(&mut self, id: &str, outcome: TargetOutcome) {
        match self.entries.iter_mut().find(|(key, _)| key == id) {
            Some(entry) => entry.1 = outcome,
            None => self.entries.push((id.to_string(), outcome)),
        }
    }

    /// Mark every target as login-failed.
    pub fn mark_all_login_failed(&mut self) {
        for entry in &mut self.entries {
            entry.1 = TargetOutcome::login_failed();
        }
    }

    /// Mark every still-unprocessed target with the uniform error pair.
    pub fn mark_unprocessed_error(&mut self) {
        for entry in &mut self.entries {
            if entry.1 == TargetOutcome::not_executed() {
                entry.1 = TargetOutcome::run_error();
            }
        }
    }

    pub fn entries(&self) -> &[(String, TargetOutcome)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn renew_success_count(&self) -> usize {
        self.entries.iter().filter(|(_, o)| o.renew.is_success()).count()
    }

    pub fn start_success_count(&self) -> usize {
        self.entries.iter().filter(|(_, o)| o.start.is_success()).count()
    }

    /// Whether any recorded pair carries a failure marker.
    pub fn any_failure(&self) -> bool {
        self.entries.iter().any(|(_, o)| o.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_target_list;

    #[test]
    fn seeded_book_covers_every_target_exactly_once() {
        let targets = parse_target_list("https://h/server/a,https://h/server/b,https://h/server/c");
        let book = OutcomeBook::seeded(&targets);

        let ids: Vec<&str> = book.entries().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(book
            .entries()
            .iter()
            .all(|(_, o)| *o == TargetOutcome::not_executed()));
    }

    #[test]
    fn record_replaces_the_seeded_pair() {
        let targets = parse_target_list("https://h/server/a,https://h/server/b");
        let mut book = OutcomeBook::seeded(&targets);
        book.record(
            "a",
            TargetOutcome {
                renew: RenewOutcome::Success,
                start: StartOutcome::Unknown,
            },
        );

        assert_eq!(book.len(), 2);
        assert_eq!(book.entries()[0].1.renew, RenewOutcome::Success);
        assert_eq!(book.entries()[1].1, TargetOutcome::not_executed());
    }

    #[test]
    fn mark_unprocessed_error_leaves_processed_targets_alone() {
        let targets = parse_target_list("https://h/server/a,https://h/server/b");
        let mut book = OutcomeBook::seeded(&targets);
        book.record(
            "a",
            TargetOutcome {
                renew: RenewOutcome::Success,
                start: StartOutcome::Success,
            },
        );
        book.mark_unprocessed_error();

        assert_eq!(book.entries()[0].1.renew, RenewOutcome::Success);
        assert_eq!(book.entries()[1].1, TargetOutcome::run_error());
    }

    #[test]
    fn failure_markers_cover_login_and_error_tags() {
        assert!(TargetOutcome::login_failed().is_failure());
        assert!(TargetOutcome::run_error().is_failure());
        assert!(TargetOutcome {
            renew: RenewOutcome::ClickError,
            start: StartOutcome::Success,
        }
        .is_failure());
        assert!(!TargetOutcome {
            renew: RenewOutcome::Success,
            start: StartOutcome::Unknown,
        }
        .is_failure());
        assert!(!TargetOutcome::not_executed().is_failure());
    }

    #[test]
    fn success_counts_include_already_done() {
        let targets = parse_target_list("https://h/server/a,https://h/server/b");
        let mut book = OutcomeBook::seeded(&targets);
        book.record(
            "a",
            TargetOutcome {
                renew: RenewOutcome::AlreadyRenewed,
                start: StartOutcome::Success,
            },
        );
        book.record(
            "b",
            TargetOutcome {
                renew: RenewOutcome::NoChange,
                start: StartOutcome::AlreadyStarted,
            },
        );

        assert_eq!(book.renew_success_count(), 1);
        assert_eq!(book.start_success_count(), 2);
    }

    #[test]
    fn display_mapping_wraps_unknown_tags() {
        assert_eq!(display_tag("renew_success"), "✅ Renewed");
        assert_eq!(display_tag("bogus_tag"), "❓ Unknown status (bogus_tag)");
    }
}
