//! Queryable-page abstraction
//!
//! The element resolver and the action flows talk to the page through the
//! [`PageOps`] trait instead of a concrete browser handle, so sub-flows can be
//! exercised against a scripted fake. The live implementation evaluates small
//! JavaScript probes over CDP; a probe or scan that hits stashes its element
//! on the page (`window.__wkSelected`) so the follow-up hover/click acts on
//! exactly the element that matched.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::errors::BrowserError;
use super::session::BrowserSession;

/// How a control is looked up on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// CSS selector.
    Css(String),
    /// XPath expression.
    XPath(String),
    /// Visible button whose trimmed text matches the needle.
    Text { needle: String, exact: bool },
}

impl Matcher {
    pub fn css(selector: &str) -> Self {
        Matcher::Css(selector.to_string())
    }

    pub fn xpath(expr: &str) -> Self {
        Matcher::XPath(expr.to_string())
    }

    /// Substring text match, like a `:has-text()` locator.
    pub fn text(needle: &str) -> Self {
        Matcher::Text {
            needle: needle.to_string(),
            exact: false,
        }
    }

    pub fn exact_text(needle: &str) -> Self {
        Matcher::Text {
            needle: needle.to_string(),
            exact: true,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Matcher::Css(s) => format!("css `{s}`"),
            Matcher::XPath(s) => format!("xpath `{s}`"),
            Matcher::Text { needle, exact: true } => format!("text = \"{needle}\""),
            Matcher::Text { needle, exact: false } => format!("text ~ \"{needle}\""),
        }
    }
}

/// Which controls a page scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlScope {
    /// Every rendered `button`.
    AllButtons,
    /// Controls carrying common primary-action style markers.
    StyledButtons,
}

impl ControlScope {
    fn selector(self) -> &'static str {
        match self {
            ControlScope::AllButtons => "button",
            ControlScope::StyledButtons => {
                "button.btn-primary, button.btn-success, button.btn-info, \
                 button.is-primary, .btn, .button"
            }
        }
    }
}

/// Snapshot of one interactive control.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlInfo {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Page operations needed by the resolver and the action flows.
#[async_trait]
pub trait PageOps: Send + Sync {
    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn reload(&self) -> Result<(), BrowserError>;

    /// Full page markup, used for text-pattern scans.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Whether a CSS selector currently matches a visible element.
    async fn selector_visible(&self, css: &str) -> Result<bool, BrowserError>;

    /// Try one matcher; a visible hit selects the control for hover/click.
    async fn probe(&self, matcher: &Matcher) -> Result<Option<ControlInfo>, BrowserError>;

    /// Enumerate visible controls in the given scope.
    async fn list_controls(&self, scope: ControlScope) -> Result<Vec<ControlInfo>, BrowserError>;

    /// Select the control at `index` of the last scan for hover/click.
    async fn pick_control(
        &self,
        scope: ControlScope,
        index: usize,
    ) -> Result<Option<ControlInfo>, BrowserError>;

    async fn hover_selected(&self) -> Result<(), BrowserError>;

    async fn click_selected(&self) -> Result<(), BrowserError>;
}

/// [`PageOps`] backed by the live Chrome session.
pub struct LivePage<'a> {
    session: &'a BrowserSession,
}

impl<'a> LivePage<'a> {
    pub fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    async fn probe_result(&self, script: &str) -> Result<Option<ControlInfo>, BrowserError> {
        let value = self.session.evaluate(script).await?;
        Ok(parse_probe(&value))
    }
}

/// Embed a Rust string as a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

/// Shared helpers prepended to every probe/scan script.
const JS_HELPERS: &str = r#"
    const vis = (el) => !!el && el.offsetParent !== null && el.offsetWidth > 0;
    const off = (el) => el.disabled === true || el.hasAttribute('disabled')
        || el.getAttribute('aria-disabled') === 'true';
    const snap = (el, i) => ({ found: true, index: i,
        text: (el.textContent || '').trim(), disabled: off(el) });
"#;

fn parse_probe(value: &Value) -> Option<ControlInfo> {
    if value.get("found").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn js_probe(matcher: &Matcher) -> String {
    match matcher {
        Matcher::Css(selector) => format!(
            r#"(function() {{
                {JS_HELPERS}
                const el = document.querySelector({sel});
                if (!vis(el)) return {{ found: false }};
                window.__wkSelected = el;
                return snap(el, 0);
            }})()"#,
            sel = js_str(selector),
        ),
        Matcher::XPath(expr) => format!(
            r#"(function() {{
                {JS_HELPERS}
                let el = null;
                try {{
                    el = document.evaluate({expr}, document, null,
                        XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
                }} catch (e) {{
                    return {{ found: false }};
                }}
                if (!vis(el)) return {{ found: false }};
                window.__wkSelected = el;
                return snap(el, 0);
            }})()"#,
            expr = js_str(expr),
        ),
        Matcher::Text { needle, exact } => format!(
            r#"(function() {{
                {JS_HELPERS}
                const needle = {needle};
                for (const el of document.querySelectorAll('button')) {{
                    if (!vis(el)) continue;
                    const t = (el.textContent || '').trim();
                    if ({exact} ? t === needle : t.includes(needle)) {{
                        window.__wkSelected = el;
                        return snap(el, 0);
                    }}
                }}
                return {{ found: false }};
            }})()"#,
            needle = js_str(needle),
        ),
    }
}

fn js_list(scope: ControlScope) -> String {
    format!(
        r#"(function() {{
            {JS_HELPERS}
            const els = Array.from(document.querySelectorAll({sel})).filter(vis);
            window.__wkScan = els;
            return els.map((el, i) => snap(el, i));
        }})()"#,
        sel = js_str(scope.selector()),
    )
}

fn js_pick(index: usize) -> String {
    format!(
        r#"(function() {{
            {JS_HELPERS}
            const els = window.__wkScan || [];
            const el = els[{index}];
            if (!el || !el.isConnected) return {{ found: false }};
            window.__wkSelected = el;
            return snap(el, {index});
        }})()"#,
    )
}

const JS_HOVER: &str = r#"(function() {
    const el = window.__wkSelected;
    if (!el || !el.isConnected) return false;
    const r = el.getBoundingClientRect();
    for (const type of ['mousemove', 'mouseover', 'mouseenter']) {
        el.dispatchEvent(new MouseEvent(type, {
            bubbles: true,
            clientX: r.left + r.width / 2,
            clientY: r.top + r.height / 2,
        }));
    }
    return true;
})()"#;

const JS_CLICK: &str = r#"(function() {
    const el = window.__wkSelected;
    if (!el || !el.isConnected) return false;
    el.click();
    return true;
})()"#;

#[async_trait]
impl PageOps for LivePage<'_> {
    async fn current_url(&self) -> Result<String, BrowserError> {
        self.session.current_url().await
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.session.goto(url).await
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.session.reload().await
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.session.content().await
    }

    async fn selector_visible(&self, css: &str) -> Result<bool, BrowserError> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({sel});
                return !!el && el.offsetParent !== null && el.offsetWidth > 0;
            }})()"#,
            sel = js_str(css),
        );
        let value = self.session.evaluate(&script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn probe(&self, matcher: &Matcher) -> Result<Option<ControlInfo>, BrowserError> {
        self.probe_result(&js_probe(matcher)).await
    }

    async fn list_controls(&self, scope: ControlScope) -> Result<Vec<ControlInfo>, BrowserError> {
        let value = self.session.evaluate(&js_list(scope)).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn pick_control(
        &self,
        _scope: ControlScope,
        index: usize,
    ) -> Result<Option<ControlInfo>, BrowserError> {
        self.probe_result(&js_pick(index)).await
    }

    async fn hover_selected(&self) -> Result<(), BrowserError> {
        let value = self.session.evaluate(JS_HOVER).await?;
        if value.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound("no control selected".into()))
        }
    }

    async fn click_selected(&self) -> Result<(), BrowserError> {
        let value = self.session.evaluate(JS_CLICK).await?;
        if value.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound("no control selected".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_script_embeds_needle_as_js_literal() {
        let script = js_probe(&Matcher::text(r#"Add "time""#));
        assert!(script.contains(r#""Add \"time\"""#));
    }

    #[test]
    fn parse_probe_requires_found_flag() {
        let hit = serde_json::json!({ "found": true, "index": 2, "text": "Start", "disabled": false });
        let parsed = parse_probe(&hit).unwrap();
        assert_eq!(parsed.index, 2);
        assert_eq!(parsed.text, "Start");
        assert!(!parsed.disabled);

        let miss = serde_json::json!({ "found": false });
        assert!(parse_probe(&miss).is_none());
        assert!(parse_probe(&serde_json::Value::Null).is_none());
    }

    #[test]
    fn matcher_describe_distinguishes_modes() {
        assert_eq!(Matcher::text("Renew").describe(), "text ~ \"Renew\"");
        assert_eq!(Matcher::exact_text("Start").describe(), "text = \"Start\"");
    }

    #[test]
    fn css_and_xpath_probes_use_their_own_lookup() {
        assert!(js_probe(&Matcher::css("button.renew")).contains("querySelector"));
        assert!(js_probe(&Matcher::xpath("//button")).contains("document.evaluate"));
    }
}
