//! Scripted in-memory page for exercising sub-flows without a browser.

use std::sync::Mutex;

use async_trait::async_trait;

use super::errors::BrowserError;
use super::page::{ControlInfo, ControlScope, Matcher, PageOps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FakeControlKind {
    /// A plain `button`: reachable by text probes and the all-buttons scan.
    Button,
    /// A styled non-button control: only the styled scan sees it.
    StyledOnly,
}

#[derive(Debug, Clone)]
struct FakeControl {
    text: String,
    disabled: bool,
    kind: FakeControlKind,
}

#[derive(Default)]
struct FakeState {
    url: String,
    redirect_to: Option<String>,
    content: String,
    content_after_click: Option<String>,
    controls: Vec<FakeControl>,
    visible_selectors: Vec<String>,
    selected: Option<usize>,
    clicks: usize,
    reloads: usize,
    navigations: Vec<String>,
    disable_selected_on_click: bool,
}

/// A page whose state is scripted up front and mutated by clicks.
#[derive(Default)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every navigation lands on this URL instead of the requested one.
    pub fn with_redirect(self, url: &str) -> Self {
        self.state.lock().unwrap().redirect_to = Some(url.to_string());
        self
    }

    pub fn with_content(self, content: &str) -> Self {
        self.state.lock().unwrap().content = content.to_string();
        self
    }

    /// Content the page switches to after the first click.
    pub fn with_content_after_click(self, content: &str) -> Self {
        self.state.lock().unwrap().content_after_click = Some(content.to_string());
        self
    }

    pub fn with_button(self, text: &str, disabled: bool) -> Self {
        self.state.lock().unwrap().controls.push(FakeControl {
            text: text.to_string(),
            disabled,
            kind: FakeControlKind::Button,
        });
        self
    }

    pub fn with_styled_control(self, text: &str, disabled: bool) -> Self {
        self.state.lock().unwrap().controls.push(FakeControl {
            text: text.to_string(),
            disabled,
            kind: FakeControlKind::StyledOnly,
        });
        self
    }

    pub fn with_visible_selector(self, css: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .visible_selectors
            .push(css.to_string());
        self
    }

    /// Clicking the selected control flips it to disabled.
    pub fn disable_selected_on_click(self) -> Self {
        self.state.lock().unwrap().disable_selected_on_click = true;
        self
    }

    pub fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicks
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().unwrap().reloads
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    fn scoped_indices(state: &FakeState, scope: ControlScope) -> Vec<usize> {
        let kind = match scope {
            ControlScope::AllButtons => FakeControlKind::Button,
            ControlScope::StyledButtons => FakeControlKind::StyledOnly,
        };
        state
            .controls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    fn info(state: &FakeState, global: usize, index: usize) -> ControlInfo {
        let control = &state.controls[global];
        ControlInfo {
            index,
            text: control.text.clone(),
            disabled: control.disabled,
        }
    }
}

#[async_trait]
impl PageOps for FakePage {
    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        state.url = state.redirect_to.clone().unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.state.lock().unwrap().reloads += 1;
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().content.clone())
    }

    async fn selector_visible(&self, css: &str) -> Result<bool, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(state.visible_selectors.iter().any(|s| s == css))
    }

    async fn probe(&self, matcher: &Matcher) -> Result<Option<ControlInfo>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        let (needle, exact) = match matcher {
            Matcher::Text { needle, exact } => (needle.clone(), *exact),
            // Fake pages only model text lookup; structural selectors miss.
            Matcher::Css(_) | Matcher::XPath(_) => return Ok(None),
        };

        let hit = state
            .controls
            .iter()
            .enumerate()
            .find(|(_, c)| {
                c.kind == FakeControlKind::Button
                    && if exact {
                        c.text.trim() == needle
                    } else {
                        c.text.contains(&needle)
                    }
            })
            .map(|(global, _)| global);

        match hit {
            Some(global) => {
                state.selected = Some(global);
                Ok(Some(Self::info(&state, global, 0)))
            }
            None => Ok(None),
        }
    }

    async fn list_controls(&self, scope: ControlScope) -> Result<Vec<ControlInfo>, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(Self::scoped_indices(&state, scope)
            .into_iter()
            .enumerate()
            .map(|(index, global)| Self::info(&state, global, index))
            .collect())
    }

    async fn pick_control(
        &self,
        scope: ControlScope,
        index: usize,
    ) -> Result<Option<ControlInfo>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        match Self::scoped_indices(&state, scope).get(index).copied() {
            Some(global) => {
                state.selected = Some(global);
                Ok(Some(Self::info(&state, global, index)))
            }
            None => Ok(None),
        }
    }

    async fn hover_selected(&self) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        if state.selected.is_some() {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound("no control selected".into()))
        }
    }

    async fn click_selected(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        let Some(global) = state.selected else {
            return Err(BrowserError::ElementNotFound("no control selected".into()));
        };

        state.clicks += 1;
        if state.disable_selected_on_click {
            state.controls[global].disabled = true;
        }
        if let Some(after) = state.content_after_click.take() {
            state.content = after;
        }
        Ok(())
    }
}
