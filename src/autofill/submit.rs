use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::autofill::frames::{FrameId, Tab};
use crate::autofill::readiness::is_visible;
use crate::dom::dom_model::{Document, NodeId};

/// Everything a user could click to send a form.
pub const CLICKABLE_SELECTOR: &str =
    "button, input[type=\"submit\"], input[type=\"button\"], [role=\"button\"]";

/// Search tiers, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SubmitTier {
    /// Clickable whose text says "log in"
    LoginText,
    /// `input[type=submit]`
    SubmitInput,
    /// `button[type=submit]`
    SubmitButton,
    /// Clickable whose text is a submit-like verb
    SubmitVocabulary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitMatch {
    pub frame: FrameId,
    pub node: NodeId,
    pub tier: SubmitTier,
}

/// Scan `frames` in order and return the first visible submit control.
/// All tiers are exhausted in one document before moving to the next.
pub fn find_submit_button(tab: &Tab, frames: &[FrameId]) -> Option<SubmitMatch> {
    frames.iter().find_map(|frame| {
        let doc = tab.document(*frame)?;
        locate_submit_in(doc).map(|(node, tier)| SubmitMatch {
            frame: *frame,
            node,
            tier,
        })
    })
}

pub fn locate_submit_in(doc: &Document) -> Option<(NodeId, SubmitTier)> {
    let clickables = doc.query_selector_all(CLICKABLE_SELECTOR).unwrap_or_default();

    if let Some(node) = clickables
        .iter()
        .copied()
        .find(|n| mentions_login(&control_text(doc, *n)) && is_visible(doc, *n))
    {
        return Some((node, SubmitTier::LoginText));
    }

    let submit_inputs = doc.query_selector_all("input[type=\"submit\"]").unwrap_or_default();
    if let Some(node) = submit_inputs.into_iter().find(|n| {
        is_visible(doc, *n) && !mentions_get_started(doc.value(*n).unwrap_or_default())
    }) {
        return Some((node, SubmitTier::SubmitInput));
    }

    let submit_buttons = doc.query_selector_all("button[type=\"submit\"]").unwrap_or_default();
    if let Some(node) = submit_buttons
        .into_iter()
        .find(|n| is_visible(doc, *n) && !mentions_get_started(&doc.inner_text(*n)))
    {
        return Some((node, SubmitTier::SubmitButton));
    }

    clickables
        .into_iter()
        .find(|n| {
            let text = control_text(doc, *n);
            !mentions_get_started(&text) && mentions_submit_intent(&text) && is_visible(doc, *n)
        })
        .map(|node| (node, SubmitTier::SubmitVocabulary))
}

/// Rendered text, or the control's value for inputs.
pub fn control_text(doc: &Document, node: NodeId) -> String {
    let text = doc.inner_text(node);
    if !text.is_empty() {
        return text;
    }
    doc.value(node).unwrap_or_default().trim().to_string()
}

// ============================================================================
// Text patterns
// ============================================================================

static LOGIN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)log\s*in").ok());

static GET_STARTED: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)get\s*started").ok());

static SUBMIT_WORDS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(submit|sign.?in|sign.?up|register|continue|next|confirm|send|search|proceed)\b").ok()
});

fn is_match(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

pub fn mentions_login(text: &str) -> bool {
    is_match(&LOGIN, text)
}

pub fn mentions_get_started(text: &str) -> bool {
    is_match(&GET_STARTED, text)
}

/// Any submit-like verb as a whole word.
pub fn mentions_submit_intent(text: &str) -> bool {
    is_match(&SUBMIT_WORDS, text)
}
