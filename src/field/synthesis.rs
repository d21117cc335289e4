use serde::{Deserialize, Serialize};

use crate::autofill::submit::locate_submit_in;
use crate::dom::dom_model::{Document, NodeId};
use crate::dom::selector::css_escape;
use crate::field::field_model::{FieldDescriptor, FieldValue};

/// Input types that are actions or carry nothing worth saving.
pub const SKIP_TYPES: [&str; 6] = ["submit", "button", "reset", "image", "file", "hidden"];

// ============================================================================
// Capture (one pass over the live document)
// ============================================================================

/// Result of scanning a page for savable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub fields: Vec<FieldDescriptor>,
    pub submit_selector: Option<String>,
}

/// Scan `doc` for rendered form controls and describe each one, plus the
/// selector of the control that would submit the form.
pub fn capture_fields(doc: &Document) -> CaptureResult {
    let controls = doc
        .query_selector_all("input, select, textarea")
        .unwrap_or_default();

    let mut fields = Vec::new();
    for node in controls {
        let field_type = doc.control_type(node).unwrap_or_default();
        if SKIP_TYPES.contains(&field_type.as_str()) {
            continue;
        }
        if !doc.bounding_rect(node).has_area() {
            continue;
        }
        fields.push(describe_field(doc, node));
    }

    let submit_selector = locate_submit_in(doc).map(|(node, _tier)| synthesize_selector(doc, node));

    CaptureResult {
        fields,
        submit_selector,
    }
}

/// Build the full descriptor for one live control.
pub fn describe_field(doc: &Document, node: NodeId) -> FieldDescriptor {
    let field_type = doc.control_type(node).unwrap_or_else(|| "text".to_string());
    let value = if matches!(field_type.as_str(), "checkbox" | "radio") {
        FieldValue::Bool(doc.checked(node))
    } else {
        FieldValue::Text(doc.value(node).unwrap_or_default().to_string())
    };

    FieldDescriptor {
        selector: synthesize_selector(doc, node),
        name: doc.attr_non_empty(node, "name").map(str::to_string),
        id: doc.attr_non_empty(node, "id").map(str::to_string),
        label: field_label(doc, node),
        field_type,
        value,
        form_index: form_index(doc, node),
    }
}

// ============================================================================
// Selector synthesis
// ============================================================================

/// Pick the most durable locator for `node`: a stable id, then a name scoped
/// to its form, then a global name, then the structural path.
///
/// Name-based candidates are only accepted when they select `node` itself.
pub fn synthesize_selector(doc: &Document, node: NodeId) -> String {
    if let Some(id) = doc.attr_non_empty(node, "id") {
        if !looks_generated(id) {
            return format!("#{}", css_escape(id));
        }
    }

    if let Some(name) = doc.attr_non_empty(node, "name") {
        if let Ok(position) = usize::try_from(form_index(doc, node)) {
            let scoped = format!("form:nth-of-type({}) {}", position + 1, name_selector(name));
            if selects_exactly(doc, &scoped, node) {
                return scoped;
            }
        }

        let global = name_selector(name);
        if selects_exactly(doc, &global, node) {
            return global;
        }
    }

    structural_path(doc, node)
}

pub fn name_selector(name: &str) -> String {
    format!("[name=\"{}\"]", css_escape(name))
}

fn selects_exactly(doc: &Document, selector: &str, node: NodeId) -> bool {
    matches!(doc.query_selector(selector), Ok(Some(found)) if found == node)
}

/// `tag:nth-child(i)` steps from `body` down to `node`, joined with child
/// combinators. Anchored at `body` (or `html`) so no earlier subtree with the
/// same shape can match.
pub fn structural_path(doc: &Document, node: NodeId) -> String {
    let body = doc.body();
    let html = doc.document_element();
    let mut parts = Vec::new();
    let mut current = node;

    while Some(current) != body && Some(current) != html {
        let Some(parent) = doc.parent_element(current) else {
            break;
        };
        let index = doc
            .children(parent)
            .iter()
            .position(|c| *c == current)
            .map(|i| i + 1)
            .unwrap_or(1);
        let tag = doc.tag(current).unwrap_or("*");
        parts.push(format!("{}:nth-child({})", tag, index));
        current = parent;
    }

    if Some(current) == body {
        parts.push("body".to_string());
    } else if Some(current) == html {
        parts.push("html".to_string());
    }

    parts.reverse();
    parts.join(" > ")
}

/// Ordinal of the enclosing form among all forms in the document, -1 when
/// the control is not inside a form.
pub fn form_index(doc: &Document, node: NodeId) -> i32 {
    let Some(form) = doc.closest(node, "form") else {
        return -1;
    };
    doc.forms()
        .iter()
        .position(|f| *f == form)
        .and_then(|i| i32::try_from(i).ok())
        .unwrap_or(-1)
}

/// Ids produced by frameworks and build tools: all digits, or containing a
/// run of eight or more hex characters.
pub fn looks_generated(id: &str) -> bool {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    let mut run = 0;
    for c in id.chars() {
        if c.is_ascii_hexdigit() {
            run += 1;
            if run >= 8 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

// ============================================================================
// Labels
// ============================================================================

/// Best human-readable name for a control. Never empty.
pub fn field_label(doc: &Document, node: NodeId) -> String {
    if let Some(id) = doc.attr_non_empty(node, "id") {
        let selector = format!("label[for=\"{}\"]", css_escape(id));
        if let Ok(Some(label)) = doc.query_selector(&selector) {
            let text = clean_label_text(&doc.text_content(label));
            if !text.is_empty() {
                return text;
            }
        }
    }

    if let Some(label) = doc.closest(node, "label") {
        let text = clean_label_text(&doc.text_content(label));
        if !text.is_empty() {
            return text;
        }
    }

    let from_attrs = ["aria-label", "placeholder"]
        .iter()
        .filter_map(|attr| doc.attr(node, attr))
        .map(str::trim)
        .find(|v| !v.is_empty());
    if let Some(text) = from_attrs {
        return text.to_string();
    }

    if let Some(name) = doc.attr_non_empty(node, "name") {
        let text = humanize(name);
        if !text.is_empty() {
            return text;
        }
    }

    if let Some(kind) = doc.control_type(node) {
        let text = humanize(&kind);
        if !text.is_empty() {
            return text;
        }
    }

    "Unknown field".to_string()
}

/// Trim, drop one trailing `:` or `*`, trim again.
fn clean_label_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_suffix(':')
        .or_else(|| trimmed.strip_suffix('*'))
        .unwrap_or(trimmed);
    stripped.trim().to_string()
}

/// `firstName` / `first_name` / `first-name` -> `First Name`.
pub fn humanize(raw: &str) -> String {
    let mut spaced = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;
    for c in raw.chars() {
        if c.is_ascii_uppercase() && prev.is_some_and(|p| p.is_ascii_lowercase()) {
            spaced.push(' ');
        }
        if c == '_' || c == '-' {
            if !matches!(prev, Some('_' | '-')) {
                spaced.push(' ');
            }
        } else {
            spaced.push(c);
        }
        prev = Some(c);
    }

    let mut out = String::with_capacity(spaced.len());
    let mut in_word = false;
    for c in spaced.chars() {
        let is_word = c.is_alphanumeric();
        if is_word && !in_word {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        in_word = is_word;
    }
    out.trim().to_string()
}
