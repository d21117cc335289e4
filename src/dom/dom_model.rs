use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dom::selector::{Combinator, PseudoClass, SelectorError, SelectorList, SelectorPart, SelectorStep, parse_selector};

// ============================================================================
// Snapshot format (what a driver extraction script emits)
// ============================================================================

/// One element of a serialized DOM tree.
///
/// A missing `rect` means the producer did not measure the element; it is
/// treated as laid out with `Rect::DEFAULT_BOX`. `hidden: true` zeroes the
/// rect of the element and all of its descendants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomNode {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, rename = "frameworkManaged")]
    pub framework_managed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        width: 0.0,
        height: 0.0,
    };

    pub const DEFAULT_BOX: Rect = Rect {
        width: 120.0,
        height: 24.0,
    };

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

// ============================================================================
// Arena document
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub value: String,
    pub checked: bool,
    pub rect: Rect,
    /// A reactive framework has replaced the instance-level `value` setter,
    /// so writes through it are dropped.
    pub framework_managed: bool,
    /// Driver-assigned handle used to address the live element.
    pub key: Option<String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            checked: false,
            rect: Rect::DEFAULT_BOX,
            framework_managed: false,
            key: None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Element(Element),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Element interface whose prototype owns a native `value` setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlInterface {
    Input,
    TextArea,
    Select,
}

impl ControlInterface {
    pub fn tag(&self) -> &'static str {
        match self {
            ControlInterface::Input => "input",
            ControlInterface::TextArea => "textarea",
            ControlInterface::Select => "select",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Input,
    Change,
    Blur,
}

/// A side effect on the document, recorded so a live driver can replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Mutation {
    SetValue {
        node: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        value: String,
        native: bool,
    },
    SetChecked {
        node: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        checked: bool,
    },
    Dispatch {
        node: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        event: EventKind,
        bubbles: bool,
    },
    Click {
        node: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    journal: Vec<Mutation>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Root,
            }],
            root: NodeId(0),
            journal: Vec::new(),
        }
    }

    pub fn from_snapshot(tree: &DomNode) -> Self {
        let mut doc = Document::new();
        let root = doc.root;
        doc.insert_snapshot(root, tree, false);
        doc
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let tree: DomNode = serde_json::from_value(value.clone())?;
        Ok(Document::from_snapshot(&tree))
    }

    fn insert_snapshot(&mut self, parent: NodeId, node: &DomNode, hidden_ancestor: bool) -> NodeId {
        let hidden = hidden_ancestor || node.hidden;
        let mut element = Element::new(&node.tag);
        element.attrs = node
            .attrs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        element.text = node.text.clone().unwrap_or_default();
        element.value = node
            .value
            .clone()
            .or_else(|| element.attrs.get("value").cloned())
            .unwrap_or_default();
        element.checked = node.checked || element.attrs.contains_key("checked");
        element.rect = if hidden {
            Rect::ZERO
        } else {
            node.rect.unwrap_or(Rect::DEFAULT_BOX)
        };
        element.framework_managed = node.framework_managed;
        element.key = node.key.clone();

        let id = self.append_element(parent, element);
        for child in &node.children {
            self.insert_snapshot(id, child, hidden);
        }

        if node.tag.eq_ignore_ascii_case("select") && node.value.is_none() {
            let initial = self.initial_select_value(id);
            if let Some(el) = self.element_mut(id) {
                el.value = initial;
            }
        }
        id
    }

    pub fn append_element(&mut self, parent: NodeId, element: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind: NodeKind::Element(element),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    // ------------------------------------------------------------------------
    // Tree access
    // ------------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The outermost element (usually `html`).
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[self.root.0].children.first().copied()
    }

    /// The `body` element, if the document has one.
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.children(html)
            .iter()
            .copied()
            .find(|c| self.tag(*c) == Some("body"))
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Root => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Root => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    /// Non-empty attribute value, the way the platform's reflected
    /// properties (`el.id`, `el.name`) are usually tested.
    pub fn attr_non_empty(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attr(id, name).filter(|v| !v.is_empty())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Parent that is an element (the synthetic root is not).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.element(*p).is_some())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(self.root, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            out.push(*child);
            self.collect_descendants(*child, out);
        }
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        self.query_selector_all_from(self.root, selector)
    }

    pub fn query_selector_from(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all_from(scope, selector)?.into_iter().next())
    }

    /// Descendants of `scope` (exclusive) matching `selector`, in document
    /// order. Ancestors of the scope may still satisfy the left-hand parts of
    /// the selector, as with the platform's element-scoped query.
    pub fn query_selector_all_from(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let list = parse_selector(selector)?;
        let mut candidates = Vec::new();
        self.collect_descendants(scope, &mut candidates);

        let mut seen = HashSet::new();
        Ok(candidates
            .into_iter()
            .filter(|c| self.matches(*c, &list) && seen.insert(*c))
            .collect())
    }

    pub fn matches(&self, id: NodeId, list: &SelectorList) -> bool {
        list.groups.iter().any(|chain| self.matches_chain(id, chain))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.all_elements()
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    /// All `form` elements in document order.
    pub fn forms(&self) -> Vec<NodeId> {
        self.all_elements()
            .into_iter()
            .filter(|n| self.tag(*n) == Some("form"))
            .collect()
    }

    /// Nearest inclusive ancestor with the given tag.
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if self.tag(node) == Some(tag) {
                return Some(node);
            }
            cursor = self.parent_element(node);
        }
        None
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(el) = self.element(id) {
            if !el.text.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&el.text);
            }
        }
        for child in self.children(id) {
            self.collect_text(*child, out);
        }
    }

    /// Rendered text approximation: text content with whitespace collapsed.
    pub fn inner_text(&self, id: NodeId) -> String {
        self.text_content(id)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn bounding_rect(&self, id: NodeId) -> Rect {
        self.element(id).map(|el| el.rect).unwrap_or(Rect::ZERO)
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.value.as_str())
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id).map(|el| el.checked).unwrap_or(false)
    }

    /// The control's `type` the way the platform reports it: lowercase, with
    /// `text` for untyped inputs and `select-one`/`select-multiple`/`textarea`
    /// for the other controls.
    pub fn control_type(&self, id: NodeId) -> Option<String> {
        let el = self.element(id)?;
        match el.tag.as_str() {
            "input" => Some(
                el.attr("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "text".to_string()),
            ),
            "select" if el.attrs.contains_key("multiple") => Some("select-multiple".into()),
            "select" => Some("select-one".into()),
            "textarea" => Some("textarea".into()),
            "button" => Some(
                el.attr("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .unwrap_or_else(|| "submit".to_string()),
            ),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Write through the platform setter of `interface`. Observed even on
    /// framework-managed controls. Returns false, writing nothing, when the
    /// element does not implement that interface.
    pub fn set_value_native(&mut self, id: NodeId, interface: ControlInterface, value: &str) -> bool {
        if self.tag(id) != Some(interface.tag()) {
            return false;
        }
        self.write_value(id, value, true);
        true
    }

    /// Write through the instance-level setter. Dropped on framework-managed
    /// controls.
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        self.write_value(id, value, false);
    }

    fn write_value(&mut self, id: NodeId, value: &str, native: bool) {
        let stored = if self.tag(id) == Some("select") {
            self.select_value_for(id, value)
        } else {
            value.to_string()
        };
        let Some(el) = self.element_mut(id) else {
            return;
        };
        if native || !el.framework_managed {
            el.value = stored;
        }
        let key = el.key.clone();
        self.journal.push(Mutation::SetValue {
            node: id,
            key,
            value: value.to_string(),
            native,
        });
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        el.checked = checked;
        let key = el.key.clone();
        self.journal.push(Mutation::SetChecked { node: id, key, checked });
    }

    pub fn dispatch_event(&mut self, id: NodeId, event: EventKind, bubbles: bool) {
        let Some(el) = self.element(id) else {
            return;
        };
        let key = el.key.clone();
        self.journal.push(Mutation::Dispatch {
            node: id,
            key,
            event,
            bubbles,
        });
    }

    pub fn click(&mut self, id: NodeId) {
        let Some(el) = self.element(id) else {
            return;
        };
        let key = el.key.clone();
        self.journal.push(Mutation::Click { node: id, key });
    }

    /// Set the rendered box of an element and its descendants (layout change).
    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        let mut targets = vec![id];
        self.collect_descendants(id, &mut targets);
        for target in targets {
            if let Some(el) = self.element_mut(target) {
                el.rect = rect;
            }
        }
    }

    pub fn journal(&self) -> &[Mutation] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }

    // ------------------------------------------------------------------------
    // Select helpers
    // ------------------------------------------------------------------------

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        let mut all = Vec::new();
        self.collect_descendants(select, &mut all);
        all.into_iter()
            .filter(|n| self.tag(*n) == Some("option"))
            .collect()
    }

    fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.inner_text(option))
    }

    fn initial_select_value(&self, select: NodeId) -> String {
        let options = self.options(select);
        options
            .iter()
            .find(|o| self.attr(**o, "selected").is_some())
            .or(options.first())
            .map(|o| self.option_value(*o))
            .unwrap_or_default()
    }

    /// A select only takes values one of its options carries.
    fn select_value_for(&self, select: NodeId, requested: &str) -> String {
        let options = self.options(select);
        if options.is_empty() || options.iter().any(|o| self.option_value(*o) == requested) {
            requested.to_string()
        } else {
            String::new()
        }
    }

    // ------------------------------------------------------------------------
    // Selector matching
    // ------------------------------------------------------------------------

    fn matches_chain(&self, id: NodeId, parts: &[SelectorPart]) -> bool {
        let Some(last) = parts.last() else {
            return false;
        };
        if !self.matches_step(id, &last.step) {
            return false;
        }
        self.matches_left(id, parts, parts.len() - 1)
    }

    /// `id` matched `parts[idx]`; check everything to its left.
    fn matches_left(&self, id: NodeId, parts: &[SelectorPart], idx: usize) -> bool {
        if idx == 0 {
            return true;
        }
        let prev = &parts[idx - 1].step;
        match parts[idx].combinator.unwrap_or(Combinator::Descendant) {
            Combinator::Child => match self.parent_element(id) {
                Some(parent) => {
                    self.matches_step(parent, prev) && self.matches_left(parent, parts, idx - 1)
                }
                None => false,
            },
            Combinator::Descendant => {
                let mut cursor = self.parent_element(id);
                while let Some(ancestor) = cursor {
                    if self.matches_step(ancestor, prev) && self.matches_left(ancestor, parts, idx - 1) {
                        return true;
                    }
                    cursor = self.parent_element(ancestor);
                }
                false
            }
        }
    }

    fn matches_step(&self, id: NodeId, step: &SelectorStep) -> bool {
        let Some(el) = self.element(id) else {
            return false;
        };

        if let Some(tag) = &step.tag {
            if &el.tag != tag {
                return false;
            }
        }
        if let Some(want) = &step.id {
            if el.attr("id") != Some(want.as_str()) {
                return false;
            }
        }
        if !step.classes.is_empty() {
            let classes: Vec<&str> = el.attr("class").unwrap_or("").split_whitespace().collect();
            if !step.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        if !step.attrs.iter().all(|cond| cond.matches(el.attr(cond.key()))) {
            return false;
        }
        step.pseudo.iter().all(|p| self.matches_pseudo(id, p))
    }

    fn matches_pseudo(&self, id: NodeId, pseudo: &PseudoClass) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let siblings = self.children(parent);
        match pseudo {
            PseudoClass::FirstChild => siblings.first() == Some(&id),
            PseudoClass::NthChild(n) => siblings.iter().position(|s| *s == id) == Some(n - 1),
            PseudoClass::NthOfType(n) => {
                let tag = self.tag(id);
                siblings
                    .iter()
                    .filter(|s| self.tag(**s) == tag)
                    .position(|s| *s == id)
                    == Some(n - 1)
            }
        }
    }
}
