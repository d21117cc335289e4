use form_recall::dom::dom_model::{
    ControlInterface, Document, Element, EventKind, Mutation, Rect,
};
use form_recall::dom::selector::{css_escape, parse_selector};
use serde_json::json;

use crate::common::fixtures::{doc, el, first, hidden, html, input, login_page, node_by_id, text_el};

mod common;

// ============================================================================
// Selector parsing
// ============================================================================

#[test]
fn parses_supported_selector_shapes() {
    for selector in [
        "#email",
        "input",
        "*",
        "[name=\"user\"]",
        "form:nth-of-type(1) [name=\"user\"]",
        "form:nth-child(2) > div:nth-child(1) > input:nth-child(3)",
        "button, input[type=\"submit\"], input[type=\"button\"], [role=\"button\"]",
        "a.primary.large[data-kind~='cta']",
        "[href^=\"https\"][href$='.pdf'][title*=report]",
        "li:first-child",
        "#\\31 st\\.field\\:name",
    ] {
        assert!(parse_selector(selector).is_ok(), "should parse: {}", selector);
    }
}

#[test]
fn rejects_malformed_selectors() {
    for selector in [
        "",
        "   ",
        "div >",
        "div,,a",
        "[name=",
        "[name=\"open",
        "input:nth-child(0)",
        "input:nth-child(x)",
        "a:hover",
        "#",
        "div$",
    ] {
        assert!(parse_selector(selector).is_err(), "should reject: {:?}", selector);
    }
}

#[test]
fn invalid_selector_surfaces_as_error_not_panic() {
    let page = login_page();
    let err = page.query_selector("input[").unwrap_err();
    assert!(err.to_string().contains("input["));
}

#[test]
fn css_escape_follows_platform_rules() {
    assert_eq!(css_escape("email"), "email");
    assert_eq!(css_escape("1st.field:name"), "\\31 st\\.field\\:name");
    assert_eq!(css_escape("-"), "\\-");
    assert_eq!(css_escape("-2x"), "-\\32 x");
    assert_eq!(css_escape("a b"), "a\\ b");
    assert_eq!(css_escape("naïve"), "naïve");
}

#[test]
fn escaped_id_selects_its_element() {
    let page = doc(html(vec![input(json!({ "id": "1st.field:name" }))]));
    let selector = format!("#{}", css_escape("1st.field:name"));
    let node = page.query_selector(&selector).unwrap();
    assert_eq!(node, page.get_element_by_id("1st.field:name"));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn query_returns_document_order_without_duplicates() {
    let page = login_page();
    let all = page.query_selector_all("input, [name]").unwrap();
    let names: Vec<&str> = all
        .iter()
        .map(|n| page.attr(*n, "name").unwrap_or(""))
        .collect();
    assert_eq!(names, vec!["email", "password", "remember"]);
}

#[test]
fn child_and_descendant_combinators() {
    let page = login_page();
    assert_eq!(page.query_selector_all("form input").unwrap().len(), 3);
    // The checkbox sits inside a label, so only two inputs are direct children.
    assert_eq!(page.query_selector_all("form > input").unwrap().len(), 2);
    assert!(page.query_selector("body > input").unwrap().is_none());
}

#[test]
fn nth_child_and_nth_of_type_count_siblings() {
    let page = doc(html(vec![
        text_el("p", json!({}), "intro"),
        input(json!({ "name": "a" })),
        input(json!({ "name": "b" })),
    ]));
    let b = first(&page, "[name=\"b\"]");
    assert_eq!(page.query_selector("input:nth-child(3)").unwrap(), Some(b));
    assert_eq!(page.query_selector("input:nth-of-type(2)").unwrap(), Some(b));
    assert!(page.query_selector("input:nth-child(1)").unwrap().is_none());
}

#[test]
fn scoped_query_only_returns_descendants_of_scope() {
    let page = doc(html(vec![
        el("form", json!({}), vec![input(json!({ "name": "q" }))]),
        el("form", json!({}), vec![input(json!({ "name": "q", "id": "second" }))]),
    ]));
    let forms = page.forms();
    assert_eq!(forms.len(), 2);
    let found = page.query_selector_from(forms[1], "[name=\"q\"]").unwrap();
    assert_eq!(found, Some(node_by_id(&page, "second")));
}

#[test]
fn closest_and_text_helpers() {
    let page = login_page();
    let remember = first(&page, "[name=\"remember\"]");
    let label = page.closest(remember, "label").unwrap();
    assert_eq!(page.inner_text(label), "Remember me");
    assert_eq!(page.closest(remember, "form"), page.forms().first().copied());
    assert_eq!(page.closest(remember, "table"), None);
}

#[test]
fn control_type_matches_platform_reporting() {
    let page = doc(html(vec![
        input(json!({ "id": "plain" })),
        input(json!({ "id": "mail", "type": "EMAIL" })),
        el("select", json!({ "id": "one" }), vec![]),
        el("select", json!({ "id": "many", "multiple": "" }), vec![]),
        el("textarea", json!({ "id": "notes" }), vec![]),
        el("button", json!({ "id": "go" }), vec![]),
        el("div", json!({ "id": "box" }), vec![]),
    ]));
    let kind = |id: &str| page.control_type(node_by_id(&page, id));
    assert_eq!(kind("plain").as_deref(), Some("text"));
    assert_eq!(kind("mail").as_deref(), Some("email"));
    assert_eq!(kind("one").as_deref(), Some("select-one"));
    assert_eq!(kind("many").as_deref(), Some("select-multiple"));
    assert_eq!(kind("notes").as_deref(), Some("textarea"));
    assert_eq!(kind("go").as_deref(), Some("submit"));
    assert_eq!(kind("box"), None);
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn hidden_subtree_has_no_area() {
    let page = doc(html(vec![hidden(el(
        "div",
        json!({}),
        vec![input(json!({ "id": "inner" }))],
    ))]));
    assert!(!page.bounding_rect(node_by_id(&page, "inner")).has_area());
}

#[test]
fn unmeasured_elements_get_default_box() {
    let page = login_page();
    assert_eq!(page.bounding_rect(node_by_id(&page, "email")), Rect::DEFAULT_BOX);
}

#[test]
fn set_rect_reveals_descendants() {
    let mut page = doc(html(vec![hidden(el(
        "div",
        json!({ "id": "step2" }),
        vec![input(json!({ "id": "inner" }))],
    ))]));
    let step = node_by_id(&page, "step2");
    page.set_rect(step, Rect { width: 300.0, height: 200.0 });
    assert!(page.bounding_rect(node_by_id(&page, "inner")).has_area());
}

// ============================================================================
// Mutations
// ============================================================================

#[test]
fn instance_setter_is_ignored_by_framework_managed_controls() {
    let mut page = doc(html(vec![json!({
        "tag": "input",
        "attrs": { "id": "managed" },
        "frameworkManaged": true
    })]));
    let node = node_by_id(&page, "managed");

    page.set_value(node, "ignored");
    assert_eq!(page.value(node), Some(""));

    assert!(page.set_value_native(node, ControlInterface::Input, "seen"));
    assert_eq!(page.value(node), Some("seen"));
}

#[test]
fn native_setter_requires_matching_interface() {
    let mut page = doc(html(vec![el("textarea", json!({ "id": "notes" }), vec![])]));
    let node = node_by_id(&page, "notes");
    assert!(!page.set_value_native(node, ControlInterface::Input, "x"));
    assert_eq!(page.value(node), Some(""));
    assert!(page.set_value_native(node, ControlInterface::TextArea, "x"));
    assert_eq!(page.value(node), Some("x"));
}

#[test]
fn select_only_accepts_values_of_its_options() {
    let mut page = doc(html(vec![el(
        "select",
        json!({ "id": "country" }),
        vec![
            text_el("option", json!({ "value": "fr" }), "France"),
            text_el("option", json!({ "value": "de", "selected": "" }), "Germany"),
        ],
    )]));
    let select = node_by_id(&page, "country");
    assert_eq!(page.value(select), Some("de"));

    page.set_value_native(select, ControlInterface::Select, "fr");
    assert_eq!(page.value(select), Some("fr"));

    page.set_value_native(select, ControlInterface::Select, "xx");
    assert_eq!(page.value(select), Some(""));
}

#[test]
fn mutations_are_journaled_with_driver_keys() {
    let mut page = doc(html(vec![json!({
        "tag": "input",
        "attrs": { "id": "email" },
        "key": "k-17"
    })]));
    let node = node_by_id(&page, "email");
    page.set_value(node, "a@b.c");
    page.dispatch_event(node, EventKind::Input, true);
    page.click(node);

    let journal = page.take_journal();
    assert_eq!(journal.len(), 3);
    assert!(matches!(
        &journal[0],
        Mutation::SetValue { key: Some(k), value, native: false, .. } if k == "k-17" && value == "a@b.c"
    ));
    assert!(matches!(journal[1], Mutation::Dispatch { event: EventKind::Input, bubbles: true, .. }));
    assert!(matches!(journal[2], Mutation::Click { .. }));
    assert!(page.journal().is_empty());
}

#[test]
fn mutation_serializes_with_op_tag() {
    let mut page = doc(html(vec![input(json!({ "type": "checkbox", "id": "c" }))]));
    let node = node_by_id(&page, "c");
    page.set_checked(node, true);
    let value = serde_json::to_value(&page.journal()[0]).unwrap();
    assert_eq!(value["op"], "setChecked");
    assert_eq!(value["checked"], true);
    assert!(value.get("key").is_none());
}

#[test]
fn programmatic_documents_support_queries() {
    let mut page = Document::new();
    let root = page.root();
    let html_node = page.append_element(root, Element::new("html"));
    let body = page.append_element(html_node, Element::new("body"));
    let mut field = Element::new("input");
    field.attrs.insert("name".into(), "city".into());
    let node = page.append_element(body, field);

    assert_eq!(page.body(), Some(body));
    assert_eq!(page.query_selector("body > [name=city]").unwrap(), Some(node));
}
