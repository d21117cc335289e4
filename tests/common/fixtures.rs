#![allow(dead_code)]

use form_recall::dom::dom_model::{Document, NodeId};
use form_recall::field::field_model::{FieldDescriptor, FieldValue};
use form_recall::field::synthesis::capture_fields;
use form_recall::messaging::coordinator::Coordinator;
use form_recall::store::record::FormRecord;
use form_recall::store::store::MemoryStore;
use serde_json::{Value, json};

pub const LOGIN_URL: &str = "https://accounts.example.com/login?next=%2Fhome#top";
pub const LOGIN_PATTERN: &str = "https://accounts.example.com/login";

// ============================================================================
// Snapshot builders
// ============================================================================

pub fn doc(tree: Value) -> Document {
    Document::from_json(&tree).expect("fixture snapshot should parse")
}

pub fn html(body: Vec<Value>) -> Value {
    json!({ "tag": "html", "children": [ { "tag": "body", "children": body } ] })
}

pub fn el(tag: &str, attrs: Value, children: Vec<Value>) -> Value {
    json!({ "tag": tag, "attrs": attrs, "children": children })
}

pub fn text_el(tag: &str, attrs: Value, text: &str) -> Value {
    json!({ "tag": tag, "attrs": attrs, "text": text })
}

pub fn input(attrs: Value) -> Value {
    json!({ "tag": "input", "attrs": attrs })
}

pub fn hidden(mut node: Value) -> Value {
    node["hidden"] = json!(true);
    node
}

/// Email + password + remember-me + "Log in" button inside one form.
pub fn login_form() -> Value {
    el(
        "form",
        json!({ "action": "/session" }),
        vec![
            text_el("label", json!({ "for": "email" }), "Email address:"),
            input(json!({ "type": "email", "id": "email", "name": "email" })),
            text_el("label", json!({ "for": "pw" }), "Password *"),
            input(json!({ "type": "password", "id": "pw", "name": "password" })),
            el(
                "label",
                json!({}),
                vec![
                    input(json!({ "type": "checkbox", "name": "remember" })),
                    json!({ "tag": "span", "text": "Remember me" }),
                ],
            ),
            text_el("button", json!({ "type": "submit" }), "Log in"),
        ],
    )
}

pub fn login_page() -> Document {
    doc(html(vec![login_form()]))
}

pub fn node_by_id(doc: &Document, id: &str) -> NodeId {
    doc.get_element_by_id(id)
        .unwrap_or_else(|| panic!("fixture has no element #{}", id))
}

pub fn first(doc: &Document, selector: &str) -> NodeId {
    doc.query_selector(selector)
        .expect("fixture selector should parse")
        .unwrap_or_else(|| panic!("fixture has no match for {}", selector))
}

// ============================================================================
// Records
// ============================================================================

pub fn field(selector: &str, name: Option<&str>, field_type: &str, value: FieldValue) -> FieldDescriptor {
    FieldDescriptor {
        selector: selector.to_string(),
        name: name.map(str::to_string),
        id: None,
        field_type: field_type.to_string(),
        label: name.unwrap_or("field").to_string(),
        value,
        form_index: -1,
    }
}

/// Record built by capturing `doc`, then overwriting values.
pub fn captured_record(url: &str, doc: &Document, values: &[(&str, FieldValue)]) -> FormRecord {
    let mut record = FormRecord::from_capture(url, "Sign in", capture_fields(doc), 1_700_000_000_000);
    for (name, value) in values {
        if let Some(f) = record
            .fields
            .iter_mut()
            .find(|f| f.name.as_deref() == Some(*name))
        {
            f.value = value.clone();
        }
    }
    record
}

pub fn login_record(auto_fill: bool, auto_confirm: bool) -> FormRecord {
    let mut record = captured_record(
        LOGIN_URL,
        &login_page(),
        &[
            ("email", FieldValue::from("ada@example.com")),
            ("password", FieldValue::from("hunter2")),
            ("remember", FieldValue::from(true)),
        ],
    );
    record.auto_fill = auto_fill;
    record.auto_confirm = auto_confirm;
    record
}

pub fn record_with(id: &str, pattern: &str, title: &str, updated_at: u64) -> FormRecord {
    FormRecord {
        id: id.to_string(),
        url: format!("{}?ref=1", pattern),
        url_pattern: pattern.to_string(),
        title: title.to_string(),
        fields: vec![field("#q", Some("q"), "text", FieldValue::from("rust"))],
        submit_selector: None,
        auto_fill: false,
        auto_confirm: false,
        created_at: updated_at,
        updated_at,
    }
}

/// Coordinator with an empty store, for sessions that may need to relay.
pub fn relay_coordinator() -> Coordinator {
    Coordinator::new(Box::new(MemoryStore::new()))
}
