use crate::dom::dom_model::{ControlInterface, Document, EventKind, NodeId};
use crate::field::field_model::{FieldDescriptor, FieldWrite};
use crate::field::resolver::resolve;

/// Notifications fired after every write, in order. Frameworks listen to
/// different subsets of these.
pub const FILL_EVENTS: [EventKind; 3] = [EventKind::Input, EventKind::Change, EventKind::Blur];

/// Write the stored value of `field` into `node` and notify listeners.
pub fn apply_value(doc: &mut Document, node: NodeId, field: &FieldDescriptor) {
    match field.write() {
        FieldWrite::Checked(checked) => doc.set_checked(node, checked),
        FieldWrite::InputValue(value) => write_native(doc, node, ControlInterface::Input, &value),
        FieldWrite::TextAreaValue(value) => {
            write_native(doc, node, ControlInterface::TextArea, &value)
        }
        FieldWrite::SelectValue(value) => write_native(doc, node, ControlInterface::Select, &value),
    }

    for event in FILL_EVENTS {
        doc.dispatch_event(node, event, true);
    }
}

/// Prefer the prototype setter so framework value trackers see the change;
/// fall back to the plain property when the element has a different
/// interface than the stored type suggests.
fn write_native(doc: &mut Document, node: NodeId, interface: ControlInterface, value: &str) {
    if !doc.set_value_native(node, interface, value) {
        doc.set_value(node, value);
    }
}

/// Resolve and fill each field. Returns how many were found and written.
pub fn fill_fields(doc: &mut Document, fields: &[FieldDescriptor]) -> usize {
    let mut filled = 0;
    for field in fields {
        if let Some(node) = resolve(doc, field) {
            apply_value(doc, node, field);
            filled += 1;
        }
    }
    filled
}
