use tracing::debug;

use crate::dom::dom_model::{Document, NodeId};
use crate::field::field_model::FieldDescriptor;
use crate::field::synthesis::name_selector;

/// Which fallback located the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    Selector,
    Id,
    NameInForm,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub node: NodeId,
    pub via: ResolvedVia,
}

/// Find the live element for `field`, or `None` when the page no longer has it.
pub fn resolve(doc: &Document, field: &FieldDescriptor) -> Option<NodeId> {
    resolve_with_source(doc, field).map(|r| r.node)
}

/// Try, in order: the stored selector, the id, the name inside the form at
/// `form_index`, the name anywhere. Each tier runs regardless of which one
/// produced the stored selector.
pub fn resolve_with_source(doc: &Document, field: &FieldDescriptor) -> Option<Resolution> {
    match doc.query_selector(&field.selector) {
        Ok(Some(node)) => {
            return Some(Resolution {
                node,
                via: ResolvedVia::Selector,
            });
        }
        Ok(None) => {}
        Err(e) => debug!(error = %e, "stored selector unusable, falling back"),
    }

    if let Some(node) = field.id.as_deref().and_then(|id| doc.get_element_by_id(id)) {
        return Some(Resolution {
            node,
            via: ResolvedVia::Id,
        });
    }

    let name = field.name.as_deref()?;
    let by_name = name_selector(name);

    if let Some(form) = field.form_position().and_then(|i| doc.forms().get(i).copied()) {
        if let Ok(Some(node)) = doc.query_selector_from(form, &by_name) {
            return Some(Resolution {
                node,
                via: ResolvedVia::NameInForm,
            });
        }
    }

    match doc.query_selector(&by_name) {
        Ok(Some(node)) => Some(Resolution {
            node,
            via: ResolvedVia::Name,
        }),
        _ => None,
    }
}
