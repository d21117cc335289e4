use serde::{Deserialize, Serialize};

use crate::dom::dom_model::{Document, NodeId};
use crate::field::field_model::FieldDescriptor;
use crate::field::resolver::resolve;
use crate::store::record::FormRecord;

/// How much of a saved form must be on screen before filling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Fraction of resolvable fields that must be visible (rounded up).
    pub min_visible_ratio: f64,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            min_visible_ratio: 0.5,
        }
    }
}

impl ReadinessPolicy {
    pub fn required_visible(&self, resolvable: usize) -> usize {
        let ratio = self.min_visible_ratio.clamp(0.0, 1.0);
        (resolvable as f64 * ratio).ceil() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldPresence {
    pub resolvable: usize,
    pub visible: usize,
}

impl FieldPresence {
    pub fn is_ready(&self, policy: &ReadinessPolicy) -> bool {
        self.resolvable > 0 && self.visible >= policy.required_visible(self.resolvable)
    }
}

/// Rendered with a non-empty box.
pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    doc.bounding_rect(node).has_area()
}

/// Count the fields that resolve, and of those, the ones on screen.
pub fn field_presence(doc: &Document, fields: &[FieldDescriptor]) -> FieldPresence {
    fields
        .iter()
        .filter_map(|field| resolve(doc, field))
        .fold(FieldPresence::default(), |mut acc, node| {
            acc.resolvable += 1;
            if is_visible(doc, node) {
                acc.visible += 1;
            }
            acc
        })
}

/// True as soon as any record has enough of its fields on screen.
pub fn is_ready(doc: &Document, records: &[FormRecord], policy: &ReadinessPolicy) -> bool {
    records
        .iter()
        .any(|record| field_presence(doc, &record.fields).is_ready(policy))
}
