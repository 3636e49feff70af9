//! Deterministic multi-producer merge.
//!
//! Element and relationship producers run independently and may emit
//! colliding ids (a profile pass keys its output by the base UML element on
//! purpose). Each producer's output is tagged, and the merge is a reduction
//! over the priority-ordered batch list with one documented tie-break: a
//! non-UML producer wins over a UML producer on collision, otherwise the
//! first-seen item wins. Every collision is warned, never silent.

use indexmap::IndexMap;

use crate::ir::{ImportReport, IrElement, IrRelationship};

/// Which pass produced an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Producer {
    Uml,
    UmlAssociation,
    ArchiMate,
    Bpmn,
}

impl Producer {
    pub fn label(self) -> &'static str {
        match self {
            Self::Uml => "UML",
            Self::UmlAssociation => "UML association",
            Self::ArchiMate => "ArchiMate",
            Self::Bpmn => "BPMN",
        }
    }

    fn is_uml_family(self) -> bool {
        matches!(self, Self::Uml | Self::UmlAssociation)
    }
}

/// Anything mergeable by id.
pub(crate) trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for IrElement {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for IrRelationship {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Merge producer batches by id.
///
/// Batches must be passed in producer-priority order (UML-family first).
/// On collision the item is replaced wholesale — never field-merged — when
/// the newcomer outranks the holder; otherwise the holder stays. Either way
/// the report gains a warning naming both producers.
pub(crate) fn merge_by_id<T: Keyed>(
    batches: Vec<(Producer, Vec<T>)>,
    what: &str,
    report: &mut ImportReport,
) -> Vec<T> {
    let mut merged: IndexMap<String, (Producer, T)> = IndexMap::new();

    for (producer, items) in batches {
        for item in items {
            let id = item.key().to_string();
            match merged.get(&id) {
                None => {
                    merged.insert(id, (producer, item));
                }
                Some((holder, _)) => {
                    if holder.is_uml_family() && !producer.is_uml_family() {
                        report.warn(format!(
                            "duplicate {what} id '{id}' between {} and {}; keeping the {} version",
                            holder.label(),
                            producer.label(),
                            producer.label()
                        ));
                        merged.insert(id, (producer, item));
                    } else {
                        report.warn(format!(
                            "duplicate {what} id '{id}' between {} and {}; keeping the first-seen {} version",
                            holder.label(),
                            producer.label(),
                            holder.label()
                        ));
                    }
                }
            }
        }
    }

    merged.into_values().map(|(_, item)| item).collect()
}
