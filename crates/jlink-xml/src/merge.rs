//! Merge a source device registry into a target registry.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::device::device_name;
use crate::tree::{Element, XmlNode};

/// Where an updated device ends up in the target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePlacement {
    /// Remove the old entry and append the new one at the end.
    #[default]
    Append,
    /// Replace the old entry at its current position.
    InPlace,
}

/// Outcome for a single source entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    Added(String),
    Updated(String),
    /// Source entry without a resolvable name; always appended.
    AddedUnnamed { tag: String },
}

impl fmt::Display for MergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeAction::Added(name) => write!(f, "added device: {name}"),
            MergeAction::Updated(name) => write!(f, "updated device: {name}"),
            MergeAction::AddedUnnamed { tag } => {
                write!(f, "device without Name attribute appended as-is (<{tag}>)")
            }
        }
    }
}

/// Per-entry actions of one merge, in source document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub actions: Vec<MergeAction>,
}

impl MergeReport {
    /// Entries appended to the target, named or not.
    pub fn added(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| !matches!(action, MergeAction::Updated(_)))
            .count()
    }

    pub fn updated(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| matches!(action, MergeAction::Updated(_)))
            .count()
    }

    pub fn unnamed(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| matches!(action, MergeAction::AddedUnnamed { .. }))
            .count()
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum RegistryKey {
    Named(String),
    /// Placeholder for an unnamed target entry. Only looked up by name, so it
    /// can never collide with a source device.
    Unnamed { tag: String, index: usize },
}

/// Merge the direct child elements of `source` into `target`.
///
/// Entries are keyed by [`device_name`]. New names are appended, known names
/// replace the first target entry carrying the same name. Non-element content
/// of `source` (comments, text) is ignored; that of `target` is kept.
pub fn merge_registry(
    target: &mut Element,
    source: Element,
    placement: UpdatePlacement,
) -> MergeReport {
    let mut keys: HashSet<RegistryKey> = target
        .elements()
        .enumerate()
        .map(|(index, element)| match device_name(element) {
            Some(name) => RegistryKey::Named(name.to_owned()),
            None => RegistryKey::Unnamed {
                tag: element.name.clone(),
                index,
            },
        })
        .collect();
    debug!(existing = keys.len(), "indexed target registry");

    let mut report = MergeReport::default();
    for incoming in source.into_elements() {
        let Some(name) = device_name(&incoming).map(str::to_owned) else {
            let tag = incoming.name.clone();
            target.children.push(XmlNode::Element(incoming));
            report.actions.push(MergeAction::AddedUnnamed { tag });
            continue;
        };

        if keys.insert(RegistryKey::Named(name.clone())) {
            target.children.push(XmlNode::Element(incoming));
            report.actions.push(MergeAction::Added(name));
            continue;
        }

        let position = target.children.iter().position(|node| match node {
            XmlNode::Element(existing) => device_name(existing) == Some(name.as_str()),
            _ => false,
        });
        match (position, placement) {
            (Some(index), UpdatePlacement::InPlace) => {
                target.children[index] = XmlNode::Element(incoming);
            }
            (Some(index), UpdatePlacement::Append) => {
                target.children.remove(index);
                target.children.push(XmlNode::Element(incoming));
            }
            (None, _) => target.children.push(XmlNode::Element(incoming)),
        }
        report.actions.push(MergeAction::Updated(name));
    }

    debug!(
        added = report.added(),
        updated = report.updated(),
        unnamed = report.unnamed(),
        "merged registry"
    );
    report
}
