//! Reversible removal of the tool's own UI before a screen grab.
//!
//! Every mutation pushes its undo step onto a stack; restoring pops the
//! stack in reverse, so a partially applied suppression unwinds cleanly.

use tracing::debug;

use crate::dom::{Display, Document, NodeId, Placement, Position, Visibility};
use crate::hit_test::TOOL_ATTRIBUTE;

#[derive(Debug, Clone, Copy)]
enum Undo {
    Reattach {
        node: NodeId,
        placement: Placement,
    },
    Restyle {
        node: NodeId,
        visibility: Option<Visibility>,
        display: Display,
    },
}

/// Active suppression over a document. Dropping it restores the page.
pub struct Suppression<'a> {
    doc: &'a mut Document,
    stack: Vec<Undo>,
    detached: usize,
    hidden: usize,
}

impl<'a> Suppression<'a> {
    /// Detaches every tool-marked subtree, then hides any remaining
    /// fixed/absolute node stacked at or above `z_threshold`.
    pub fn apply(doc: &'a mut Document, z_threshold: i32) -> Self {
        let mut suppression = Self {
            doc,
            stack: Vec::new(),
            detached: 0,
            hidden: 0,
        };
        suppression.detach_tool_nodes();
        suppression.hide_stacked_nodes(z_threshold);
        debug!(
            detached = suppression.detached,
            hidden = suppression.hidden,
            "tool UI suppressed"
        );
        suppression
    }

    /// The page as it stands while suppressed.
    pub fn document(&self) -> &Document {
        self.doc
    }

    pub fn detached_count(&self) -> usize {
        self.detached
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden
    }

    /// Restores the page and returns how many undo steps ran.
    pub fn restore(mut self) -> usize {
        self.unwind()
    }

    fn detach_tool_nodes(&mut self) {
        // Outermost marked nodes only; their subtrees leave with them.
        let roots: Vec<NodeId> = self
            .doc
            .find_by_attribute(TOOL_ATTRIBUTE, None)
            .into_iter()
            .filter(|node| {
                self.doc
                    .composed_path(*node)
                    .into_iter()
                    .skip(1)
                    .all(|ancestor| self.doc.attribute(ancestor, TOOL_ATTRIBUTE).is_none())
            })
            .collect();

        for node in roots {
            if let Some(placement) = self.doc.detach(node) {
                self.stack.push(Undo::Reattach { node, placement });
                self.detached += 1;
            }
        }
    }

    fn hide_stacked_nodes(&mut self, z_threshold: i32) {
        let body = self.doc.body();
        let candidates: Vec<NodeId> = self
            .doc
            .composed_preorder()
            .into_iter()
            .filter(|node| *node != body && self.doc.is_element(*node))
            .filter(|node| {
                let style = self.doc.style(*node);
                matches!(style.position, Position::Fixed | Position::Absolute)
                    && style.z_index.is_some_and(|z| z >= z_threshold)
            })
            .collect();

        for node in candidates {
            let style = self.doc.style_mut(node);
            self.stack.push(Undo::Restyle {
                node,
                visibility: style.visibility,
                display: style.display,
            });
            style.visibility = Some(Visibility::Hidden);
            style.display = Display::None;
            self.hidden += 1;
        }
    }

    fn unwind(&mut self) -> usize {
        let steps = self.stack.len();
        while let Some(undo) = self.stack.pop() {
            match undo {
                Undo::Reattach { node, placement } => {
                    self.doc
                        .insert_before(placement.parent, node, placement.next_sibling);
                }
                Undo::Restyle {
                    node,
                    visibility,
                    display,
                } => {
                    let style = self.doc.style_mut(node);
                    style.visibility = visibility;
                    style.display = display;
                }
            }
        }
        if steps > 0 {
            debug!(steps, "tool UI restored");
        }
        steps
    }
}

impl Drop for Suppression<'_> {
    fn drop(&mut self) {
        self.unwind();
    }
}
