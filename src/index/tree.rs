//! Index tree implementation
//!
//! Arena-backed AVL tree keyed by record id.

use std::cmp::Ordering;

use super::IndexEntry;
use crate::log::RecordId;

/// A tree node. Children are arena slots.
#[derive(Debug, Clone)]
struct Node {
    id: RecordId,
    offset: u64,
    left: Option<usize>,
    right: Option<usize>,
    height: u32,
}

/// Ordered id → offset index
///
/// Exactly one entry per id: inserting an existing id overwrites its
/// offset in place.
#[derive(Debug, Clone, Default)]
pub struct PositionIndex {
    /// Node arena. Nodes are never removed except by `clear`.
    nodes: Vec<Node>,

    /// Arena slot of the root
    root: Option<usize>,
}

impl PositionIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` at `offset`, or overwrite the offset of an existing id.
    ///
    /// Returns the previous offset when the id was already present.
    pub fn insert(&mut self, id: RecordId, offset: u64) -> Option<u64> {
        // Descend, remembering the path for the rebalance on the way back up
        let mut path = Vec::new();
        let mut current = self.root;

        while let Some(slot) = current {
            let node = &mut self.nodes[slot];
            match id.cmp(&node.id) {
                Ordering::Equal => return Some(std::mem::replace(&mut node.offset, offset)),
                Ordering::Less => current = node.left,
                Ordering::Greater => current = node.right,
            }
            path.push(slot);
        }

        let mut child = self.nodes.len();
        self.nodes.push(Node {
            id,
            offset,
            left: None,
            right: None,
            height: 1,
        });

        // Relink each ancestor to its (possibly rotated) subtree
        while let Some(parent) = path.pop() {
            if id < self.nodes[parent].id {
                self.nodes[parent].left = Some(child);
            } else {
                self.nodes[parent].right = Some(child);
            }
            child = self.rebalance(parent);
        }
        self.root = Some(child);

        None
    }

    /// Offset of the latest line for `id`
    pub fn find_position(&self, id: RecordId) -> Option<u64> {
        let mut current = self.root;
        while let Some(slot) = current {
            let node = &self.nodes[slot];
            match id.cmp(&node.id) {
                Ordering::Equal => return Some(node.offset),
                Ordering::Less => current = node.left,
                Ordering::Greater => current = node.right,
            }
        }
        None
    }

    /// Whether `id` has an entry
    pub fn contains(&self, id: RecordId) -> bool {
        self.find_position(id).is_some()
    }

    /// Iterate entries in ascending id order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            nodes: &self.nodes,
            stack: Vec::new(),
            next: self.root,
        }
    }

    /// All entries in ascending id order
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.iter().collect()
    }

    /// Replace the contents with `entries`, inserted in the given order.
    /// A later pair for the same id overwrites an earlier one.
    pub fn rebuild_from<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        self.clear();
        for entry in entries {
            self.insert(entry.id, entry.offset);
        }
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Height of the tree (0 when empty)
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn height_of(&self, slot: Option<usize>) -> u32 {
        slot.map_or(0, |s| self.nodes[s].height)
    }

    fn update_height(&mut self, slot: usize) {
        let node = &self.nodes[slot];
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.nodes[slot].height = height;
    }

    /// Left height minus right height
    fn balance_factor(&self, slot: usize) -> i64 {
        let node = &self.nodes[slot];
        i64::from(self.height_of(node.left)) - i64::from(self.height_of(node.right))
    }

    /// Restore the AVL property at `slot`; returns the subtree's new root
    fn rebalance(&mut self, slot: usize) -> usize {
        self.update_height(slot);
        let balance = self.balance_factor(slot);

        if balance > 1 {
            if let Some(left) = self.nodes[slot].left {
                if self.balance_factor(left) < 0 {
                    self.nodes[slot].left = Some(self.rotate_left(left));
                }
                return self.rotate_right(slot);
            }
        } else if balance < -1 {
            if let Some(right) = self.nodes[slot].right {
                if self.balance_factor(right) > 0 {
                    self.nodes[slot].right = Some(self.rotate_right(right));
                }
                return self.rotate_left(slot);
            }
        }

        slot
    }

    fn rotate_right(&mut self, slot: usize) -> usize {
        let Some(pivot) = self.nodes[slot].left else {
            return slot;
        };
        self.nodes[slot].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(slot);
        self.update_height(slot);
        self.update_height(pivot);
        pivot
    }

    fn rotate_left(&mut self, slot: usize) -> usize {
        let Some(pivot) = self.nodes[slot].right else {
            return slot;
        };
        self.nodes[slot].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(slot);
        self.update_height(slot);
        self.update_height(pivot);
        pivot
    }
}

/// In-order iterator over an index, driven by an explicit stack
pub struct Iter<'a> {
    nodes: &'a [Node],
    stack: Vec<usize>,
    next: Option<usize>,
}

impl Iterator for Iter<'_> {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(slot) = self.next {
            self.stack.push(slot);
            self.next = self.nodes[slot].left;
        }

        let slot = self.stack.pop()?;
        let node = &self.nodes[slot];
        self.next = node.right;
        Some(IndexEntry::new(node.id, node.offset))
    }
}

impl<'a> IntoIterator for &'a PositionIndex {
    type Item = IndexEntry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
