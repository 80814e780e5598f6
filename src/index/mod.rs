//! Position Index Module
//!
//! In-memory map from record id to the offset of its latest log line.
//!
//! ## Responsibilities
//! - Insert or overwrite an id's offset
//! - Point lookups
//! - Ascending-id enumeration (snapshots and paging)
//!
//! ## Data Structure Choice
//! An AVL tree stored in a `Vec` arena:
//! - Snapshot reloads feed ids back in ascending order, and demo data is
//!   inserted sequentially. A plain BST turns both into a linked list;
//!   the AVL rotations keep height at O(log n) for any insertion order.
//! - Traversal uses an explicit stack, never recursion.

mod tree;

use serde::{Deserialize, Serialize};

pub use tree::{Iter, PositionIndex};

use crate::log::RecordId;

/// One (id, offset) pair
///
/// Serialized as `{"i": <id>, "p": <offset>}` in the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "i")]
    pub id: RecordId,

    #[serde(rename = "p")]
    pub offset: u64,
}

impl IndexEntry {
    pub fn new(id: RecordId, offset: u64) -> Self {
        Self { id, offset }
    }
}
