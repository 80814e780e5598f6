//! # OffsetDB
//!
//! An embeddable record store built from two files:
//! - An append-only log of newline-delimited JSON records (the source of truth)
//! - A snapshot of the in-memory position index for fast restarts
//!
//! Every record carries a non-negative integer `id`. The position index maps
//! each id to the byte offset of its latest line in the log, so a point
//! lookup is one tree descent plus one positioned read.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Callers (CLI, HTTP, ...)                │
//! │        insert / update / find / get_many / bulk_load        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Engine                              │
//! │                (single writer, shared handle)               │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//! ┌─────────────┐       ┌───────────────┐      ┌──────────────┐
//! │ Record Log  │       │ PositionIndex │      │   Snapshot   │
//! │  (.jsonl)   │       │  (AVL tree)   │◄────►│   (.idx)     │
//! └──────┬──────┘       └───────▲───────┘      └──────────────┘
//!        │                      │
//!        └──── RecoveryScanner ─┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod log;
pub mod index;
pub mod snapshot;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{OffsetDbError, Result};
pub use config::Config;
pub use engine::{Engine, Page};
pub use log::Record;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of OffsetDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
