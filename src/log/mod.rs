//! Record Log Module
//!
//! The append-only file that holds every version of every record.
//!
//! ## Responsibilities
//! - Append serialized records and hand out their starting byte offset
//! - Positioned reads of a single line at a known offset
//! - Rebuild a position index from scratch by scanning every line
//!
//! ## File Format
//! ```text
//! offset 0   {"id":1,"name":"A"}\n
//! offset 20  {"id":2,"name":"B"}\n
//! offset 40  {"id":1,"name":"A2"}\n     <- live version of id 1
//! ```
//!
//! Lines are never rewritten. An update appends a new line and the index
//! moves to it; the older line stays behind as dead bytes.

mod file;
mod recovery;
pub mod record;

pub use file::RecordLog;
pub use record::{Record, RecordId, ID_FIELD};
pub use recovery::{RecoveryResult, RecoveryScanner};
