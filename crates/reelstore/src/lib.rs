//! # reelstore
//!
//! Durable named string lists backing reelkit's persistent state.
//!
//! ## Design
//! - One file per list, written whole and atomically (temp file + rename)
//! - Header-validated format parsed with nom
//! - In-memory mirror so reads never touch the disk
//!
//! The liked-flag set of the record cache is the main tenant: a few hundred
//! to a thousand short ids, rewritten on every debounced flush.

#![warn(missing_docs)]

mod parser;
mod storage;
mod error;

pub use error::{Error, Result};
pub use parser::{encode_list, parse_list, FORMAT_VERSION};
pub use storage::ListStore;
