//! Structural and textual diffs
//!
//! - [`structural`]: operation + context → ordered tree mutations
//! - [`text`]: word-level LCS diff for before/after rendering

pub mod structural;
pub mod text;

pub use structural::{build, describe};
pub use text::{diff, render_inline, truncate, DEFAULT_MAX_CONTEXT};
