//! Command-line entry points, one module per subcommand

pub mod check;
pub mod diff;
pub mod evaluate;
pub mod review;
pub mod serve;

use crate::models::OperationContext;
use crate::Result;
use anyhow::Context;
use std::path::Path;

/// Read a context argument: inline JSON, or `@path` to a JSON file
pub fn load_context(arg: &str) -> Result<OperationContext> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read context file {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&raw).context("Context is not a valid OperationContext JSON object")
}
