use crate::diff::{diff, truncate};
use crate::models::{DiffSegment, SegmentKind};
use crate::Result;
use colored::Colorize;

pub fn run(old: &str, new: &str, max_context: usize) -> Result<()> {
    let segments = truncate(&diff(old, new), max_context);
    println!("{}", render_colored(&segments));
    Ok(())
}

/// Removed words red and struck through, added words green
pub fn render_colored(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .map(|s| match s.kind {
            SegmentKind::Common => s.text.normal().to_string(),
            SegmentKind::Removed => s.text.red().strikethrough().to_string(),
            SegmentKind::Added => s.text.green().bold().to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
