//! Word-level LCS diff used for before/after rendering of renamed entities

use crate::models::{DiffSegment, SegmentKind};

/// Characters of context kept on each side of a long common run
pub const DEFAULT_MAX_CONTEXT: usize = 40;

const ELLIPSIS: &str = "…";

/// Diff two strings word by word
///
/// Words are whitespace-separated tokens. Consecutive words of the same kind
/// are merged into one segment joined by a single space, so original runs of
/// whitespace are not preserved except when the strings are equal.
pub fn diff(old: &str, new: &str) -> Vec<DiffSegment> {
    if old == new {
        return vec![DiffSegment::common(old)];
    }

    let a: Vec<&str> = old.split_whitespace().collect();
    let b: Vec<&str> = new.split_whitespace().collect();

    if a.is_empty() {
        return vec![DiffSegment::added(new)];
    }
    if b.is_empty() {
        return vec![DiffSegment::removed(old)];
    }

    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }

    // Backtrack from the bottom-right corner. On ties the added word wins.
    let mut words: Vec<(SegmentKind, &str)> = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            words.push((SegmentKind::Common, a[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || dp[i][j - 1] >= dp[i - 1][j]) {
            words.push((SegmentKind::Added, b[j - 1]));
            j -= 1;
        } else {
            words.push((SegmentKind::Removed, a[i - 1]));
            i -= 1;
        }
    }
    words.reverse();

    merge_words(words)
}

fn merge_words(words: Vec<(SegmentKind, &str)>) -> Vec<DiffSegment> {
    let mut segments: Vec<DiffSegment> = Vec::new();
    for (kind, word) in words {
        match segments.last_mut() {
            Some(last) if last.kind == kind => {
                last.text.push(' ');
                last.text.push_str(word);
            }
            _ => segments.push(DiffSegment::new(kind, word)),
        }
    }
    segments
}

/// Shorten long common runs, keeping `max_context` characters of context
///
/// A common segment longer than `2 * max_context` characters keeps only its
/// tail when it opens the diff, only its head when it closes it, and both
/// when it sits in between. Idempotent.
pub fn truncate(segments: &[DiffSegment], max_context: usize) -> Vec<DiffSegment> {
    let single = segments.len() == 1;
    let last = segments.len().saturating_sub(1);

    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            if segment.kind != SegmentKind::Common
                || segment.text.chars().count() <= 2 * max_context
            {
                return segment.clone();
            }

            let text = if index == 0 && !single {
                format!("{}{}", ELLIPSIS, tail(&segment.text, max_context))
            } else if index == last && !single {
                format!("{}{}", head(&segment.text, max_context), ELLIPSIS)
            } else {
                format!(
                    "{}{}{}",
                    head(&segment.text, max_context),
                    ELLIPSIS,
                    tail(&segment.text, max_context)
                )
            };
            DiffSegment::common(text)
        })
        .collect()
}

fn head(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

fn tail(text: &str, chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(chars)).collect()
}

/// Inline plain-text rendering: `[-removed-]` and `{+added+}`
pub fn render_inline(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .map(|s| match s.kind {
            SegmentKind::Common => s.text.clone(),
            SegmentKind::Removed => format!("[-{}-]", s.text),
            SegmentKind::Added => format!("{{+{}+}}", s.text),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
