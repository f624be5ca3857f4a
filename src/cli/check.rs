use crate::models::Taxonomy;
use crate::Result;
use anyhow::Context;
use colored::Colorize;
use std::path::Path;

/// Validate the single-parent invariant of a taxonomy snapshot
pub fn run(path: &Path) -> Result<()> {
    let taxonomy = Taxonomy::load(path)
        .with_context(|| format!("Failed to load taxonomy {}", path.display()))?;

    let themes = taxonomy.theme_locations().len();
    let violations = taxonomy.check_invariants();

    if violations.is_empty() {
        println!(
            "{}",
            format!("✓ {} theme placements, no multi-parent sub-themes", themes).green()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!("⛔ {} invariant violation(s)", violations.len()).red().bold()
    );
    for violation in &violations {
        println!("   - {}", violation);
    }
    anyhow::bail!("Taxonomy has {} invariant violation(s)", violations.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
        "keywords": [{
            "id": "k1", "name": "Product", "level": "L1",
            "children": [{
                "id": "k2", "name": "Calendar", "level": "L2",
                "children": [{
                    "id": "k3", "name": "Sync", "level": "L3",
                    "themes": [
                        {"id": "t1", "name": "Sync Errors", "category": "issue",
                         "subThemes": [{"id": "s1", "name": "Google", "records": 4}]},
                        {"id": "t2", "name": "Sync Delays", "category": "issue",
                         "subThemes": [{"id": "s1", "name": "Google", "records": 4}]}
                    ]
                }]
            }]
        }]
    }"#;

    #[test]
    fn test_check_reports_multi_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taxonomy.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let err = run(&path).unwrap_err();
        assert!(err.to_string().contains("1 invariant violation"));
    }

    #[test]
    fn test_check_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(run(&temp.path().join("missing.json")).is_err());
    }
}
