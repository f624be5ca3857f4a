use crate::models::{Evaluation, GovernorConfig, OperationType, Verdict};
use crate::policy::build_service;
use crate::server::EvaluateResponse;
use crate::Result;
use colored::Colorize;

pub async fn run(config: &GovernorConfig, operation: &str, context: &str, json: bool) -> Result<()> {
    let op = OperationType::parse(operation);
    let ctx = super::load_context(context)?;

    if !op.is_known() {
        eprintln!(
            "{}",
            format!("⚠️  Unknown operation '{}', evaluating fail-closed", operation).yellow()
        );
    }

    let service = build_service(&config.decision);
    let evaluation = service.evaluate(&op, &ctx).await?;

    if json {
        let response = EvaluateResponse::new(&op, &ctx, evaluation);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", crate::diff::describe(&op, &ctx).cyan().bold());
    println!();
    print_evaluation(&evaluation);
    Ok(())
}

/// Coloured verdict block shared by `evaluate` and `review`
pub fn print_evaluation(evaluation: &Evaluation) {
    let verdict = evaluation.verdict.to_string();
    let verdict = match evaluation.verdict {
        Verdict::Approve => verdict.green().bold(),
        Verdict::ApproveWithConditions => verdict.yellow().bold(),
        Verdict::Reject => verdict.red().bold(),
        Verdict::Workaround | Verdict::Partial => verdict.blue().bold(),
    };

    println!(
        "   {} {} (confidence: {})",
        evaluation.verdict.emoji(),
        verdict,
        evaluation.confidence
    );

    for risk in &evaluation.risks {
        println!("   {} {}", "-".bright_black(), risk);
    }

    if let Some(text) = &evaluation.workaround {
        match evaluation.workaround_type {
            Some(kind) => println!("   {} [{}] {}", "→".cyan(), kind, text),
            None => println!("   {} {}", "→".cyan(), text),
        }
    }

    for item in &evaluation.partial_items {
        let mark = if item.included { "✓".green() } else { "✗".red() };
        println!("   {} {}: {}", mark, item.name, item.reason.bright_black());
    }
}
