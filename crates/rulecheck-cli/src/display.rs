//! Human-readable rendering of rules, verdicts, and settings.

use std::path::Path;

use rulecheck_core::{LifecycleState, Outcome, Rule, Settlement};
use rulecheck_engine::Evaluation;
use rulecheck_store::Settings;

// ── Rules ──

/// One line per rule: position, status badge, title, short id.
pub fn print_rule_list(rules: &[Rule]) {
    if rules.is_empty() {
        println!("(no rules)");
        return;
    }
    for (i, rule) in rules.iter().enumerate() {
        println!(
            "{:>3}. {:<10} {}  [{}]",
            i + 1,
            badge(rule),
            rule.title,
            short_id(rule)
        );
    }
}

/// Full card for a single rule.
pub fn print_rule(position: usize, rule: &Rule) {
    println!("=== {}. {} ===", position, rule.title);
    print_field("id", &rule.id.to_string());
    print_field("state", rule.state.as_str());
    if !rule.definition.is_empty() {
        print_field("definition", &rule.definition);
    }
    if let Some(verdict) = &rule.result {
        print_field("outcome", &verdict.outcome.to_string());
        if let Some(at) = rule.evaluated_at {
            print_field("evaluated", &at.to_rfc3339());
        }
        println!();
        println!("{}", verdict.justification.trim());
    }
}

// ── Evaluations ──

pub fn print_evaluation(position: usize, title: &str, evaluation: &Evaluation) {
    let verdict = &evaluation.verdict;
    let note = match evaluation.settlement {
        Settlement::Applied => "",
        Settlement::Superseded => " (superseded)",
        Settlement::Removed => " (rule removed)",
    };
    println!(
        "{:>3}. {:<10} {}{}",
        position,
        format!("[{}]", verdict.outcome),
        title,
        note
    );
    println!("{}", indent(verdict.justification.trim(), 5));
}

// ── Settings ──

pub fn print_settings(settings: &Settings, data_dir: &Path, endpoint: &str, model: &str) {
    print_field("data dir", &data_dir.display().to_string());
    print_field("endpoint", endpoint);
    print_field("model", model);
    print_field(
        "api key",
        if settings.has_credential() {
            "set"
        } else {
            "not set"
        },
    );
    print_field(
        "prompt",
        if settings.uses_default_prompt() {
            "default"
        } else {
            "custom"
        },
    );
    println!();
    println!("{}", settings.system_prompt);
}

// ── Helpers ──

fn badge(rule: &Rule) -> String {
    match (rule.state, rule.outcome()) {
        (LifecycleState::Idle, _) => "-".to_string(),
        (LifecycleState::Evaluating, _) => "...".to_string(),
        (_, Some(outcome)) => format!("[{outcome}]"),
        (_, None) => format!("[{}]", Outcome::Unknown),
    }
}

fn short_id(rule: &Rule) -> String {
    rule.id.to_string().chars().take(8).collect()
}

fn print_field(label: &str, value: &str) {
    println!("  {:<12} {}", format!("{label}:"), value);
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
