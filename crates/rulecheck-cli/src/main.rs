mod display;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rulecheck_ai::OpenAiClient;
use rulecheck_ai::openai::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use rulecheck_core::{Rule, RuleId};
use rulecheck_engine::{Orchestrator, Workspace};
use rulecheck_store::FileGateway;
use secrecy::SecretString;

#[derive(Parser, Debug)]
#[command(
    name = "rulecheck",
    version,
    about = "Judge free-text subject matter against named rules with a language model"
)]
struct Cli {
    /// Directory holding rules, subject matter, and settings.
    #[arg(long, global = true, env = "RULECHECK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL of an OpenAI-compatible chat-completions API.
    #[arg(long, global = true, env = "RULECHECK_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long, global = true, env = "RULECHECK_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Give up on a completion call after this many seconds.
    #[arg(
        long,
        global = true,
        env = "RULECHECK_TIMEOUT",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Use this API key for this run instead of the stored one.
    #[arg(long, global = true, env = "RULECHECK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the ordered rule list.
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// Manage the subject matter rules are evaluated against.
    Subject {
        #[command(subcommand)]
        command: SubjectCommand,
    },
    /// Evaluate rules (all of them when none are named), concurrently.
    Eval {
        /// Rules by 1-based position or id prefix.
        rules: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Manage the system prompt and API key.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        definition: String,
    },
    Remove {
        rule: String,
    },
    /// Move the rule at position FROM to position TO (1-based).
    Move {
        from: usize,
        to: usize,
    },
    Show {
        rule: String,
    },
}

#[derive(Subcommand, Debug)]
enum SubjectCommand {
    /// Set from an argument, a file, or stdin when neither is given.
    Set {
        #[arg(conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Show,
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    /// Set from an argument, a file, or stdin when neither is given.
    SetPrompt {
        #[arg(conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    ResetPrompt,
    SetKey {
        key: String,
    },
    ClearKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("rulecheck v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let gateway = FileGateway::open(&data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    let workspace = Arc::new(
        Workspace::load(Arc::new(gateway))
            .with_context(|| format!("loading workspace from {}", data_dir.display()))?,
    );

    match cli.command {
        Command::Rules { command } => run_rules(&workspace, command).await,
        Command::Subject { command } => run_subject(&workspace, command).await,
        Command::Config { command } => {
            run_config(&workspace, command, &data_dir, &cli.endpoint, &cli.model).await
        }
        Command::Eval { rules, json } => {
            let client = OpenAiClient::with_timeout(
                &cli.endpoint,
                &cli.model,
                Duration::from_secs(cli.timeout),
            )
            .context("building HTTP client")?;
            let client = Arc::new(client);
            let mut orchestrator = Orchestrator::new(workspace.clone(), client);
            if let Some(key) = cli.api_key.filter(|k| !k.trim().is_empty()) {
                orchestrator = orchestrator.with_credential(SecretString::new(key));
            }
            run_eval(&orchestrator, &rules, json).await
        }
    }
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set; pass --data-dir")?;
    Ok(PathBuf::from(home).join(".config").join("rulecheck"))
}

// ── Commands ──

async fn run_rules(workspace: &Workspace, command: RulesCommand) -> anyhow::Result<()> {
    match command {
        RulesCommand::List { json } => {
            let rules = workspace.rules().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
            } else {
                display::print_rule_list(&rules);
            }
        }
        RulesCommand::Add { title, definition } => {
            let id = workspace.add_rule(&title, &definition).await?;
            let position = workspace.rules().await.len();
            println!("Added rule {position}: {} ({id})", title.trim());
        }
        RulesCommand::Remove { rule } => {
            let rules = workspace.rules().await;
            let id = resolve_rule(&rules, &rule)?;
            workspace.remove_rule(id).await?;
            println!("Removed rule {id}");
        }
        RulesCommand::Move { from, to } => {
            workspace
                .reorder_rules(to_index(from)?, to_index(to)?)
                .await?;
            display::print_rule_list(&workspace.rules().await);
        }
        RulesCommand::Show { rule } => {
            let rules = workspace.rules().await;
            let id = resolve_rule(&rules, &rule)?;
            let position = rules.iter().position(|r| r.id == id).unwrap_or(0);
            display::print_rule(position + 1, &rules[position]);
        }
    }
    Ok(())
}

async fn run_subject(workspace: &Workspace, command: SubjectCommand) -> anyhow::Result<()> {
    match command {
        SubjectCommand::Set { text, file } => {
            let text = read_input(text, file.as_deref())?;
            workspace.set_subject(&text).await?;
            println!("Subject matter saved ({} chars)", text.chars().count());
        }
        SubjectCommand::Show => {
            let subject = workspace.subject().await;
            if subject.trim().is_empty() {
                println!("(no subject matter)");
            } else {
                println!("{subject}");
            }
        }
        SubjectCommand::Clear => {
            workspace.set_subject("").await?;
            println!("Subject matter cleared");
        }
    }
    Ok(())
}

async fn run_config(
    workspace: &Workspace,
    command: ConfigCommand,
    data_dir: &Path,
    endpoint: &str,
    model: &str,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = workspace.settings().await;
            display::print_settings(&settings, data_dir, endpoint, model);
        }
        ConfigCommand::SetPrompt { text, file } => {
            let text = read_input(text, file.as_deref())?;
            workspace.set_system_prompt(&text).await?;
            println!("System prompt saved");
        }
        ConfigCommand::ResetPrompt => {
            workspace.reset_system_prompt().await?;
            println!("System prompt reset to default");
        }
        ConfigCommand::SetKey { key } => {
            workspace.set_credential(&key).await?;
            println!("API key saved");
        }
        ConfigCommand::ClearKey => {
            workspace.clear_credential().await?;
            println!("API key cleared");
        }
    }
    Ok(())
}

async fn run_eval(orchestrator: &Orchestrator, refs: &[String], json: bool) -> anyhow::Result<()> {
    let rules = orchestrator.workspace().rules().await;
    if rules.is_empty() {
        bail!("no rules defined; add one with `rulecheck rules add <title>`");
    }

    let results = if refs.is_empty() {
        orchestrator.evaluate_all().await
    } else {
        let ids = refs
            .iter()
            .map(|r| resolve_rule(&rules, r))
            .collect::<anyhow::Result<Vec<_>>>()?;
        orchestrator.evaluate_many(&ids).await
    };

    let mut evaluations = Vec::new();
    let mut rejected = Vec::new();
    for (id, result) in results {
        match result {
            Ok(evaluation) => evaluations.push(evaluation),
            Err(e) => rejected.push((id, e)),
        }
    }

    if json {
        let rules = orchestrator.workspace().rules().await;
        let evaluated: Vec<&Rule> = rules
            .iter()
            .filter(|r| evaluations.iter().any(|e| e.rule_id == r.id))
            .collect();
        println!("{}", serde_json::to_string_pretty(&evaluated)?);
    } else {
        for evaluation in &evaluations {
            let position = rules.iter().position(|r| r.id == evaluation.rule_id);
            let title = position.map(|p| rules[p].title.as_str()).unwrap_or("?");
            display::print_evaluation(position.map_or(0, |p| p + 1), title, evaluation);
        }
    }

    if let Some((id, first)) = rejected.first() {
        bail!(
            "evaluation rejected for {} rule(s); first ({id}): {first}",
            rejected.len()
        );
    }
    Ok(())
}

// ── Helpers ──

/// Shortest reference tried as an id prefix before a position.
const MIN_ID_PREFIX: usize = 8;

/// Resolve a rule reference: a 1-based position, or a unique id prefix.
///
/// References of [`MIN_ID_PREFIX`] or more characters are matched against
/// ids first, so an all-digit id prefix is never read as a position.
fn resolve_rule(rules: &[Rule], reference: &str) -> anyhow::Result<RuleId> {
    let reference = reference.trim();
    let matches = id_matches(rules, reference);
    let positional = reference.len() < MIN_ID_PREFIX || matches.is_empty();
    if let (true, Ok(position)) = (positional, reference.parse::<usize>()) {
        return match position.checked_sub(1).and_then(|i| rules.get(i)) {
            Some(rule) => Ok(rule.id),
            None => bail!("no rule at position {position} ({} rules)", rules.len()),
        };
    }

    match matches.as_slice() {
        [rule] => Ok(rule.id),
        [] => bail!("no rule matches {reference:?}"),
        _ => bail!("{reference:?} matches {} rules; use a longer prefix", matches.len()),
    }
}

fn id_matches<'a>(rules: &'a [Rule], prefix: &str) -> Vec<&'a Rule> {
    if prefix.is_empty() {
        return Vec::new();
    }
    rules
        .iter()
        .filter(|r| r.id.to_string().starts_with(prefix))
        .collect()
}

fn to_index(position: usize) -> anyhow::Result<usize> {
    position
        .checked_sub(1)
        .context("rule positions start at 1")
}

fn read_input(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(buf)
}
