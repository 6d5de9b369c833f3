//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - shop: Run an interactive shopping session
//! - preferences show/forget: Inspect or clear remembered preferences
//! - config show/path: Print the effective configuration
//! - doctor: Validate configuration and check credentials and providers

use anyhow::{Context, Result};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use crate::clarifier::Prompt;
use crate::config::Config;
use crate::db::Database;
use crate::llm::router::LLMRouter;
use crate::memory::PreferenceMemory;
use crate::research::ResearchOutcome;
use crate::secrets::{scrub_secrets, SecretCache, SecretManager, TAVILY_API_KEY};
use crate::session::{self, Conversation, ShoppingSession};
use sdk::errors::{ConciergeErrorExt, Stage, StageError};

/// Keychain service holding credentials
pub const KEYCHAIN_SERVICE: &str = "concierge";

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

fn secret_cache() -> Arc<SecretCache> {
    Arc::new(SecretCache::new(Arc::new(SecretManager::new(KEYCHAIN_SERVICE))))
}

fn stage_failure(error: StageError) -> anyhow::Error {
    anyhow::anyhow!(
        "{}\nHint: {}",
        scrub_secrets(&error.to_string()),
        error.user_hint()
    )
}

/// Interview over stdin/stdout.
///
/// In JSON mode the conversation goes to stderr so stdout carries only the
/// final report.
pub struct TerminalConversation {
    format: OutputFormat,
}

impl TerminalConversation {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn say(&self, text: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", text),
            OutputFormat::Json => eprintln!("{}", text),
        }
    }

    fn read_line(&self) -> Result<String> {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read input")?;
        if read == 0 {
            anyhow::bail!("input closed");
        }
        Ok(line.trim().to_string())
    }
}

impl Conversation for TerminalConversation {
    fn ask(&mut self, prompt: &Prompt) -> Result<String> {
        match prompt {
            Prompt::Question { text, .. } => {
                self.say(&format!("\n{}", text));
                self.say("(answer, 'skip' to move on, 'done' to finish)");
            }
            Prompt::Confirm { summary } => {
                self.say(&format!("\nHere is what I have:\n{}", summary));
                self.say("Type 'yes' to search, or 'edit budget|use|constraints|priorities'.");
            }
            Prompt::Finished => return Ok("done".to_string()),
        }
        self.read_line()
    }

    fn show_outcome(&mut self, outcome: &ResearchOutcome) {
        if self.format == OutputFormat::Json {
            return;
        }
        print_outcome(outcome);
    }

    fn confirm_remember(&mut self) -> bool {
        self.say("\nRemember these preferences for next time? [y/N]");
        matches!(
            self.read_line().map(|reply| reply.to_lowercase()),
            Ok(reply) if reply == "y" || reply == "yes"
        )
    }
}

fn print_outcome(outcome: &ResearchOutcome) {
    println!();
    if outcome.no_grounded_matches {
        println!("I could not find products backed by the search results.");
        println!("Try a broader request or fewer constraints.");
    }

    for (i, rec) in outcome.recommendations.iter().enumerate() {
        let price = rec
            .price
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "price unknown".to_string());
        println!("{}. {} ({})", i + 1, rec.name, price);
        println!("   {}", rec.url);
        println!("   Score: {:.2}", rec.score);
        for highlight in &rec.rationale.highlights {
            println!("   + {}", highlight);
        }
        for watch_out in &rec.rationale.watch_outs {
            println!("   - {}", watch_out);
        }
        if !rec.rationale.best_for.is_empty() {
            println!("   Best for: {}", rec.rationale.best_for);
        } else if !rec.fit_note.is_empty() {
            println!("   {}", rec.fit_note);
        }
        println!();
    }

    if let Some(tip) = &outcome.comparison_tip {
        println!("Tip: {}", tip);
    }
    if outcome.dropped_count > 0 {
        println!(
            "{} suggestion(s) were left out because they could not be matched to a search result.",
            outcome.dropped_count
        );
    }
}

/// Run an interactive shopping session
pub async fn handle_shop(
    topic: String,
    session_id: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let secrets = secret_cache();
    session::preflight(config, &secrets).map_err(|e| stage_failure(StageError::new(Stage::Setup, e)))?;

    let shopping = ShoppingSession::from_config(config, secrets).await;
    let mut conversation = TerminalConversation::new(format);

    let report = shopping
        .run(&mut conversation, &session_id, &topic)
        .await
        .map_err(stage_failure)?;

    match format {
        OutputFormat::Text => {
            if report.remembered > 0 {
                println!("Remembered {} preference(s).", report.remembered);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn open_memory(config: &Config) -> Result<(Database, PreferenceMemory)> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let memory = PreferenceMemory::from_config(database.preferences(), &config.memory);
    Ok((database, memory))
}

/// Show active preferences of a session
pub async fn handle_preferences_show(session_id: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let (database, memory) = open_memory(config).await?;
    let records = memory.load(session_id, chrono::Utc::now().timestamp()).await?;

    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No active preferences for session '{}'", session_id);
            } else {
                println!("Preferences for session '{}':", session_id);
                for record in &records {
                    let updated = chrono::DateTime::from_timestamp(record.last_updated, 0)
                        .map(|dt| dt.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "Unknown".to_string());
                    println!("  {:<20} {} (updated {})", record.attribute, record.value, updated);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "session": session_id,
                "retention_days": config.memory.retention_days,
                "preferences": records,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    database.close().await
}

/// Delete all preferences of a session
pub async fn handle_preferences_forget(session_id: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let (database, memory) = open_memory(config).await?;
    let removed = memory.forget(session_id).await?;

    match format {
        OutputFormat::Text => println!("Forgot {} preference(s) for session '{}'", removed, session_id),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "session": session_id, "removed": removed }))?
        ),
    }

    database.close().await
}

/// Print the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!(
            "{}",
            toml::to_string_pretty(config).context("Failed to serialize config")?
        ),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}

/// Print the configuration file path
pub fn handle_config_path(path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", path.display()),
        OutputFormat::Json => println!("{}", json!({ "path": path.display().to_string() })),
    }
    Ok(())
}

/// Validate configuration, credentials and provider reachability
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration".into(), "Valid".into()));

    if config.core.data_dir.exists() {
        checks.push(("Data directory".into(), "Exists".into()));
    } else {
        checks.push(("Data directory".into(), "Missing".into()));
        issues.push(format!("Data directory does not exist: {:?}", config.core.data_dir));
    }

    if config.memory.enabled {
        match Database::new(&config.database_path()).await {
            Ok(db) => {
                checks.push(("Preference database".into(), "OK".into()));
                db.close().await.ok();
            }
            Err(e) => {
                checks.push(("Preference database".into(), "Failed".into()));
                issues.push(format!("Cannot open preference database: {:#}", e));
            }
        }
    } else {
        checks.push(("Preference memory".into(), "Disabled".into()));
    }

    let secrets = secret_cache();
    if let Some(key) = session::provider_key(&config.llm.default_provider) {
        let var = SecretManager::env_var_name(key);
        if secrets.get_secret(key).is_ok() {
            checks.push((var, "Configured".into()));
        } else {
            checks.push((var.clone(), "Missing".into()));
            issues.push(format!(
                "{} is required for the '{}' provider",
                var, config.llm.default_provider
            ));
        }
    }
    let tavily_var = SecretManager::env_var_name(TAVILY_API_KEY);
    if secrets.get_secret(TAVILY_API_KEY).is_ok() {
        checks.push((tavily_var, "Configured".into()));
    } else {
        checks.push((tavily_var.clone(), "Missing".into()));
        issues.push(format!("{} is required for product search", tavily_var));
    }

    let router = LLMRouter::from_config(&config.llm, Arc::clone(&secrets));
    for (name, healthy) in router.check_health_all().await {
        if healthy {
            checks.push((format!("Provider {}", name), "Available".into()));
        } else {
            checks.push((format!("Provider {}", name), "Unavailable".into()));
            issues.push(format!("LLM provider '{}' is not reachable", name));
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Concierge Diagnostics");
            println!("=====================");
            println!();

            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }
            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
