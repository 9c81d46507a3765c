//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::agents::{Director, PromptSet, Services, build_director};
use crate::cli::output::{
    Classification, OutputFormat, format_chat, format_classification, format_dashboard,
    format_routes, format_rows, format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::cli::repl;
use crate::completion::create_completion;
use crate::error::{CommandError, Error, Result, StorageError};
use crate::routing::{Granularity, RoutingTable, classify, matched_keywords};
use crate::storage::{Filter, SqliteStore, Store, seed_defaults};
use serde_json::json;
use std::fmt::Write as FmtWrite;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, &cli.area, format),
        Commands::Status => cmd_status(cli, &db_path, format),
        Commands::Reset { yes } => cmd_reset(&db_path, *yes, &cli.area, format),
        Commands::Chat { message } => cmd_chat(cli, &db_path, &message.join(" "), format),
        Commands::Repl => cmd_repl(cli, &db_path, format),
        Commands::Dashboard => cmd_dashboard(cli, &db_path, format),
        Commands::Strategy => cmd_strategy(cli, &db_path, format),
        Commands::Classify { text } => cmd_classify(cli, &text.join(" "), format),
        Commands::Routes => cmd_routes(cli, format),
        Commands::Prompts { dir } => cmd_prompts(dir.as_deref(), format),
        Commands::Rows { table, limit } => cmd_rows(&db_path, table, *limit, format),
    }
}

/// Opens the store and ensures it's initialized.
fn open_store(db_path: &Path) -> Result<SqliteStore> {
    let store = SqliteStore::open(db_path)?;

    if !store.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }

    Ok(store)
}

/// Builds the hierarchy described by the CLI flags.
///
/// Commands that never call the model fall back to offline mode when no
/// API key is set.
///
/// # Errors
///
/// Returns an error for invalid settings, an uninitialized store, an
/// unreadable routing table, or an unavailable completion backend.
pub fn build_from_cli(cli: &Cli, db_path: &Path, needs_model: bool) -> Result<Director> {
    let mut settings = cli.settings();
    if !needs_model && settings.completion.api_key().is_none() {
        settings.completion.offline = true;
    }
    settings.validate()?;

    let store: Arc<dyn Store> = Arc::new(open_store(db_path)?);
    let table = RoutingTable::load(cli.routing_table.as_deref())?;
    let prompts = PromptSet::load(cli.prompt_dir.as_deref());
    let completion = create_completion(&settings.completion)?;
    info!(
        completion = completion.name(),
        fan_out = ?settings.fan_out,
        area = %settings.area,
        "hierarchy ready"
    );

    let services = Services::new(store, completion, table, prompts);
    Ok(build_director(services, &settings))
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &Path, force: bool, area: &str, format: OutputFormat) -> Result<String> {
    // Check if already exists
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    // If force, delete existing
    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    let store = SqliteStore::open(db_path)?;
    store.init()?;
    let seeded = seed_defaults(&store, area.trim())?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Initialized director database at: {}\nSeeded {} equipment groups and {} meal types.\n",
            db_path.display(),
            seeded.equipment_groups,
            seeded.meal_types
        )),
        OutputFormat::Json => Ok(to_json(&json!({
            "path": db_path.display().to_string(),
            "seeded": seeded,
        }))),
    }
}

fn cmd_status(cli: &Cli, db_path: &Path, format: OutputFormat) -> Result<String> {
    let stats = open_store(db_path)?.stats()?;
    let director = build_from_cli(cli, db_path, false)?;
    Ok(format_status(
        &stats,
        &director.status(),
        director.completion_name(),
        format,
    ))
}

fn cmd_reset(db_path: &Path, yes: bool, area: &str, _format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(CommandError::ExecutionFailed(
            "Use --yes to confirm reset. This will delete all data.".to_string(),
        )
        .into());
    }

    let store = open_store(db_path)?;
    store.reset()?;
    seed_defaults(&store, area.trim())?;

    Ok("Director state reset successfully.\n".to_string())
}

fn cmd_chat(cli: &Cli, db_path: &Path, message: &str, format: OutputFormat) -> Result<String> {
    let mut director = build_from_cli(cli, db_path, true)?;
    let (reply, metadata) = director.chat(message);
    Ok(format_chat(&reply, &metadata, format))
}

fn cmd_strategy(cli: &Cli, db_path: &Path, format: OutputFormat) -> Result<String> {
    let mut director = build_from_cli(cli, db_path, true)?;
    let (reply, metadata) = director.strategy();
    Ok(format_chat(&reply, &metadata, format))
}

fn cmd_repl(cli: &Cli, db_path: &Path, format: OutputFormat) -> Result<String> {
    let mut director = build_from_cli(cli, db_path, true)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    repl::run(&mut director, stdin.lock(), &mut stdout, format)?;
    Ok(String::new())
}

fn cmd_dashboard(cli: &Cli, db_path: &Path, format: OutputFormat) -> Result<String> {
    let director = build_from_cli(cli, db_path, false)?;
    Ok(format_dashboard(&director.dashboard(), format))
}

fn cmd_classify(cli: &Cli, text: &str, format: OutputFormat) -> Result<String> {
    let table = RoutingTable::load(cli.routing_table.as_deref())?;

    let domains = classify(text, &table.domains, Granularity::Domain);
    let specialists = match (domains.is_multi_domain, domains.primary()) {
        (false, Some(domain)) => table
            .specialists_for(domain)
            .map(|rules| classify(text, rules, Granularity::Specialist)),
        _ => None,
    };
    let intents = classify(text, &table.intents, Granularity::Specialist).targets;

    let classification = Classification {
        text: text.to_string(),
        matched: matched_keywords(text, &table.domains),
        domains,
        specialists,
        intents,
    };
    Ok(format_classification(&classification, format))
}

fn cmd_routes(cli: &Cli, format: OutputFormat) -> Result<String> {
    let table = RoutingTable::load(cli.routing_table.as_deref())?;
    Ok(format_routes(&table, format))
}

fn cmd_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| Error::Config {
            message: "cannot determine home directory. Pass --dir".to_string(),
        })?;
    let written = PromptSet::write_defaults(&dir)?;

    match format {
        OutputFormat::Text => {
            let mut output = format!(
                "Wrote {} prompt file(s) to {}\n",
                written.len(),
                dir.display()
            );
            for path in &written {
                let _ = writeln!(output, "  {}", path.display());
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(to_json(&json!({
            "dir": dir.display().to_string(),
            "written": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        }))),
    }
}

fn cmd_rows(db_path: &Path, table: &str, limit: usize, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    let rows = store.get_all(table, &Filter::new(), Some(limit))?;
    Ok(format_rows(table, &rows, format))
}

fn to_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::test_cli;
    use tempfile::TempDir;

    fn setup() -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        (temp_dir, db_path)
    }

    #[test]
    fn test_cmd_init() {
        let (_temp_dir, db_path) = setup();
        let result = cmd_init(&db_path, false, "health", OutputFormat::Text).unwrap();
        assert!(db_path.exists());
        assert!(result.contains("Seeded 4 equipment groups and 4 meal types."));
    }

    #[test]
    fn test_cmd_init_already_exists() {
        let (_temp_dir, db_path) = setup();

        cmd_init(&db_path, false, "health", OutputFormat::Text).unwrap();

        // Second init should fail without force
        let result = cmd_init(&db_path, false, "health", OutputFormat::Text);
        assert!(result.is_err());

        // With force should succeed
        let result = cmd_init(&db_path, true, "health", OutputFormat::Text);
        assert!(result.is_ok());
    }

    #[test]
    fn test_cmd_status_offline_without_key() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, "health", OutputFormat::Text).unwrap();

        let mut cli = test_cli(Some(db_path.clone()), Commands::Status);
        cli.offline = false;
        let result = cmd_status(&cli, &db_path, OutputFormat::Text).unwrap();
        assert!(result.contains("equipment_groups   4"));
        assert!(result.contains("Completion:    offline"));
        assert!(result.contains("nutrition (memory 0/20)"));
    }

    #[test]
    fn test_cmd_status_not_initialized() {
        let (_temp_dir, db_path) = setup();
        let cli = test_cli(Some(db_path.clone()), Commands::Status);
        let err = cmd_status(&cli, &db_path, OutputFormat::Text).unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::NotInitialized)));
    }

    #[test]
    fn test_cmd_reset() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, "health", OutputFormat::Text).unwrap();

        // Without --yes should fail
        let result = cmd_reset(&db_path, false, "health", OutputFormat::Text);
        assert!(result.is_err());

        // With --yes should succeed and reseed
        cmd_reset(&db_path, true, "health", OutputFormat::Text).unwrap();
        let rows = cmd_rows(&db_path, "equipment_groups", 10, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rows).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_cmd_chat_requires_key_unless_offline() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, "health", OutputFormat::Text).unwrap();

        let mut cli = test_cli(Some(db_path.clone()), Commands::Status);
        cli.offline = false;
        let err = cmd_chat(&cli, &db_path, "hello", OutputFormat::Text).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        cli.offline = true;
        let output = cmd_chat(&cli, &db_path, "Show me my home gym equipment", OutputFormat::Text)
            .unwrap();
        assert!(output.starts_with("[Routed to Health → Equipment]"));
        assert!(output.contains("Equipment in Home Gym (0)"));
    }

    #[test]
    fn test_cmd_classify_json() {
        let cli = test_cli(None, Commands::Routes);
        let output =
            cmd_classify(&cli, "Plan healthy meals within my budget", OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["domains"]["targets"], json!(["health", "finance"]));
        assert_eq!(parsed["domains"]["is_multi_domain"], true);
        assert!(parsed["specialists"].is_null());
    }

    #[test]
    fn test_cmd_classify_text_single() {
        let cli = test_cli(None, Commands::Routes);
        let output =
            cmd_classify(&cli, "I bought a kettlebell for my home gym", OutputFormat::Text).unwrap();
        assert!(output.contains("Domains (single domain):"));
        assert!(output.contains("Specialist: equipment"));
        assert!(output.contains("Intents: add"));
    }

    #[test]
    fn test_cmd_routes_json_round_trips() {
        let cli = test_cli(None, Commands::Routes);
        let output = cmd_routes(&cli, OutputFormat::Json).unwrap();
        let table = RoutingTable::from_json(&output).unwrap();
        assert_eq!(table, RoutingTable::default_table());
    }

    #[test]
    fn test_cmd_prompts() {
        let temp_dir = TempDir::new().unwrap();
        let output = cmd_prompts(Some(temp_dir.path()), OutputFormat::Text).unwrap();
        assert!(output.starts_with("Wrote 6 prompt file(s)"));

        let output = cmd_prompts(Some(temp_dir.path()), OutputFormat::Text).unwrap();
        assert!(output.starts_with("Wrote 0 prompt file(s)"));
    }

    #[test]
    fn test_cmd_rows_unknown_table() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, "health", OutputFormat::Text).unwrap();
        let err = cmd_rows(&db_path, "users", 10, OutputFormat::Text).unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::UnknownTable { .. })));
    }
}
