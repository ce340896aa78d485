//! sqlrest: run SQL against a PostgREST table API
//!
//! # Usage
//!
//! ```bash
//! # Execute a statement
//! sqlrest "SELECT id, email FROM users WHERE active = true LIMIT 10" --url http://localhost:3000
//!
//! # Dry run (show the table-API call only)
//! sqlrest "DELETE FROM sessions WHERE expires < 1700000000" --dry-run
//!
//! # Show how a statement is translated
//! sqlrest explain "SELECT * FROM users WHERE a = 1 OR b = 2"
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlrest::client::render_params;
use sqlrest::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlrest")]
#[command(version)]
#[command(about = "Run MySQL-dialect SQL against a PostgREST table API", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlrest 'SELECT id, name FROM users ORDER BY name' --url http://localhost:3000
    sqlrest 'INSERT INTO users (name, age) VALUES (\"Ada\", 36)' --dry-run
    sqlrest explain 'UPDATE users SET active = false WHERE last_seen < 1700000000'")]
struct Cli {
    /// The SQL statement to execute
    query: Option<String>,

    /// Don't execute, just show the table-API call
    #[arg(short, long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// PostgREST base URL
    #[arg(long, env = "SQLREST_URL")]
    url: Option<String>,

    /// API key sent as `apikey` and bearer token
    #[arg(long, env = "SQLREST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Schema to target (Accept-Profile / Content-Profile)
    #[arg(long, env = "SQLREST_SCHEMA")]
    schema: Option<String>,

    /// Config file (defaults to ./sqlrest.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and explain a SQL statement
    Explain {
        /// The SQL statement to explain
        query: String,
    },
    /// Show the operator reference
    Operators,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "sqlrest=debug" } else { "sqlrest=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = match &cli.command {
        Some(Commands::Explain { query }) => load_config(&cli).map(|config| explain_query(query, &config)),
        Some(Commands::Operators) => {
            show_operators();
            Ok(())
        }
        None => match &cli.query {
            Some(query) => execute_query(query, &cli).await,
            None => {
                println!("{}", "sqlrest: SQL for PostgREST table APIs".cyan().bold());
                println!();
                println!("Usage: sqlrest <SQL> [OPTIONS]");
                println!();
                println!("Try: sqlrest --help");
                Ok(())
            }
        },
    };

    if let Err(e) = outcome {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Config file and environment, then command-line flags on top.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.url {
        config.rest.url = Some(url.clone());
    }
    if let Some(key) = &cli.api_key {
        config.rest.api_key = Some(key.clone());
    }
    if let Some(schema) = &cli.schema {
        config.rest.schema = Some(schema.clone());
    }
    Ok(config)
}

async fn execute_query(query: &str, cli: &Cli) -> anyhow::Result<()> {
    if cli.verbose {
        println!("{} {}", "Input:".dimmed(), query.yellow());
    }

    let config = load_config(cli)?;
    let planner = Planner::from_config(&config);

    // Dry run or no URL - just show the call
    if cli.dry_run || config.rest.url.is_none() {
        let plan = planner.plan(query)?;
        println!("{}", "Table API call:".green().bold());
        println!("{}", plan.query.to_string().white());

        if cli.verbose {
            println!("{} {}", "Route:".dimmed(), plan.route.to_string().cyan());
        }
        if config.rest.url.is_none() && !cli.dry_run {
            println!();
            println!(
                "{}",
                "⚠ No API URL. Use --url, set SQLREST_URL or add [rest] url to sqlrest.toml".yellow()
            );
        }
        return Ok(());
    }

    let client = PostgrestClient::from_config(&config.rest)?;
    if cli.verbose {
        println!("{} {}", "Endpoint:".dimmed(), client.base_url());
    }

    let executor = SqlExecutor::with_planner(client, planner);
    let result = executor.execute_sql(query).await;
    if let Some(err) = result.error {
        anyhow::bail!("{}", err);
    }

    match result.data {
        Some(rows) => format_output(&rows, &cli.format),
        None => println!("{} done", "✓".green()),
    }
    Ok(())
}

fn format_output(results: &[Row], format: &OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        }
        OutputFormat::Table => {
            // Column names in first-seen order across all rows
            let mut columns: Vec<&String> = Vec::new();
            for row in results {
                for key in row.keys() {
                    if !columns.contains(&key) {
                        columns.push(key);
                    }
                }
            }

            let mut widths: HashMap<&String, usize> =
                columns.iter().map(|c| (*c, c.chars().count())).collect();
            for row in results {
                for (col, val) in row {
                    let len = val_to_string(val).chars().count();
                    if let Some(w) = widths.get_mut(col) {
                        *w = (*w).max(len);
                    }
                }
            }

            let header: Vec<String> = columns
                .iter()
                .map(|c| format!("{:width$}", c, width = widths[*c]))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[*c])).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in results {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let val = row.get(*c).map(val_to_string).unwrap_or_default();
                        format!("{:width$}", val, width = widths[*c])
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", results.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn explain_query(query: &str, config: &Config) {
    println!("{}", "sqlrest Statement Explanation".cyan().bold());
    println!();
    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!();

    match Planner::from_config(config).plan(query) {
        Ok(plan) => {
            println!("{}", "Parsed Structure:".green().bold());
            println!("  {} {}", "Route:".dimmed(), plan.route.to_string().cyan());
            println!(
                "  {} {}",
                "Kind:".dimmed(),
                plan.statement.kind().to_string().cyan()
            );
            println!("  {} {}", "Table:".dimmed(), plan.statement.table().white());

            match &plan.statement {
                Statement::Select(select) => {
                    println!("  {}", "Columns:".dimmed());
                    for col in &select.columns {
                        println!("    • {}", col.to_string().white());
                    }
                    explain_filter(select.filter.as_ref());
                    for o in &select.order_by {
                        let arrow = match o.order {
                            SortOrder::Asc => "↑",
                            SortOrder::Desc => "↓",
                        };
                        println!("  {} {} {}", "Order:".dimmed(), o.column.white(), arrow);
                    }
                    if let Some(n) = select.limit {
                        println!("  {} {}", "Limit:".dimmed(), n);
                    }
                    if let Some(n) = select.offset {
                        println!("  {} {}", "Offset:".dimmed(), n);
                    }
                }
                Statement::Insert(insert) => {
                    println!("  {} {}", "Columns:".dimmed(), insert.columns.join(", ").white());
                    for row in &insert.rows {
                        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                        println!("    ({})", values.join(", ").yellow());
                    }
                }
                Statement::Update(update) => {
                    println!("  {}", "Set:".dimmed());
                    for a in &update.assignments {
                        println!("    {} = {}", a.column.white(), a.value.to_string().yellow());
                    }
                    explain_filter(update.filter.as_ref());
                }
                Statement::Delete(delete) => explain_filter(delete.filter.as_ref()),
            }

            println!();
            println!("{}", "Table API call:".green().bold());
            println!("  {}", plan.query.to_string().white());

            let params = render_params(&plan.query);
            if !params.is_empty() {
                println!();
                println!("{}", "PostgREST parameters:".green().bold());
                for (key, value) in params {
                    println!("  {}={}", key.cyan(), value.white());
                }
            }
        }
        Err(e) => {
            eprintln!("{} {}", "Translation Error:".red().bold(), e);
        }
    }
}

fn explain_filter(filter: Option<&Predicate>) {
    if let Some(filter) = filter {
        println!("  {} {}", "Where:".dimmed(), filter.to_string().yellow());
    }
}

fn show_operators() {
    println!("{}", "sqlrest Operator Reference".cyan().bold());
    println!();

    let operators = [
        ("=", "eq", "id = 1", "id=eq.1"),
        ("!= / <>", "neq", "status <> 'done'", "status=neq.done"),
        (">", "gt", "age > 18", "age=gt.18"),
        (">=", "gte", "age >= 18", "age=gte.18"),
        ("<", "lt", "price < 10", "price=lt.10"),
        ("<=", "lte", "price <= 10", "price=lte.10"),
        ("LIKE", "like", "name LIKE 'A%'", "name=like.A%"),
        ("ILIKE", "ilike", "name ILIKE 'a%'", "name=ilike.a%"),
        ("IN", "in", "id IN (1, 2)", "id=in.(1,2)"),
        ("IS", "is", "deleted_at IS NULL", "deleted_at=is.null"),
        ("OR", "or", "a = 1 OR b = 2", "or=(a.eq.1,b.eq.2)"),
    ];

    println!(
        "{:10} {:8} {:22} {}",
        "SQL".white().bold(),
        "Filter".white().bold(),
        "Example".white().bold(),
        "PostgREST".white().bold()
    );
    println!("{}", "─".repeat(70).dimmed());

    for (sql, filter, example, param) in operators {
        println!(
            "{:10} {:8} {:22} {}",
            sql.cyan().bold(),
            filter.yellow(),
            example.white(),
            param.dimmed()
        );
    }
}
