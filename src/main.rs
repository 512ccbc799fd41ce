use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use pgrag::db::Database;
use pgrag::{AppConfig, AppState, JobReport};

/// Ask questions of a PostgreSQL database in plain language
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Turn a question into a validated read-only query
    Ask {
        question: String,
        /// Also run the query and print the rows
        #[arg(long)]
        execute: bool,
    },
    /// Refresh the table index from the live schema
    SyncSchema,
    /// Refresh the query-intent index from pg_stat_statements
    SyncQueries,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let state = AppState::new(config)?;

    match cli.command {
        Command::Ask { question, execute } => {
            let answer = match state.pipeline().ask(&question).await {
                Ok(answer) => answer,
                Err(err) => {
                    eprintln!("Error: {err}");
                    return Ok(ExitCode::FAILURE);
                }
            };
            println!("{}", answer.sql);

            if execute {
                let rows = state.db.read_rows(&answer.sql).await?;
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::SyncSchema => print_report(state.schema_sync().run().await),
        Command::SyncQueries => print_report(state.query_log_sync().run().await),
    }
}

fn print_report(report: JobReport) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
