//! Tollgate - validate shell commands and run bounded-output tools

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tollgate::config::{Config, STORAGE_DIR_ENV};
use tollgate::tools::{ToolCall, ToolContext, ToolOutcome, ToolRegistry};

#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "Tollgate - command-safety validation and bounded-output tool execution")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config dir's tollgate.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for output artifacts
    #[arg(long, env = STORAGE_DIR_ENV, global = true)]
    storage_dir: Option<PathBuf>,

    /// Working directory for tools
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,

    /// Print the full outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a command without running it
    Validate {
        #[arg(value_name = "COMMAND")]
        command: String,
    },
    #[command(flatten)]
    Tool(ToolCommand),
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// Validate a command and, if allowed, run it
    Run {
        #[arg(value_name = "COMMAND")]
        command: String,
    },
    /// Find files by name pattern
    Find {
        pattern: String,
        #[arg(default_value = ".")]
        path: String,
        #[arg(long)]
        max_depth: Option<i64>,
        /// `file` or `directory`
        #[arg(long = "type")]
        file_type: Option<String>,
        #[arg(short = 'i', long)]
        ignore_case: bool,
    },
    /// Search file contents with ripgrep
    Search {
        pattern: String,
        #[arg(default_value = ".")]
        path: String,
        #[arg(short = 'g', long)]
        glob: Option<String>,
        #[arg(short = 'i', long)]
        ignore_case: bool,
        #[arg(short = 'F', long)]
        fixed_strings: bool,
        #[arg(long = "context")]
        context_lines: Option<i64>,
        #[arg(short = 'l', long)]
        files_with_matches: bool,
    },
    /// List a directory
    Ls {
        #[arg(default_value = ".")]
        path: String,
        #[arg(short = 'a', long)]
        all: bool,
        #[arg(short = 'l', long)]
        long: bool,
        /// name, size or modified
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        tree: bool,
        #[arg(long)]
        max_depth: Option<i64>,
    },
    /// Query a JSON file with jq
    Query {
        filter: String,
        file: String,
        #[arg(short = 'r', long)]
        raw_output: bool,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    // Logs go to stderr so summaries on stdout stay clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_env_overrides();
    if let Some(dir) = &args.storage_dir {
        config.storage_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.directory {
        config.working_dir = Some(dir.clone());
    }
    Ok(config)
}

fn to_call(command: ToolCommand) -> ToolCall {
    match command {
        ToolCommand::Run { command } => ToolCall::new("run_command", json!({ "command": command })),
        ToolCommand::Find {
            pattern,
            path,
            max_depth,
            file_type,
            ignore_case,
        } => ToolCall::new(
            "find_files",
            json!({
                "pattern": pattern,
                "path": path,
                "max_depth": max_depth,
                "file_type": file_type,
                "case_insensitive": ignore_case,
            }),
        ),
        ToolCommand::Search {
            pattern,
            path,
            glob,
            ignore_case,
            fixed_strings,
            context_lines,
            files_with_matches,
        } => ToolCall::new(
            "search",
            json!({
                "pattern": pattern,
                "path": path,
                "glob": glob,
                "case_insensitive": ignore_case,
                "fixed_strings": fixed_strings,
                "context_lines": context_lines,
                "files_with_matches": files_with_matches,
            }),
        ),
        ToolCommand::Ls {
            path,
            all,
            long,
            sort,
            tree,
            max_depth,
        } => ToolCall::new(
            "list_directory",
            json!({
                "path": path,
                "all": all,
                "long": long,
                "sort": sort,
                "tree": tree,
                "max_depth": max_depth,
            }),
        ),
        ToolCommand::Query {
            filter,
            file,
            raw_output,
        } => ToolCall::new(
            "query",
            json!({ "filter": filter, "file": file, "raw_output": raw_output }),
        ),
    }
}

fn print_outcome(outcome: &ToolOutcome, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", outcome.llm_summary);
        eprintln!("{}", outcome.display_summary);
    }
    Ok(())
}

fn validate_command(command: &str, as_json: bool) -> Result<ExitCode> {
    let verdict = tollgate::validate(command);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if let Some(reason) = verdict.denial_reason() {
        println!("denied: {reason}");
    } else {
        println!("allowed");
        for warning in verdict.warnings() {
            println!("  {warning}");
        }
    }
    Ok(if verdict.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.debug);

    let config = load_config(&args)?;
    let call = match args.command {
        Command::Validate { command } => return validate_command(&command, args.json),
        Command::Tool(tool) => to_call(tool),
    };
    let registry = ToolRegistry::new(ToolContext::from_config(&config));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = registry.invoke(call, cancel).await;
    print_outcome(&outcome, args.json)?;

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
