//! Command-line front end for the switchboard orchestrator.
//!
//! Reads the API key from the environment variable named by
//! `inference.api_key_env` (default `OPENROUTER_KEY`).
//!
//! # Examples
//!
//! ```sh
//! # Interactive chat; answers stream to stdout, logs go to stderr
//! switchboard --config switchboard.json chat
//!
//! # Print the discovered tool catalog
//! switchboard --config switchboard.json tools
//!
//! # Verbose logging
//! RUST_LOG=switchboard=debug switchboard chat
//! ```
//!
//! Inside `chat`, `/reload` forces tool rediscovery, `/clear-cache` empties
//! the tool data cache, `/quit` exits. Ctrl-C stops the current answer.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use switchboard::agent::{FnEventHandler, Orchestrator, ToolNotification, TurnEvent};
use switchboard::config::SwitchboardConfig;
use switchboard::tools::{FnTool, LocalSource};
use switchboard::{ToolDef, json_schema_for};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Tool-invocation orchestrator for conversational agents.
#[derive(Parser)]
#[command(name = "switchboard")]
struct Cli {
    /// JSON config file. Defaults apply when omitted.
    #[arg(long, short)]
    config: Option<String>,

    /// Session id used for logs and tool notifications
    #[arg(long, default_value = "cli")]
    session: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Line-oriented chat REPL
    Chat,
    /// Discover tools from every configured source and print them as JSON
    Tools,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct ClockArgs {
    /// IANA-style label echoed back, e.g. "UTC"
    #[serde(default)]
    zone: Option<String>,
}

/// Built-in local tools available in every CLI session.
fn builtin_tools() -> LocalSource {
    LocalSource::new().with(FnTool::new(
        ToolDef::new(
            "current_time",
            "Get the current date and time in UTC.",
            json_schema_for::<ClockArgs>(),
        ),
        |args: ClockArgs| async move {
            Ok(serde_json::json!({
                "utc": chrono::Utc::now().to_rfc3339(),
                "zone": args.zone.unwrap_or_else(|| "UTC".into()),
            }))
        },
    ))
}

fn load_config(cli: &Cli) -> Result<SwitchboardConfig, String> {
    match cli.config {
        Some(ref path) => SwitchboardConfig::load(path),
        None => {
            let mut config = SwitchboardConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            Ok(config)
        }
    }
}

async fn print_tools(cli: &Cli, config: SwitchboardConfig) -> Result<(), String> {
    let sources = Arc::new(config.build_sources(builtin_tools())?);
    let aggregator = switchboard::agent::DiscoveryAggregator::new(sources);
    let catalog = aggregator.build().await;
    let json = serde_json::to_string_pretty(&catalog)
        .map_err(|e| format!("failed to serialize catalog: {e}"))?;
    println!("{json}");
    eprintln!("  [{}] {} tool(s)", cli.session, catalog.len());
    Ok(())
}

async fn chat(cli: &Cli, config: SwitchboardConfig) -> Result<(), String> {
    let client = config.build_client()?;
    let sources = Arc::new(config.build_sources(builtin_tools())?);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ToolNotification>();
    tokio::spawn(async move {
        while let Some(note) = rx.recv().await {
            eprintln!("  [tools] {}", note.tool_names.join(", "));
        }
    });

    let orchestrator =
        Orchestrator::new(Arc::new(client), sources, config.orchestrator).with_notifier(tx);
    let mut session = orchestrator.session(&cli.session);
    let handle = session.handle();

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c = Arc::clone(&stop);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.store(true, Ordering::SeqCst);
        }
    });

    let printer = FnEventHandler::new(|event: &TurnEvent<'_>| match event {
        TurnEvent::TextDelta(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::ToolResult { name, result, .. } if result.is_error() => {
            eprintln!("  [{name}] {}", result.error_message().unwrap_or_default());
        }
        TurnEvent::Cancelled => eprintln!("  [stopped]"),
        _ => {}
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| format!("failed to read stdin: {e}"))?
        else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reload" => {
                handle.reload_catalog();
                continue;
            }
            "/clear-cache" => {
                handle.clear_tool_data();
                continue;
            }
            _ => {}
        }

        stop.store(false, Ordering::SeqCst);
        orchestrator
            .turn(&mut session)
            .with_event_handler(&printer)
            .with_stop_signal(|| stop.load(Ordering::SeqCst))
            .run(line)
            .await;
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("switchboard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match load_config(&cli) {
        Ok(config) => match cli.command {
            Command::Chat => chat(&cli, config).await,
            Command::Tools => print_tools(&cli, config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
