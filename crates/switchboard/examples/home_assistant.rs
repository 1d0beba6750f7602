//! Home assistant example: typed local tools plus an optional protocol server.
//!
//! Demonstrates:
//! - Typed argument structs with `Deserialize` + `JsonSchema`
//! - Conditional tool registration with `with_if`
//! - Streaming the answer through an `FnEventHandler`
//! - Observing tool notifications on a channel
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run --example home_assistant
//! HOME_MCP_URL=http://localhost:8123/mcp OPENROUTER_KEY=sk-... cargo run --example home_assistant
//! ```

use schemars::JsonSchema;
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;
use switchboard::prelude::*;
use switchboard::sources::ProtocolSource;

// ── Typed argument structs ──────────────────────────────────────────

/// Arguments for the `set_thermostat` tool.
#[derive(Deserialize, JsonSchema)]
struct ThermostatArgs {
    /// Target temperature in degrees Celsius.
    celsius: f32,
    /// Room name, e.g. "living room".
    #[serde(default)]
    room: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct NoArgs {}

// ── Tool constructors ───────────────────────────────────────────────

fn thermostat_tool() -> FnTool {
    FnTool::new(
        ToolDef::new(
            "set_thermostat",
            "Set the target temperature of a room.",
            json_schema_for::<ThermostatArgs>(),
        ),
        |args: ThermostatArgs| async move {
            if !(5.0..=30.0).contains(&args.celsius) {
                return Err(format!("{} °C is outside the allowed range 5-30", args.celsius));
            }
            Ok(serde_json::json!({
                "room": args.room.unwrap_or_else(|| "living room".into()),
                "target_celsius": args.celsius,
            }))
        },
    )
}

fn holiday_mode_tool() -> FnTool {
    FnTool::new(
        ToolDef::new(
            "holiday_mode",
            "Switch the house to holiday mode.",
            json_schema_for::<NoArgs>(),
        ),
        |_: NoArgs| async move { Ok(serde_json::json!({"holiday_mode": true})) },
    )
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter("switchboard=debug")
        .with_writer(std::io::stderr)
        .init();

    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable not set".to_string())?;
    let client = InferenceClient::new(api_key)?;

    let local = LocalSource::new()
        .with_arg_validation(true)
        .with(thermostat_tool())
        .with_if(std::env::var("HOLIDAYS").is_ok(), holiday_mode_tool());
    let mut sources = SourceSet::new(local);
    if let Ok(url) = std::env::var("HOME_MCP_URL") {
        sources = sources.with_protocol(ProtocolSource::new("home", url));
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ToolNotification>();
    tokio::spawn(async move {
        while let Some(note) = rx.recv().await {
            eprintln!("[working on: {}]", note.tool_names.join(", "));
        }
    });

    let orchestrator = Orchestrator::new(
        Arc::new(client),
        Arc::new(sources),
        OrchestratorConfig::new("You control a smart home. Answer in one or two sentences."),
    )
    .with_notifier(tx);
    let mut session = orchestrator.session("example");

    let speaker = FnEventHandler::new(|event: &TurnEvent<'_>| {
        if let TurnEvent::TextDelta(text) = event {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
    });
    let logger = LoggingHandler;
    let handler = CompositeEventHandler::new().with(speaker).with(logger);

    for utterance in [
        "Make the living room 21 degrees.",
        "What temperature did I just set?",
    ] {
        println!("> {utterance}");
        orchestrator
            .turn(&mut session)
            .with_event_handler(&handler)
            .run(utterance)
            .await;
        println!();
    }
    Ok(())
}
