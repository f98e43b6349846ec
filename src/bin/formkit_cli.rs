//! FormKit CLI - Bridge interface for host applications
//!
//! Commands: schema, check, validate
//! Outputs JSON to stdout
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use formkit_core::{EngineError, FormEngine, MessageCatalog, Schema};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "formkit-cli")]
#[command(about = "FormKit CLI - Client-Side Form Validation Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the form schema JSON file
    #[arg(short, long, default_value = "schema.json")]
    schema: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized schema
    Schema,

    /// Structural check only: does the schema build?
    Check,

    /// Apply a value payload and report validity
    Validate {
        /// JSON payload: nested object mirroring the field tree
        #[arg(short, long)]
        payload: String,

        /// Include display feedback strings per invalid field path
        #[arg(short, long)]
        feedback: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let schema = match Schema::load_from_file(&cli.schema) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load schema: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&schema).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Check => match FormEngine::from_schema(&schema) {
            Ok(_) => {
                println!(r#"{{"ok": true}}"#);
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!(
                    "{}",
                    serde_json::json!({"ok": false, "error": e.to_string()})
                );
                ExitCode::FAILURE
            }
        },

        Commands::Validate { payload, feedback } => {
            let values: Value = match serde_json::from_str(&payload) {
                Ok(v) => v,
                Err(e) => {
                    println!(r#"{{"valid": false, "error": "Invalid payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            let mut engine = match FormEngine::from_schema(&schema) {
                Ok(e) => e,
                Err(e) => {
                    println!(
                        "{}",
                        serde_json::json!({"valid": false, "error": e.to_string()})
                    );
                    return ExitCode::FAILURE;
                }
            };

            let mut applied = Vec::new();
            if let Err(e) = apply_values(&mut engine, "", &values, &mut applied) {
                println!(
                    "{}",
                    serde_json::json!({"valid": false, "error": e.to_string()})
                );
                return ExitCode::FAILURE;
            }

            let valid = engine.is_valid("").unwrap_or(false);
            let mut output = serde_json::json!({
                "valid": valid,
                "values": engine.value_tree(),
                "errors": engine.errors_tree("").unwrap_or(Value::Null),
            });

            if feedback {
                let catalog = MessageCatalog::with_defaults();
                let mut messages = serde_json::Map::new();
                for path in &applied {
                    if let Ok(text) = catalog.feedback_for(&engine, path) {
                        if !text.is_empty() {
                            messages.insert(path.clone(), Value::String(text));
                        }
                    }
                }
                output["feedback"] = Value::Object(messages);
            }

            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            if valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2) // Validation failure
            }
        }
    }
}

/// Walk the payload, treating JSON objects as groups and everything else
/// as field values. Applied field paths are collected for feedback.
fn apply_values(
    engine: &mut FormEngine,
    prefix: &str,
    value: &Value,
    applied: &mut Vec<String>,
) -> Result<(), EngineError> {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                apply_values(engine, &path, child, applied)?;
            }
            Ok(())
        }
        _ => {
            engine.set_value(prefix, value.clone())?;
            applied.push(prefix.to_string());
            Ok(())
        }
    }
}
