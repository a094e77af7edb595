//! AssetLedger replay tool
//!
//! Loads an engine configuration, replays a JSON file of invocations against
//! an in-memory ledger and prints one JSON outcome per line.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};

use assetledger::storage::generate_txid;
use assetledger::{
    AssetEngine, AssetError, AssetResult, Document, EngineConfig, InMemoryLedger, InvokeOutcome, Method,
    Transaction, ValidationError,
};

/// Replay configuration
struct Config {
    /// Engine configuration file; a single `asset` class when absent
    config: Option<PathBuf>,
    /// Invocation file
    input: PathBuf,
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = None;
    let mut input = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --config requires a value");
                    std::process::exit(1);
                }
            }
            "--input" | "-i" => {
                if i + 1 < args.len() {
                    input = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --input requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("assetledger-replay - replay asset invocations against an in-memory ledger");
                println!();
                println!("USAGE:");
                println!("    assetledger-replay --input <FILE> [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -i, --input <FILE>        JSON array of {{function, method, args}} invocations");
                println!("    -c, --config <FILE>       Engine configuration [default: one 'asset' class]");
                println!("    -h, --help                Print help information");
                println!();
                println!("Log verbosity follows RUST_LOG [default: info].");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    let Some(input) = input else {
        eprintln!("error: --input is required");
        std::process::exit(1);
    };
    Config { config, input }
}

/// One recorded call.
#[derive(Debug, Deserialize)]
struct Invocation {
    function: String,
    method: Method,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

const DEFAULT_CONFIG: &str = r#"{
    "classes": [{"name": "asset", "prefix": "AST.", "assetidpath": "asset.assetID"}]
}"#;

fn load_engine(path: Option<&PathBuf>) -> AssetResult<AssetEngine> {
    let config = match path {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::from_json_str(DEFAULT_CONFIG)?,
    };
    config.build()
}

fn load_invocations(path: &PathBuf) -> Result<Vec<Invocation>, ValidationError> {
    let text = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidField {
        field: "input".to_string(),
        reason: format!("{}: {e}", path.display()),
    })?;
    serde_json::from_str(&text).map_err(|e| ValidationError::InvalidField {
        field: "input".to_string(),
        reason: e.to_string(),
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = parse_args();

    let engine = match load_engine(config.config.as_ref()) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "failed to configure engine");
            return ExitCode::from(1);
        }
    };
    let invocations = match load_invocations(&config.input) {
        Ok(invocations) => invocations,
        Err(e) => {
            error!(error = %e, "failed to read invocations");
            return ExitCode::from(1);
        }
    };

    let ledger = InMemoryLedger::new();
    info!(invocations = invocations.len(), routes = engine.router().len(), "replay started");

    for call in invocations {
        let args: Result<Vec<Document>, ValidationError> =
            call.args.into_iter().map(Document::from_json).collect();
        let outcome = match args {
            Ok(args) => {
                let txid = call.txid.unwrap_or_else(generate_txid);
                let txn = Transaction::new(&ledger, &txid, call.timestamp.unwrap_or_else(Utc::now));
                match engine.invoke(&txn, &call.function, call.method, &args) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(function = %call.function, error = %e, "ledger failure, stopping replay");
                        return ExitCode::from(2);
                    }
                }
            }
            Err(e) => InvokeOutcome::error(&AssetError::from(e)),
        };

        let mut line = outcome.to_json();
        line["function"] = serde_json::Value::String(call.function);
        println!("{line}");
    }

    ExitCode::SUCCESS
}
