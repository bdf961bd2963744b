//! cutshot: shot allocation and dispatch for cut circuits.

use std::path::PathBuf;

use cutshot_backend::{BackendAdapter, BackendRegistry, BitOrder, FixedCountsBackend};
use cutshot_core::{BackendId, Distribution};
use tracing_subscriber::EnvFilter;

mod check;
mod commands;

/// Registry serving every `replay/<name>` backend from `fallback`.
pub(crate) fn replay_backends(fallback: Option<Distribution>) -> BackendRegistry {
    let registry = BackendRegistry::new();
    registry.register_provider("replay", move |_: &BackendId| {
        let mut backend = FixedCountsBackend::new(BitOrder::BigEndian);
        if let Some(dist) = &fallback {
            backend = backend.with_fallback(dist.clone());
        }
        Ok(Box::new(backend) as Box<dyn BackendAdapter>)
    });
    registry
}

pub(crate) fn default_backends() -> BackendRegistry {
    replay_backends(None)
}

fn print_help() {
    println!("cutshot: shot allocation and dispatch for cut circuits");
    println!();
    println!("Usage: cutshot <command>");
    println!();
    println!("Commands:");
    println!("  validate <config>                          Check a pipeline config");
    println!("  plan <config> <fragments>                  Print the dispatch plan for a fragment file");
    println!("  run <config> <circuit> <observable> <dist> Run against replay backends");
    println!("  help                                       Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--validate" | "validate" => {
            if args.len() < 3 {
                eprintln!("Usage: cutshot validate <config.json>");
                std::process::exit(1);
            }
            let report = check::validate(&PathBuf::from(&args[2]), &default_backends());
            check::print_report(&report);
            std::process::exit(if report.config_valid { 0 } else { 1 });
        }
        "plan" => {
            if args.len() < 4 {
                eprintln!("Usage: cutshot plan <config.json> <fragments.json>");
                std::process::exit(1);
            }
            let out = commands::plan(&PathBuf::from(&args[2]), &PathBuf::from(&args[3]))?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        "run" => {
            if args.len() < 6 {
                eprintln!("Usage: cutshot run <config.json> <circuit.qasm> <observable> <distribution.json>");
                std::process::exit(1);
            }
            let out = commands::run(
                &PathBuf::from(&args[2]),
                &PathBuf::from(&args[3]),
                &args[4],
                &PathBuf::from(&args[5]),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        "--help" | "-h" | "help" => print_help(),
        other => {
            eprintln!("Unknown command: {}. Use 'cutshot help' for usage.", other);
            std::process::exit(1);
        }
    }

    Ok(())
}
