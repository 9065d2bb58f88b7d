use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Usage: `ignis <config.json> [admin_addr]`. `admin_addr` defaults to
/// `127.0.0.1:2019`, matching the admin-port convention the config format
/// is modeled on.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(build_env_filter()).init();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        eprintln!("usage: ignis <config.json> [admin_addr]");
        return ExitCode::FAILURE;
    };
    let admin_addr: SocketAddr = args.next().unwrap_or_else(|| "127.0.0.1:2019".to_string()).parse().unwrap_or_else(|err| {
        eprintln!("invalid admin address: {err}");
        std::process::exit(1);
    });

    let raw = match std::fs::read(&config_path) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("reading {config_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let config: serde_json::Value = match serde_json::from_slice(&raw) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("parsing {config_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let engine = ignis::Engine::new();
    if let Err(err) = engine.bootstrap(config, false) {
        eprintln!("bootstrap failed: {err}");
        return ExitCode::FAILURE;
    }

    if let Err(err) = engine.serve_admin(admin_addr).await {
        eprintln!("admin server failed: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
