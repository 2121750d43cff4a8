// crates/hypha-daemon/src/main.rs
//
// Binary entrypoint for the Hypha daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, builds
// the incentive engine, then runs the JSON-RPC server, the trigger
// scheduler, and the event log until ctrl-c.

mod config;
mod events;
mod scheduler;

use clap::{Parser, Subcommand};
use config::DaemonConfig;
use scheduler::TriggerScheduler;

use hypha_core::crypto::Keypair;
use hypha_rpc::{system_clock, unix_now, EngineHandle, HyphaRpcServer};

/// Hypha daemon: node registry, reward distribution, and slashing for a CDN.
#[derive(Parser, Debug)]
#[command(name = "hypha-daemon", version = "0.1.0", about = "Hypha CDN incentive daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.hypha/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an oracle signing keypair and print it as hex.
    OracleKeygen {
        /// Re-derive the public key from an existing hex secret instead.
        #[arg(long)]
        secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    if let Some(Command::OracleKeygen { secret }) = &args.command {
        let keypair = oracle_keypair(secret.as_deref())?;
        println!("oracle_secret_key = \"{}\"", keypair.secret_hex());
        println!("oracle_public_key = \"{}\"", keypair.public_key_hex());
        return Ok(());
    }

    let config_path = expand_tilde(&args.config);
    let load_result = DaemonConfig::load(&config_path);
    let daemon_config = match &load_result {
        Ok(cfg) => cfg.clone(),
        Err(_) => DaemonConfig::default(),
    };

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    match load_result {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    tracing::info!("Hypha Daemon v0.1.0");
    tracing::info!(
        "RPC endpoint: {}:{}",
        daemon_config.rpc_host,
        daemon_config.rpc_port
    );
    tracing::info!(
        "Epoch duration: {}s, trigger interval: {}s",
        daemon_config.economics.epoch_duration_secs,
        daemon_config.trigger_interval_secs
    );

    let engine = daemon_config.build_engine(unix_now())?;
    tracing::info!(
        "Engine ready (admin={}, reviewers={}, rewards pool={})",
        engine.admin(),
        engine.arbiter().reviewers().len(),
        engine.treasury().rewards_pool()
    );

    let handle = EngineHandle::new(engine, daemon_config.event_capacity);

    let event_rx = handle.subscribe();
    tokio::spawn(async move {
        let logged = events::run_event_log(event_rx).await;
        tracing::debug!("Event log stopped after {} events", logged);
    });

    let scheduler = TriggerScheduler::new(
        handle.clone(),
        daemon_config.trigger_interval_secs,
        system_clock(),
    );
    tokio::spawn(async move {
        if let Err(e) = scheduler.run().await {
            tracing::error!("Trigger scheduler error: {}", e);
        }
    });

    let rpc_server = HyphaRpcServer::new(daemon_config.rpc(), handle.clone());
    tokio::spawn(async move {
        if let Err(e) = rpc_server.start().await {
            tracing::error!("RPC server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Hypha daemon shut down gracefully");

    Ok(())
}

fn oracle_keypair(secret: Option<&str>) -> Result<Keypair, hypha_core::HyphaError> {
    match secret {
        Some(hex) => Keypair::from_secret_hex(hex),
        None => Ok(Keypair::generate()),
    }
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/etc/hypha.toml"), "/etc/hypha.toml");
    }

    #[test]
    fn test_expand_tilde_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_tilde("~/.hypha/config.toml"),
                format!("{}/.hypha/config.toml", home.display())
            );
        }
    }

    #[test]
    fn test_args_parse_keygen() {
        let args = Args::parse_from(["hypha-daemon", "oracle-keygen"]);
        assert!(matches!(
            args.command,
            Some(Command::OracleKeygen { secret: None })
        ));
        assert_eq!(args.config, "~/.hypha/config.toml");
    }

    #[test]
    fn test_keygen_rederives_public_key_from_secret() {
        let original = Keypair::generate();
        let args = Args::parse_from([
            "hypha-daemon",
            "oracle-keygen",
            "--secret",
            &original.secret_hex(),
        ]);
        let Some(Command::OracleKeygen { secret }) = args.command else {
            panic!("expected oracle-keygen");
        };
        let restored = oracle_keypair(secret.as_deref()).unwrap();
        assert_eq!(restored.public_key_hex(), original.public_key_hex());

        assert!(oracle_keypair(Some("not-hex")).is_err());
    }
}
