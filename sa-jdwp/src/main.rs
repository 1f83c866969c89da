// sa-jdwp - debug a frozen JVM snapshot over JDWP
//
// Loads a snapshot dump, waits for one debugger on the configured address
// and serves it until the debugger disposes or disconnects.

use anyhow::{Context, Result};
use clap::Parser;
use jdwp_server::provider::dump::DumpSnapshotProvider;
use jdwp_server::{Listener, ServerConfig, SnapshotProvider, TargetLocator};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Snapshot dump file (JSON)
    snapshot: PathBuf,

    /// Port to listen on; keeps the configured host
    port: Option<u16>,

    /// Server configuration file
    #[arg(long, env = "SA_JDWP_CONFIG")]
    config: Option<PathBuf>,

    /// Generation tag overriding detection (jdk6, jdk8, jdk10, jdk13)
    #[arg(long)]
    jvm_version: Option<String>,
}

impl Args {
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(tag) = &self.jvm_version {
            config.jvm_version = Some(tag.clone());
            config.validate().context("invalid --jvm-version")?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sa_jdwp=info".parse()?)
                .add_directive("jdwp_server=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.server_config()?;

    let snapshot = DumpSnapshotProvider
        .attach(&TargetLocator::SnapshotFile(args.snapshot.clone()))
        .with_context(|| format!("failed to attach to {}", args.snapshot.display()))?;

    let listener = Listener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to listen on {}", config.listen))?;

    tokio::select! {
        result = listener.serve_one(snapshot, &config) => {
            let reason = result.context("debug session failed")?;
            info!("Done: {}", reason);
        }
        _ = tokio::signal::ctrl_c() => {
            error!("Interrupted before the session closed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_port() {
        let args = Args::try_parse_from(["sa-jdwp", "heap.json", "9000", "--config", "/nonexistent"]).unwrap();
        assert_eq!(args.snapshot, PathBuf::from("heap.json"));
        assert_eq!(args.port, Some(9000));
        assert!(args.server_config().is_err());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from(["sa-jdwp", "heap.json", "--jvm-version", "jdk8"]).unwrap();
        let args = Args { config: None, ..args };
        let config = args.server_config().unwrap();
        assert_eq!(config.jvm_version.as_deref(), Some("jdk8"));
        assert_eq!(config.listen, jdwp_server::config::DEFAULT_LISTEN);

        let bad = Args::try_parse_from(["sa-jdwp", "heap.json", "--jvm-version", "jdk21"]).unwrap();
        let bad = Args { config: None, ..bad };
        assert!(bad.server_config().is_err());
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Args::try_parse_from(["sa-jdwp"]).is_err());
        assert!(Args::try_parse_from(["sa-jdwp", "heap.json", "port"]).is_err());
        assert!(Args::try_parse_from(["sa-jdwp", "heap.json", "1", "2"]).is_err());
    }
}
