//! mermaid-editor - serve a live, shared diagram document.

use anyhow::{Context, Result};
use clap::Parser;
use mermaid_editor::instance::{self, Claim, InstanceLock};
use mermaid_editor::{
    default_state_dir, DocumentStore, EditorConfig, Gateway, GatewayConfig, StoreConfig,
};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mermaid-editor", version, about = "Live diagram editor backend")]
struct Cli {
    /// Diagram file to open (or push to an already running editor)
    file: Option<PathBuf>,

    /// Port to listen on (0 picks a free one)
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Directory for the instance lock, port file and preferences
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Seconds between keep-alive frames on idle change streams
    #[arg(long, default_value_t = 15)]
    keepalive_secs: u64,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn config(&self, initial_content: String) -> EditorConfig {
        EditorConfig {
            store: StoreConfig {
                initial_content,
                ..Default::default()
            },
            gateway: GatewayConfig {
                addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port),
                keepalive_interval: Duration::from_secs(self.keepalive_secs.max(1)),
                state_dir: self.state_dir.clone().unwrap_or_else(default_state_dir),
            },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let initial = match &cli.file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?,
        None => String::new(),
    };
    let config = cli.config(initial);

    match instance::claim(config.state_dir())? {
        Claim::Running { url } => {
            println!("Already running at {url}");
            if !config.store.initial_content.is_empty() {
                instance::push_document(&url, &config.store.initial_content)?;
            }
            Ok(())
        }
        Claim::Owned(lock) => serve(config, lock),
    }
}

fn serve(config: EditorConfig, lock: InstanceLock) -> Result<()> {
    let store = Arc::new(DocumentStore::with_config(config.store));
    let gateway = Gateway::bind(store, config.gateway)?;
    lock.publish(gateway.addr())?;

    let shutdown = gateway.shutdown_handle();
    ctrlc::set_handler(move || shutdown.trigger())
        .context("failed to set Ctrl+C handler")?;

    println!("MermAId Editor running at {}", gateway.url());
    gateway.run();

    drop(lock);
    info!("stopped");
    println!("Stopped.");
    Ok(())
}

fn init_logging(debug: bool) {
    let default = if debug {
        "mermaid_editor=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
