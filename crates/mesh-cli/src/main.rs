//! Command-line demo node for the mesh transport core.
//!
//! Wires a [`mesh_core::MeshService`] to an in-process [`MockLink`] so the
//! protocol stack can be exercised without real BLE hardware.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mesh_core::device::{device_fingerprint, DeviceIdentifiers};
use mesh_core::identity::Identity;
use mesh_core::link::MockLink;
use mesh_core::{MeshConfig, MeshEvent, MeshService};
use mesh_crypto::noise::NoiseKeypair;

/// Demo node for the mesh chat transport.
#[derive(Parser)]
#[command(name = "mesh-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path.
    #[arg(short, long, default_value = "mesh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new identity keyfile and print its fingerprint.
    Keygen {
        /// Output path for the encrypted keyfile.
        #[arg(short, long, default_value = "identity.keyfile")]
        output: PathBuf,
    },
    /// Run a node that announces itself and echoes any events it observes.
    Run {
        /// Nickname to advertise.
        #[arg(short, long, default_value = "anonymous")]
        nickname: String,
        /// Broadcast a public message on startup, then keep running.
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = MeshConfig::load(&cli.config).unwrap_or_default();

    match cli.command {
        Commands::Keygen { output } => keygen(&output),
        Commands::Run { nickname, message } => run(config, nickname, message).await,
    }
}

/// Best-effort device identifiers for this host, gathered from environment
/// variables a real mobile OS would expose directly. Missing fields are left
/// empty rather than guessed at.
fn local_device_identifiers() -> DeviceIdentifiers {
    DeviceIdentifiers {
        device_id: std::env::var("HOSTNAME").unwrap_or_default(),
        hardware_model: std::env::consts::ARCH.to_string(),
        hardware_brand: std::env::consts::FAMILY.to_string(),
        hardware_board: std::env::consts::OS.to_string(),
        os_build: String::new(),
        display_geometry: String::new(),
    }
}

fn keygen(output: &PathBuf) -> anyhow::Result<()> {
    let identity = Identity::generate();
    let device_key = [0u8; 32];
    let keyfile = identity.to_keyfile(&device_key)?;
    std::fs::write(output, keyfile.to_bytes())?;
    println!("fingerprint: {}", hex::encode(identity.fingerprint()));
    println!("wrote keyfile to {}", output.display());
    Ok(())
}

async fn run(config: MeshConfig, nickname: String, message: Option<String>) -> anyhow::Result<()> {
    let identity = Identity::generate();
    let noise_keypair = NoiseKeypair::generate()?;
    let device_fp = device_fingerprint(&local_device_identifiers());
    let link = Arc::new(MockLink::new());
    let service = MeshService::new(identity, noise_keypair, device_fp, config, link);

    service.set_nickname(nickname);

    let mut events = service.observe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                MeshEvent::PeerJoined { nickname, .. } => {
                    tracing::info!("peer joined: {}", nickname.unwrap_or_default());
                }
                MeshEvent::PeerLeft { peer_id } => {
                    tracing::info!("peer left: {}", hex::encode(peer_id));
                }
                MeshEvent::MessageReceived { from, content } => {
                    tracing::info!("{}: {}", hex::encode(from), content);
                }
                MeshEvent::SenderMuted { device_fingerprint, remaining } => {
                    tracing::warn!("muted {} for {:?}", hex::encode(device_fingerprint), remaining);
                }
            }
        }
    });

    service.start()?;
    service.send_broadcast_announce()?;
    if let Some(message) = message {
        service.send_public(&message)?;
    }

    tracing::info!("node running with peer id {}", hex::encode(service.my_peer_id()));
    tokio::signal::ctrl_c().await?;
    service.stop();
    Ok(())
}
