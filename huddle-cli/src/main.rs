use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use huddle_core::IceServerConfig;
use huddle_core::utils::default_ice_servers;
use huddle_server::{DEFAULT_PORT, ServerConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(bin_name = "huddle")]
#[command(about = "Signaling server for peer-to-peer meetings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the WebSocket signaling server.
    Serve(ServeArgs),
}

#[derive(clap::Args)]
struct ServeArgs {
    #[arg(long, env = "HUDDLE_BIND", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    bind: SocketAddr,

    /// TURN relay handed to clients next to the public STUN servers.
    #[arg(long, env = "TURN_URL")]
    turn_url: Option<String>,

    #[arg(long, env = "TURN_USERNAME", requires = "turn_url")]
    turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL", requires = "turn_url")]
    turn_credential: Option<String>,

    /// Browser origin allowed to connect. Any origin when unset.
    #[arg(long, env = "HUDDLE_ALLOWED_ORIGIN")]
    allowed_origin: Option<String>,
}

impl ServeArgs {
    fn into_config(self) -> ServerConfig {
        let mut ice_servers = default_ice_servers();
        if let Some(url) = self.turn_url {
            ice_servers.push(IceServerConfig {
                urls: vec![url],
                username: self.turn_username,
                credential: self.turn_credential,
            });
        }
        ServerConfig {
            bind: self.bind,
            ice_servers,
            allowed_origin: self.allowed_origin,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve(args) => {
            let config = args.into_config();

            println!("{}", "📡 Starting Huddle signaling server...".green().bold());
            println!("   🔌 Bind:   ws://{}/ws", config.bind);
            println!(
                "   🧊 ICE:    {} server(s){}",
                config.ice_servers.len(),
                if config.ice_servers.iter().any(|s| s.username.is_some()) {
                    " incl. TURN"
                } else {
                    ""
                }
            );
            println!(
                "   🌐 Origin: {}",
                config.allowed_origin.as_deref().unwrap_or("any")
            );

            huddle_server::serve(config)
                .await
                .context("Signaling server stopped")?;
        }
    }

    Ok(())
}
