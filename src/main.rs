use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use http_tunnel::config::{self, validation, TunnelConfig};
use http_tunnel::net::BoundedListener;
use http_tunnel::{Shutdown, TunnelClient, TunnelServer};

#[derive(Parser)]
#[command(name = "http-tunnel")]
#[command(about = "TCP tunnel over plain HTTP upload/download flows", long_about = None)]
struct Cli {
    /// Optional TOML config file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Terminate tunnels against destination addresses
    Server {
        /// Bind address for the upload/download endpoints
        #[arg(short, long)]
        listen: Option<String>,

        /// Shared secret clients must present
        #[arg(short, long)]
        secret: Option<String>,
    },
    /// Expose a local TCP listener feeding a remote tunnel server
    Client {
        /// Local bind address
        #[arg(short, long)]
        listen: Option<String>,

        /// Upload endpoint URL
        #[arg(long)]
        upload_url: Option<String>,

        /// Download endpoint URL
        #[arg(long)]
        download_url: Option<String>,

        /// Destination address the server should dial (host:port)
        #[arg(long)]
        to: Option<String>,

        /// Shared secret
        #[arg(short, long)]
        secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => TunnelConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("http_tunnel={}", config.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-tunnel starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => http_tunnel::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    match cli.command {
        Commands::Server { listen, secret } => {
            if let Some(listen) = listen {
                config.server.bind_address = listen;
            }
            if let Some(secret) = secret {
                config.server.secret = secret;
            }
            check(validation::validate_server(&config))?;

            let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
            let server = TunnelServer::new(&config);
            server.run(listener, shutdown.subscribe()).await?;
        }
        Commands::Client {
            listen,
            upload_url,
            download_url,
            to,
            secret,
        } => {
            if let Some(listen) = listen {
                config.client.bind_address = listen;
            }
            if let Some(upload_url) = upload_url {
                config.client.upload_url = upload_url;
            }
            if let Some(download_url) = download_url {
                config.client.download_url = download_url;
            }
            if let Some(to) = to {
                config.client.target_address = to;
            }
            if let Some(secret) = secret {
                config.client.secret = secret;
            }
            check(validation::validate_client(&config))?;

            let listener =
                BoundedListener::bind(&config.client.bind_address, config.client.max_connections)
                    .await?;
            let client = TunnelClient::new(&config);
            client.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn check(result: Result<(), Vec<validation::ValidationError>>) -> Result<(), Box<dyn Error>> {
    result.map_err(|errors| {
        for error in &errors {
            tracing::error!(field = error.field, message = %error.message, "Invalid configuration");
        }
        format!("configuration invalid ({} problems)", errors.len()).into()
    })
}
