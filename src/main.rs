use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tymout_gateway::{Gateway, GatewayConfig, ServiceDomain};

/// Tymout API Gateway — prefix-routed reverse proxy for the platform services
#[derive(Parser)]
#[command(name = "tymout-gateway", version, about)]
struct Cli {
    /// Override the listen port (takes precedence over PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved route table and exit
    Routes,
}

#[tokio::main]
async fn main() -> tymout_gateway::Result<()> {
    // Load .env before resolving configuration, like every other service
    // in the platform.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = GatewayConfig::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }

    if matches!(cli.command, Some(Commands::Routes)) {
        print_routes(&config);
        return Ok(());
    }

    tracing::info!("Tymout API Gateway v{}", env!("CARGO_PKG_VERSION"));

    let gateway = Gateway::new(config);
    gateway.start().await?;

    tracing::info!("Gateway ready — press Ctrl+C to stop");
    gateway.wait_for_shutdown().await;

    Ok(())
}

/// Print the resolved service registry, in mount order
fn print_routes(config: &GatewayConfig) {
    println!("Environment: {}", config.environment);
    println!("Frontend:    {}", config.frontend_url);
    println!();
    println!("  Routes (first match wins):");
    for domain in ServiceDomain::ALL {
        println!(
            "    {:<22} → {}",
            domain.route_prefix(),
            config.service_url(domain)
        );
    }
    println!("    {:<22} → gateway (configuration snapshot)", "/health");
}
