use clap::{Parser, Subcommand};
use esim_sync::config::Config;
use esim_sync::fetcher::CatalogClient;
use esim_sync::orchestrator::SyncOrchestrator;
use esim_sync::store::{InMemoryPlanStore, PlanStore};
use esim_sync::types::SyncTarget;
use esim_sync::{logging, metrics, server};
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(name = "esim_sync")]
#[command(about = "eSIM catalog synchronization and categorization service")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one catalog sync pass and print the summary
    Sync {
        /// Which catalog slice to sync: packages or topups
        #[arg(long, default_value = "packages")]
        target: String,
    },
    /// Serve the HTTP trigger surface
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default();

    let store: Arc<dyn PlanStore> = Arc::new(InMemoryPlanStore::new());
    let client = CatalogClient::new(&config.upstream);
    client.connect()?;
    let orchestrator = SyncOrchestrator::new(Box::new(client), store);

    match cli.command {
        Commands::Sync { target } => {
            let Some(target) = SyncTarget::parse(&target) else {
                eprintln!("⚠️  Unknown target: {target} (expected packages or topups)");
                std::process::exit(2);
            };

            println!("🔄 Running {target} sync...");
            let summary = orchestrator.run_sync(target).await;

            println!("\n📊 Sync results for {target}:");
            println!("   Status: {}", summary.status.as_str());
            println!("   Total synced: {}", summary.total_synced);
            println!("   Global: {}", summary.global_count);
            println!("   Regional: {}", summary.regional_count);
            println!("   Other: {}", summary.other_count);
            println!("   Topups: {}", summary.topup_count);
            println!("   Skipped: {}", summary.skipped_count);

            if let Some(err) = &summary.error {
                error!("Sync pass reported an error: {}", err);
                println!("⚠️  Error: {err}");
            }
            if !summary.success {
                std::process::exit(1);
            }
        }
        Commands::Serve { port } => {
            metrics::init_metrics();
            server::start_server(Arc::new(orchestrator), port).await?;
        }
    }

    Ok(())
}
