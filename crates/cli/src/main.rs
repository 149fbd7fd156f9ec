use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloud::InMemoryResourceManager;
use colored::Colorize;
use orchestrator::{DeletionPlan, StepsDefinitionProvider};
use server::config::{ServiceConfig, DEFAULT_CONFIG_FILE};
use server::state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "landing-zone")]
#[command(about = "Provision and tear down cloud landing zones", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the database
    Init,
    /// Run the HTTP API
    Serve {
        /// Overrides `[server] port`
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List deployable profiles and their steps
    Definitions {
        #[arg(long)]
        json: bool,
    },
    /// Show what deleting a landing zone would remove, without deleting
    PlanDelete { landing_zone_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init(&cli.config).await,
        Commands::Serve { port } => serve(&cli.config, port).await,
        Commands::Definitions { json } => definitions(&cli.config, json),
        Commands::PlanDelete { landing_zone_id } => plan_delete(&cli.config, landing_zone_id).await,
    }
}

fn load_config(path: &Path) -> Result<ServiceConfig> {
    ServiceConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

async fn init(config_path: &Path) -> Result<()> {
    let config = if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        load_config(config_path)?
    } else {
        let config = ServiceConfig::default();
        tokio::fs::write(config_path, config.to_toml()?)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Created {}", config_path.display());
        config
    };

    let pool = db::create_pool(&config.database.url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool).await?;
    println!("Database ready at {}", config.database.url);

    println!();
    println!("Next steps:");
    println!("  1. Set [provider] and [orchestrator.protected_data] in {}", config_path.display());
    println!("  2. Run 'landing-zone serve'");

    Ok(())
}

async fn serve(config_path: &Path, port: Option<u16>) -> Result<()> {
    init_tracing();

    let config = load_config(config_path)?;
    let port = port.unwrap_or(config.server.port);
    tracing::info!(
        database = %config.database.url,
        provider = ?config.provider.kind,
        "Starting landing zone service"
    );

    let state = AppState::from_config(&config).await?;

    println!();
    println!("Landing Zone Service");
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://localhost:{}", port);
    println!("  Swagger UI:  http://localhost:{}/swagger-ui", port);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    server::serve(state, port).await
}

fn definitions(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    // Listing builds step lists only, so no provider is contacted
    let provider = StepsDefinitionProvider::new(
        Arc::new(InMemoryResourceManager::new()),
        config.orchestrator.protected_data,
    );
    let definitions = provider.definitions();

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for definition in &definitions {
        println!();
        println!(
            "{} ({})",
            definition.name.as_str().bold(),
            definition.version
        );
        println!("  {}", definition.description.dimmed());
        for (index, step) in definition.steps.iter().enumerate() {
            println!("  {:>2}. {}", index + 1, step);
        }
    }
    println!();

    Ok(())
}

async fn plan_delete(config_path: &Path, landing_zone_id: Uuid) -> Result<()> {
    let config = load_config(config_path)?;
    let state = AppState::from_config(&config).await?;

    let plan = state
        .service
        .plan_deletion(landing_zone_id)
        .await
        .with_context(|| format!("Failed to plan deletion of {}", landing_zone_id))?;
    print_plan(&plan);

    Ok(())
}

fn print_plan(plan: &DeletionPlan) {
    println!();
    println!(
        "Landing zone {}: {} resource(s) would be deleted",
        plan.landing_zone_id.to_string().bold(),
        plan.resource_count()
    );

    let sections = [
        ("Independent", &plan.independent),
        ("Foundational (deleted last)", &plan.foundational),
    ];
    for (title, records) in sections {
        if records.is_empty() {
            continue;
        }
        println!();
        println!("{}:", title.yellow());
        for record in records.iter() {
            for resource in record.deletion_order() {
                let marker = if resource.id == record.resource.id {
                    "●"
                } else {
                    "└"
                };
                println!("  {} {} {}", marker, resource.resource_type.dimmed(), resource.name);
            }
        }
    }
    println!();
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "landing_zone=info,orchestrator=info,server=info,tower_http=info".into()
            }),
        )
        .init();
}
