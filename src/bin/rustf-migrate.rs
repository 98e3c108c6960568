use anyhow::Context;
use clap::{Parser, Subcommand};
use rustf_migrations::{
    load_migrations, validate_migrations, AnyAdapter, Migration, MigrationConfig, MigrationManager,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rustf-migrate")]
#[command(about = "Apply, revert and inspect declarative schema migrations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL (defaults to $DATABASE_URL)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// TOML file with connection, ledger and directory settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding {id}_{name}.json migration files
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Ledger table name
    #[arg(short, long, global = true)]
    table: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Up,

    /// Revert the most recent migration
    Down {
        /// Keep reverting until no migration above this id is applied
        #[arg(long)]
        to: Option<String>,
    },

    /// Show applied and pending migrations
    Status,

    /// Check migration files without connecting
    Validate,

    /// Create a new migration file
    New {
        /// Migration name, e.g. "create users"
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::New { name } => {
            let path = Migration::create_template(&name, &config.migrations_dir)?;
            println!("Created migration file: {}", path.display());
        }
        Commands::Validate => {
            let migrations = load_migrations(&config.migrations_dir)?;
            let result = validate_migrations(&migrations);

            for warning in &result.warnings {
                println!("warning: {}", warning);
            }
            for error in &result.errors {
                println!("error: {}", error);
            }
            println!(
                "{}/{} migrations valid",
                result.valid_count, result.total_count
            );
            if !result.is_valid() {
                anyhow::bail!("{} migration error(s)", result.errors.len());
            }
        }
        Commands::Up => {
            let mut manager = manager(&config).await?;
            let report = manager.migrate_up().await?;
            if report.is_empty() {
                println!("Nothing to apply");
            } else {
                println!("Applied: {}", report.applied.join(", "));
            }
        }
        Commands::Down { to } => {
            let mut manager = manager(&config).await?;
            match to {
                Some(target) => {
                    let reverted = manager.migrate_down_to(&target).await?;
                    println!("Reverted {} migration(s)", reverted.len());
                }
                None => match manager.migrate_down().await? {
                    Some(id) => println!("Reverted: {}", id),
                    None => println!("Nothing to revert"),
                },
            }
        }
        Commands::Status => {
            let mut manager = manager(&config).await?;
            println!("{}", manager.status().await?);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<MigrationConfig> {
    let url = cli
        .url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let mut config = match (&cli.config, url) {
        (Some(path), url) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut config = MigrationConfig::from_toml_str(&content)?;
            if let Some(url) = url {
                config.connection = url.as_str().into();
            }
            config
        }
        (None, Some(url)) => MigrationConfig::new(url.as_str()),
        // file-only commands still need a directory
        (None, None) => MigrationConfig::new(""),
    };

    if let Some(dir) = &cli.dir {
        config.migrations_dir = dir.clone();
    }
    if let Some(table) = &cli.table {
        config.ledger_table = table.clone();
    }
    Ok(config)
}

async fn manager(config: &MigrationConfig) -> anyhow::Result<MigrationManager> {
    let migrations = load_migrations(&config.migrations_dir)?;
    let adapter = AnyAdapter::connect_with("default", config)
        .await
        .context("no usable connection; pass --url, --config or set DATABASE_URL")?;
    Ok(MigrationManager::new(adapter, migrations)?)
}
