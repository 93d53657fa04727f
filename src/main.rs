use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docmapper::query::{self, Predicate};
use docmapper::{Engine, StoreConfig, User, ingest_directory, models};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docmapper")]
#[command(about = "JSON document columns over PostgreSQL JSONB with a SQLite fallback")]
struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log every SQL statement
    #[arg(long, global = true)]
    echo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create missing tables and report the active dialect
    Schema,
    /// Load every *.json file of a directory as a character
    Ingest { dir: PathBuf },
    /// Flag characters at or above a level as VIP
    Promote {
        #[arg(long, default_value_t = 10)]
        threshold: i64,
    },
    /// User age and city statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = StoreConfig::from_env().context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    config.echo |= cli.echo;
    init_tracing(config.echo);

    let mut engine = Engine::connect(&config)
        .await
        .with_context(|| format!("failed to open {}", config.redacted_url()))?;
    engine
        .create_all()
        .await
        .context("failed to create tables")?;

    match cli.command {
        Command::Schema => {
            println!(
                "dialect: {}, document columns: {}{}",
                engine.dialect(),
                engine.json_type(),
                if engine.is_fallback() {
                    format!(" (fallback file {})", config.fallback_path.display())
                } else {
                    String::new()
                }
            );
        }
        Command::Ingest { dir } => {
            let mut session = engine.session();
            let report = ingest_directory(&mut session, &dir)
                .await
                .with_context(|| format!("failed to ingest '{}'", dir.display()))?;
            println!(
                "ingested {} records ({} new, {} replaced, {} unchanged)",
                report.ingested, report.inserted, report.replaced, report.unchanged
            );
            for skipped in &report.skipped {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
        }
        Command::Promote { threshold } => {
            let mut session = engine.session();
            let promoted = models::promote_vips(&mut session, threshold)
                .await
                .context("VIP promotion failed")?;
            println!("promoted {} characters", promoted);
        }
        Command::Stats => {
            let mut session = engine.session();
            let users = session.all::<User>().await.context("failed to load users")?;
            let active = session
                .filter_documents::<User>("profile", &Predicate::is_true("is_active"))
                .await
                .context("failed to filter users")?;
            session.rollback().await?;

            let profiles = || query::documents(&users, "profile");
            println!("users: {} ({} active)", users.len(), active.len());
            println!("average age: {:.1}", query::average(profiles(), "age"));
            for (city, count) in query::count_by(profiles(), "address.city") {
                println!("  {}: {}", city, count);
            }
        }
    }

    engine.close().await.context("failed to close connection")?;
    info!("done");
    Ok(())
}

fn init_tracing(echo: bool) {
    let default = if echo {
        "docmapper=debug,sqlx::query=debug"
    } else {
        "docmapper=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
