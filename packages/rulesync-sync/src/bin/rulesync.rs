//! rulesync CLI
//!
//! # Usage
//!
//! ```bash
//! # One incremental pass (checkpoint persisted on success)
//! rulesync --config rulesync.yaml sync
//!
//! # Periodic passes until Ctrl-C
//! rulesync --config rulesync.yaml watch
//!
//! # Query the rules index
//! rulesync search "severity:MAJOR" --routing squid --limit 20
//!
//! # Apply pending schema migrations
//! rulesync migrate
//!
//! # Organizations
//! rulesync org create --name "Acme Corp"
//! rulesync org delete --key acme-corp
//! rulesync org list --page 1 --page-size 25
//! ```
//!
//! Log level comes from `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rulesync_index::{RuleIndexDefinition, SearchIndex, SearchRequest, DEFAULT_SEARCH_LIMIT};
use rulesync_storage::{
    CreateOrganization, Database, FixedSession, MigrationRunner, OrganizationService,
    SqliteOrganizationStore, SqliteRuleStore,
};
use rulesync_sync::{FileCheckpointStore, RuleIndexer, RulesyncConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rulesync")]
#[command(about = "Incremental rule index synchronization", long_about = None)]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization pass
    Sync,

    /// Run a pass every `sync.interval_secs` until interrupted
    Watch,

    /// Search the rules index
    Search {
        /// Query string (`field:value`, free text)
        query: String,

        /// Restrict to one repository
        #[arg(short, long)]
        routing: Option<String>,

        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Apply pending schema migrations
    Migrate,

    /// Manage organizations
    Org {
        #[command(subcommand)]
        command: OrgCommands,
    },
}

#[derive(Subcommand)]
enum OrgCommands {
    /// Create an organization
    Create {
        #[arg(short, long)]
        name: String,

        /// Generated from the name when omitted
        #[arg(short, long)]
        key: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        avatar_url: Option<String>,
    },

    /// Delete an organization by uuid or key
    Delete {
        #[arg(long)]
        uuid: Option<String>,

        #[arg(short, long)]
        key: Option<String>,
    },

    /// List organizations, newest first
    List {
        #[arg(short, long)]
        page: Option<usize>,

        #[arg(long)]
        page_size: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync => {
            let indexer = open_indexer(&config)?;
            let outcome = indexer.index().context("synchronization pass failed")?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Watch => {
            let indexer = Arc::new(open_indexer(&config)?);
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start tokio runtime")?
                .block_on(watch(indexer, config.interval()))?;
        }
        Commands::Search {
            query,
            routing,
            limit,
        } => {
            let index = open_index_reader(&config)?;
            let mut request = SearchRequest::new(query).with_limit(limit);
            if let Some(routing) = routing {
                request = request.with_routing(routing);
            }
            let results = index.search(&request)?;
            println!("{} hit(s)", results.total);
            for hit in results.hits {
                println!("{:>8.3}  {}", hit.score, serde_json::to_string(&hit.document)?);
            }
        }
        Commands::Migrate => {
            let db = open_database(&config)?;
            let applied = MigrationRunner::with_builtin(db)
                .run()
                .context("migration failed")?;
            if applied.is_empty() {
                println!("Schema is up to date");
            } else {
                println!("Applied migrations: {:?}", applied);
            }
        }
        Commands::Org { command } => run_org(&config, command)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RulesyncConfig> {
    RulesyncConfig::load(path).with_context(|| match path {
        Some(path) => format!("failed to load config {}", path.display()),
        None => "invalid default config".to_string(),
    })
}

fn open_database(config: &RulesyncConfig) -> Result<Database> {
    Database::open(&config.database.path)
        .with_context(|| format!("failed to open database {}", config.database.path.display()))
}

/// Read-only view; does not contend with a running `sync` or `watch`
fn open_index_reader(config: &RulesyncConfig) -> Result<SearchIndex> {
    SearchIndex::open_reader(&config.index.dir, RuleIndexDefinition::definition())
        .with_context(|| format!("failed to open index {}", config.index.dir.display()))
}

fn open_index(config: &RulesyncConfig) -> Result<SearchIndex> {
    SearchIndex::open_or_create(
        &config.index.dir,
        RuleIndexDefinition::definition(),
        config.index.writer_heap_bytes,
    )
    .with_context(|| format!("failed to open index {}", config.index.dir.display()))
}

fn open_indexer(config: &RulesyncConfig) -> Result<RuleIndexer<FileCheckpointStore>> {
    let store = SqliteRuleStore::new(open_database(config)?).with_page_size(config.database.page_size);
    Ok(RuleIndexer::new(
        store,
        open_index(config)?,
        FileCheckpointStore::new(&config.sync.checkpoint_path),
        config.sync_options(),
    ))
}

/// Passes run on the blocking pool, one at a time; a failed pass is only
/// retried on the next tick.
async fn watch(indexer: Arc<RuleIndexer<FileCheckpointStore>>, period: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Watching for rule changes every {}s", period.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let indexer = Arc::clone(&indexer);
                match tokio::task::spawn_blocking(move || indexer.index()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Pass failed, retrying on next tick: {}", e),
                    Err(e) => return Err(e).context("synchronization task panicked"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

fn run_org(config: &RulesyncConfig, command: OrgCommands) -> Result<()> {
    let service = OrganizationService::new(SqliteOrganizationStore::new(open_database(config)?));
    // Local operator acts as system administrator
    let session = FixedSession::administrator();

    match command {
        OrgCommands::Create {
            name,
            key,
            description,
            url,
            avatar_url,
        } => {
            let request = CreateOrganization {
                name,
                key,
                description,
                url,
                avatar_url,
            };
            let organization = service.create(&session, request)?;
            println!("{}", serde_json::to_string_pretty(&organization)?);
        }
        OrgCommands::Delete { uuid, key } => {
            if uuid.is_none() && key.is_none() {
                bail!("pass --uuid or --key");
            }
            service.delete(&session, uuid.as_deref(), key.as_deref())?;
            println!("Deleted");
        }
        OrgCommands::List { page, page_size } => {
            let page = service.search(page, page_size)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
    }
    Ok(())
}
