use chrono::{NaiveDate, Utc};
use clap::Parser;
use crowdfunding::application::admin::TransactionService;
use crowdfunding::application::collections::Collections;
use crowdfunding::application::gateway::{GatewayDispatcher, clean_alias};
use crowdfunding::application::manual::ManualGateway;
use crowdfunding::application::notifier::Notifier;
use crowdfunding::application::toolkit::GatewayToolkit;
use crowdfunding::config::ComponentParams;
use crowdfunding::domain::notification::User;
use crowdfunding::domain::ports::Stores;
use crowdfunding::infrastructure::in_memory::InMemoryUserDirectory;
use crowdfunding::interfaces::csv::event_reader::{EventReader, EventType};
use crowdfunding::interfaces::csv::project_writer::ProjectWriter;
use crowdfunding::interfaces::json::seed::Seed;
use miette::{IntoDiagnostic, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway events CSV file
    input: PathBuf,

    /// JSON catalog loaded into an empty store
    #[arg(long)]
    seed: PathBuf,

    /// Component parameters JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Day the summaries are computed for (YYYY-MM-DD), defaults to today
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .into_diagnostic()?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
async fn persistent_stores(path: &Path, users: &[User]) -> Result<Stores> {
    use crowdfunding::infrastructure::mailer::LogMailer;
    use crowdfunding::infrastructure::rocksdb::RocksDBStore;

    let store = RocksDBStore::open(path).into_diagnostic()?;
    for user in users {
        store.store_user(user.clone()).await.into_diagnostic()?;
    }
    Ok(store.into_stores(Arc::new(LogMailer)))
}

async fn in_memory_stores(users: &[User]) -> Stores {
    let directory = InMemoryUserDirectory::new();
    for user in users {
        directory.insert(user.clone()).await;
    }
    let mut stores = Stores::in_memory();
    stores.users = Arc::new(directory);
    stores
}

async fn open_stores(db_path: Option<&Path>, users: &[User]) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => persistent_stores(path, users).await,
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(in_memory_stores(users).await)
        }
        None => Ok(in_memory_stores(users).await),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let params = match &cli.config {
        Some(path) => ComponentParams::load(path).into_diagnostic()?,
        None => ComponentParams::default(),
    };
    let seed = Seed::load(&cli.seed).into_diagnostic()?;
    let stores = open_stores(cli.db_path.as_deref(), &seed.users).await?;

    if stores.projects.get_all().await.into_diagnostic()?.is_empty() {
        seed.apply(&stores).await.into_diagnostic()?;
    } else {
        info!("Store already holds projects, seed skipped");
    }

    let toolkit = GatewayToolkit::new(stores.clone(), Arc::new(params));
    let mut gateways = GatewayDispatcher::new();
    gateways.register(Arc::new(ManualGateway::new(toolkit.clone())));
    let notifier = Notifier::new(gateways.clone(), toolkit);
    let transactions = TransactionService::new(stores.clone(), gateways);

    // Replay events
    let file = File::open(&cli.input).into_diagnostic()?;
    for event in EventReader::new(file).events() {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                error!("Error reading event: {e}");
                continue;
            }
        };
        match event.r#type {
            EventType::Notify => {
                if notifier.notify(&event.gateway, &event.request()).await.is_none() {
                    warn!("Notification {} was not acknowledged", event.txn_id);
                }
            }
            EventType::Status => {
                let alias = clean_alias(&event.gateway);
                if let Err(e) = transactions
                    .change_status_by_txn_id(&alias, &event.txn_id, event.status.clone())
                    .await
                {
                    error!("Error changing status of {}: {e}", event.txn_id);
                }
            }
        }
    }

    let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());
    let summaries = Collections::new(&stores)
        .summaries(today)
        .await
        .into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ProjectWriter::new(stdout.lock());
    writer.write_summaries(&summaries).into_diagnostic()?;

    Ok(())
}
