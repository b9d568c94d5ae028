use cerebrosphere_api::RestApi;
use cerebrosphere_storage::{StorageManager, StorageOptions};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// A schema-flexible graph store over HTTP
#[derive(Parser, Debug)]
#[command(name = "cerebrosphere")]
#[command(about = "Entities, properties and links over a REST API", long_about = None)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Address to bind the HTTP API to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP API port
    #[arg(long, default_value_t = 5000)]
    http_port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds between background snapshots, 0 to disable
    #[arg(long, default_value_t = 300)]
    save_interval: u64,

    /// fsync the write-ahead log after every mutation
    #[arg(long)]
    wal_sync: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Cerebrosphere v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);
    info!("HTTP API: {}:{}", args.host, args.http_port);

    let options = StorageOptions {
        save_interval: (args.save_interval > 0).then(|| Duration::from_secs(args.save_interval)),
        sync_wal: args.wal_sync,
    };
    let storage = Arc::new(StorageManager::with_options(&args.data_dir, options)?);
    info!("Storage initialized");

    let storage_http = storage.clone();
    let host = args.host.clone();
    let http_port = args.http_port;
    let http_handle = std::thread::spawn(move || {
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(storage_http, &host, http_port).await {
                error!("HTTP server error: {}", e);
            }
        })
    });

    info!("Cerebrosphere started successfully");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    storage.save()?;
    Ok(())
}
