//! reeld - short-video feed cache and playback pool behind a RESP control surface

mod catalog;
mod feed;
mod handler;
mod player;
mod resp;

use anyhow::{Context, Result};
use bytes::BytesMut;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use reelcache::{OptimisticMutator, RecordStore, StoreConfig, StoredFlags};
use reelpool::{PoolConfig, ResourcePool};
use reelstore::ListStore;

use crate::catalog::{Catalog, CatalogSource, DEFAULT_COLLECTION};
use crate::feed::FeedController;
use crate::handler::CommandHandler;
use crate::player::SimulatedPlayer;
use crate::resp::Frame;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    bind: String,

    /// Data directory for durable liked flags
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// JSON catalog to serve; a synthetic one is generated when absent
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Size of the synthetic catalog
    #[arg(long, default_value_t = 60)]
    demo_records: usize,

    /// Collection the feed pages through
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Records per page
    #[arg(long, default_value_t = 10)]
    page_size: u32,

    /// Record cache capacity
    #[arg(long, default_value_t = 500)]
    record_capacity: usize,

    /// Page cache capacity
    #[arg(long, default_value_t = 20)]
    page_capacity: usize,

    /// Cache entry time-to-live in seconds
    #[arg(long, default_value_t = 300)]
    ttl_secs: u64,

    /// Simulated catalog latency in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Maximum live playback sessions
    #[arg(long, default_value_t = 5)]
    max_concurrent: usize,

    /// Session initialization timeout in milliseconds
    #[arg(long, default_value_t = 15_000)]
    init_timeout_ms: u64,

    /// Simulated decoder startup in milliseconds
    #[arg(long, default_value_t = 120)]
    startup_ms: u64,

    /// Health check mode (for Docker)
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.health {
        match TcpStream::connect(&args.bind).await {
            Ok(_) => {
                println!("OK");
                std::process::exit(0);
            }
            Err(_) => {
                eprintln!("FAILED");
                std::process::exit(1);
            }
        }
    }

    info!("Starting reeld v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", args.data.display());

    let lists = Arc::new(
        ListStore::open(&args.data)
            .with_context(|| format!("opening data directory {}", args.data.display()))?,
    );

    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)?,
        None => {
            info!(records = args.demo_records, "no catalog given, generating one");
            Catalog::demo(args.demo_records)
        }
    };
    let catalog = Arc::new(CatalogSource::new(
        catalog,
        Duration::from_millis(args.latency_ms),
    ));

    let store_config = StoreConfig {
        record_capacity: args.record_capacity,
        page_capacity: args.page_capacity,
        ttl: Duration::from_secs(args.ttl_secs),
        ..StoreConfig::default()
    };
    let flags = Arc::new(StoredFlags::new(Arc::clone(&lists), store_config.liked_list.clone()));
    let store = RecordStore::new(store_config, catalog.clone(), flags)?;
    let mutator = OptimisticMutator::new(store, catalog.clone());

    let pool_config = PoolConfig {
        max_concurrent: args.max_concurrent,
        init_timeout: Duration::from_millis(args.init_timeout_ms),
        ..PoolConfig::default()
    };
    let player = SimulatedPlayer::new(Duration::from_millis(args.startup_ms));
    let pool = ResourcePool::new(player, pool_config)?;

    let feed = FeedController::new(mutator, pool, args.collection.clone(), args.page_size);
    let handler = Arc::new(CommandHandler::new(feed.clone(), catalog));

    let listener = TcpListener::bind(&args.bind).await?;
    info!("Server listening on {}", args.bind);

    println!("\nreeld ready");
    println!("   Connection:   redis-cli -h {} -p {}", host_of(&args.bind), port_of(&args.bind));
    println!("   Collection:   {} ({} per page)", args.collection, args.page_size);
    println!("   Sessions:     up to {} live", args.max_concurrent);
    println!("   Try:          FOCUS 0, LIKE clip-0, INFO");
    println!("\nPress Ctrl+C to stop\n");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let handler = Arc::clone(&handler);

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            error!("Error handling client {}: {}", addr, e);
                        }
                        info!("Connection closed: {}", addr);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    if let Err(e) = feed.shutdown().await {
        warn!("Could not persist liked flags on shutdown: {}", e);
    }
    lists.close()?;
    info!("Data directory synced");
    Ok(())
}

fn host_of(bind: &str) -> &str {
    bind.split(':').next().unwrap_or("127.0.0.1")
}

fn port_of(bind: &str) -> &str {
    bind.split(':').nth(1).unwrap_or("6380")
}

async fn handle_client(mut stream: TcpStream, handler: Arc<CommandHandler>) -> Result<()> {
    let mut buffer = BytesMut::with_capacity(4096);
    let mut out = BytesMut::with_capacity(4096);

    loop {
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }

        loop {
            match Frame::parse(&mut buffer) {
                Ok(Some(command)) => {
                    let reply = handler.handle(command).await;
                    reply.write_to(&mut out);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Parse error: {}", e);
                    Frame::err(&e).write_to(&mut out);
                    buffer.clear();
                    break;
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
            out.clear();
        }
    }
}
