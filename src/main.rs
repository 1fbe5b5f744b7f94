use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use feedrelay::app::{App, RenderRequest};
use feedrelay::config::Config;
use feedrelay::content::WebParserClient;
use feedrelay::render::Filter;
use feedrelay::storage::{Database, DatabaseError};
use feedrelay::web::{AppState, WebServer};

/// Largest snapshot file `import` will read.
const MAX_SNAPSHOT_SIZE: u64 = 50 * 1024 * 1024;

/// Get the config directory path (~/.config/feedrelay/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedrelay"))
}

/// Write a file via a temp file and rename, so `dst` is never partial.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    // Unpredictable temp name; create_new refuses an existing path
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions or disk space",
                temp_path.display()
            )
        })?;

    temp_file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write temporary file '{}'", temp_path.display())
    })?;

    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to sync temporary file '{}'", temp_path.display())
    })?;

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to move '{}' into place at '{}'",
            temp_path.display(),
            dst.display()
        )
    })?;

    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "feedrelay",
    version,
    about = "Single-user RSS reader with a web parser relay"
)]
struct Args {
    /// Config file (default: ~/.config/feedrelay/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file, overriding [storage] path
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long, global = true)]
    reset_db: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the reader and the relay over HTTP (default)
    Serve {
        /// Listen address, overriding [server] listen
        #[arg(long, value_name = "ADDR")]
        listen: Option<SocketAddr>,
    },
    /// Add a feed, or replace the one stored under the same URL
    Add { url: String, category: String },
    /// Point an existing feed at a new URL and category
    Edit {
        original: String,
        url: String,
        category: String,
    },
    /// Remove a feed
    Remove { url: String },
    /// Re-ingest a feed
    Refresh { url: String },
    /// List feeds
    List,
    /// Print the rendered page
    Render {
        /// Only feeds in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Write the collection as a JSON snapshot
    Export {
        /// Output file (default: stdout)
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Replace the collection with a JSON snapshot
    Import { file: PathBuf },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feedrelay=info,tower_http=info"));
    // stderr keeps stdout clean for `render` and `export`
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // User-only access
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    Ok(())
}

async fn open_database(db_path: &Path, reset: bool) -> Result<Database> {
    if reset && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to delete database")?;
        eprintln!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(db_path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedrelay appears to be using {}. Please close it and try again.",
                db_path.display()
            );
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

/// Read and sanity-check a snapshot file for import.
fn read_snapshot(file: &Path) -> Result<String> {
    let canonical = file
        .canonicalize()
        .with_context(|| format!("Failed to resolve import file: {}", file.display()))?;

    let metadata = std::fs::metadata(&canonical)?;
    if !metadata.is_file() {
        anyhow::bail!("Import path must be a regular file");
    }
    if metadata.len() > MAX_SNAPSHOT_SIZE {
        anyhow::bail!(
            "Import file is {} bytes (max {} bytes)",
            metadata.len(),
            MAX_SNAPSHOT_SIZE
        );
    }

    std::fs::read_to_string(&canonical)
        .with_context(|| format!("Failed to read import file: {}", canonical.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(?config, "Effective configuration");

    let db_path = args
        .db
        .clone()
        .or_else(|| config.storage.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| config_dir.join("feeds.db"));
    let db = open_database(&db_path, args.reset_db).await?;
    let app = App::new(db.clone(), &config).context("Failed to create application")?;

    match args.command.unwrap_or(Command::Serve { listen: None }) {
        Command::Serve { listen } => {
            let addr = match listen {
                Some(addr) => addr,
                None => config
                    .server
                    .listen
                    .parse()
                    .with_context(|| format!("Invalid listen address '{}'", config.server.listen))?,
            };
            let relay = WebParserClient::new(
                feedrelay::app::build_http_client()?,
                config.webparser.endpoint.clone(),
                config.webparser.timeout(),
            );
            tracing::info!(
                db = %db_path.display(),
                webparser = %relay.endpoint(),
                strategy = %config.ingest.strategy,
                "Starting feedrelay"
            );
            WebServer::new(addr, AppState::new(app, relay))
                .run()
                .await
                .context("Web server failed")?;
        }
        Command::Add { url, category } => {
            let outcome = app.add_feed(&url, &category).await?;
            println!("{:?}: {}", outcome, url.trim());
        }
        Command::Edit {
            original,
            url,
            category,
        } => {
            app.edit_feed(&original, &url, &category).await?;
            println!("Edited: {} -> {}", original.trim(), url.trim());
        }
        Command::Remove { url } => {
            app.remove_feed(&url).await?;
            println!("Removed: {}", url.trim());
        }
        Command::Refresh { url } => {
            let count = app.refresh_feed(&url).await?;
            println!("Refreshed {} ({} items)", url.trim(), count);
        }
        Command::List => {
            let feeds = app.feeds().await?;
            if feeds.is_empty() {
                println!("No feeds. Add one with: feedrelay add <url> <category>");
            }
            for feed in feeds {
                println!("[{}] {} ({} items)", feed.category, feed.url, feed.items.len());
            }
        }
        Command::Render { category } => {
            let page = app
                .render(RenderRequest {
                    filter: Filter::from_query(category.as_deref()),
                    ..Default::default()
                })
                .await?;
            print!("{}", page);
        }
        Command::Export { output } => {
            let snapshot = db.export_snapshot().await?;
            match output {
                Some(path) => {
                    atomic_write(&path, snapshot.as_bytes())?;
                    eprintln!("Exported to {}", path.display());
                }
                None => println!("{}", snapshot),
            }
        }
        Command::Import { file } => {
            let json = read_snapshot(&file)?;

            // Back up the current collection before replacing it
            if db.feed_count().await? > 0 {
                let backup_name = format!("feeds.backup.{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
                let backup_path = config_dir.join(&backup_name);
                atomic_write(&backup_path, db.export_snapshot().await?.as_bytes()).with_context(
                    || {
                        format!(
                            "Failed to create backup at '{}'. Collection is unchanged.",
                            backup_path.display()
                        )
                    },
                )?;
                eprintln!("Backed up existing feeds to: {}", backup_path.display());
            }

            let count = db
                .import_snapshot(&json)
                .await
                .context("Failed to import snapshot")?;
            println!("Imported {} feeds from {}", count, file.display());
        }
    }

    Ok(())
}
