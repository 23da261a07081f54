use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use api_client::{CloudStorageUploader, HttpTransport, Photo, StreamKind};
use auth::{KeyringTokenStore, PrefsTokenStore, Session, TokenStore};
use cache::{Prefs, SqlitePrefs};
use clap::{Parser, Subcommand, ValueEnum};
use client::{AbelanaClient, ClientError};
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(name = "abelana", author, version, about = "Abelana photo sharing client")]
struct Cli {
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Override the server base URL
    #[arg(long)]
    remote_host: Option<String>,
    /// Override the request timeout in seconds
    #[arg(long)]
    request_timeout_secs: Option<u64>,
    /// Override the directory holding the local cache and logs
    #[arg(long)]
    data_path: Option<PathBuf>,
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Keep the session token in the system keyring instead of the local cache
    #[arg(long)]
    use_keyring: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange an identity provider token for a session
    SignIn {
        identity_token: String,
    },
    /// Forget the session token
    SignOut,
    /// Show the session state and cached photo counts
    Status,
    /// Fetch a photo stream from the server
    List {
        stream: Stream,
        /// Fetch the page after the cached ones
        #[arg(long)]
        next: bool,
    },
    /// Show a cached photo stream without contacting the server
    Cached {
        stream: Stream,
    },
    /// Upload a JPEG with a description
    Upload {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        description: String,
    },
    /// Vote on a photo: 1 likes, -1 dislikes, anything else is neutral
    Vote {
        photo_id: i64,
        #[arg(allow_negative_numbers = true)]
        score: i32,
    },
    /// Replace the description of one of your photos
    Edit {
        photo_id: i64,
        description: String,
    },
    /// Delete one of your photos
    Delete {
        photo_id: i64,
    },
    /// Report a photo as inappropriate
    Flag {
        photo_id: i64,
    },
    /// Write the effective configuration to the config file
    InitConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum Stream {
    Feed,
    Liked,
    Owned,
}

impl From<Stream> for StreamKind {
    fn from(s: Stream) -> Self {
        match s {
            Stream::Feed => StreamKind::Feed,
            Stream::Liked => StreamKind::Liked,
            Stream::Owned => StreamKind::Owned,
        }
    }
}

fn print_photos(photos: &[Photo]) {
    if photos.is_empty() {
        println!("No photos");
        return;
    }
    for p in photos {
        println!(
            "{}\t{}\t{:+}\t{}\t{}",
            p.id,
            p.created_at_utc().format("%Y-%m-%d %H:%M"),
            p.vote,
            p.owner_id,
            p.description
        );
    }
}

fn report(result: Result<(), ClientError>, done: &str) {
    match result {
        Ok(()) => println!("{}", done),
        Err(e) => println!("Error: {}", e),
    }
}

fn build_client(cfg: &config::AppConfig) -> Result<AbelanaClient, Box<dyn std::error::Error>> {
    let prefs: Arc<dyn Prefs> = Arc::new(SqlitePrefs::new(&cfg.data_path.join("cache.sqlite"))?);
    let store: Arc<dyn TokenStore> = if cfg.use_keyring {
        Arc::new(KeyringTokenStore::new()?)
    } else {
        Arc::new(PrefsTokenStore::new(prefs.clone()))
    };
    let transport = HttpTransport::new(cfg.remote_host.clone())
        .with_service(cfg.package_name.clone(), cfg.interface.clone())
        .with_timeout(Duration::from_secs(cfg.request_timeout_secs))?;

    Ok(AbelanaClient::new(
        Arc::new(transport),
        Arc::new(CloudStorageUploader::new()),
        Session::new(store),
        prefs,
    ))
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        remote_host: cli.remote_host.clone(),
        request_timeout_secs: cli.request_timeout_secs,
        data_path: cli.data_path.clone(),
        use_keyring: cli.use_keyring,
    };
    let cfg = config::AppConfig::load_from(cli.config.clone()).apply_overrides(&overrides);

    if let Commands::InitConfig = cli.command {
        let path = cfg.save_to(cli.config.clone())?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let base_dir = cfg.data_path.clone();
    std::fs::create_dir_all(&base_dir)?;
    let file_appender = rolling::daily(&base_dir, "abelana.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stderr.and(file_writer))
        .init();

    let client = build_client(&cfg)?;

    match cli.command {
        Commands::SignIn { identity_token } => {
            report(client.sign_in(&identity_token).await, "Signed in");
        }
        Commands::SignOut => {
            client.sign_out();
            println!("Signed out");
        }
        Commands::Status => {
            if client.is_signed_in() {
                println!("Signed in");
            } else {
                println!("Signed out");
            }
            for kind in StreamKind::ALL {
                let more = if client.has_more_pages(kind) { " (more available)" } else { "" };
                println!("{:?}: {} cached photos{}", kind, client.cached_photos(kind).len(), more);
            }
        }
        Commands::List { stream, next } => {
            let kind = StreamKind::from(stream);
            let listing = client.list_photos(kind, next).await;
            print_photos(&listing.photos);
            if !listing.is_ok() {
                println!("{}", listing.message());
            } else if client.has_more_pages(kind) {
                println!("More photos available, run again with --next");
            }
        }
        Commands::Cached { stream } => {
            print_photos(&client.cached_photos(stream.into()));
        }
        Commands::Upload { file, description } => match tokio::fs::read(&file).await {
            Ok(bytes) => report(client.upload_photo(bytes, &description).await, "Photo uploaded"),
            Err(e) => println!("Error: could not read {}: {}", file.display(), e),
        },
        Commands::Vote { photo_id, score } => {
            report(client.vote_photo(photo_id, score).await, "Vote recorded");
        }
        Commands::Edit { photo_id, description } => {
            report(client.edit_photo(photo_id, &description).await, "Description updated");
        }
        Commands::Delete { photo_id } => {
            report(client.delete_photo(photo_id).await, "Photo deleted");
        }
        Commands::Flag { photo_id } => {
            report(client.flag_photo(photo_id).await, "Photo reported");
        }
        Commands::InitConfig => {}
    }

    if let Err(e) = client.shutdown() {
        tracing::error!(error = %e, "Final checkpoint failed");
        println!("Error: {}", e);
    }
    Ok(())
}
