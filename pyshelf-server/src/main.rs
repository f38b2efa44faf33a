use clap::Parser;
use pyshelf_core::config::IndexConfig;
use pyshelf_core::index::PackageIndex;
use pyshelf_core::store::s3::{S3Config, S3PackageStore};
use pyshelf_core::store::PackageStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod auth;
mod routes;

use auth::BasicAuth;
use routes::{create_router, AppState};

/// pyshelf server — a private PyPI-compatible package index over S3.
#[derive(Parser)]
#[command(name = "pyshelf-server")]
struct Args {
    /// Address to bind the server to.
    #[arg(long, default_value = "0.0.0.0", env = "PYSHELF_BIND")]
    bind: String,

    /// Port for the index server.
    #[arg(long, default_value = "8080", env = "PYSHELF_PORT")]
    port: u16,

    /// Path to a config.yaml with index options. When absent, index
    /// options come from PYSHELF_* env vars or their defaults.
    #[arg(long, env = "PYSHELF_CONFIG")]
    config: Option<PathBuf>,

    /// S3 bucket holding the package archives.
    #[arg(long, env = "PYSHELF_S3_BUCKET")]
    s3_bucket: String,

    /// S3 region.
    #[arg(long, default_value = "us-east-1", env = "PYSHELF_S3_REGION")]
    s3_region: String,

    /// S3 endpoint (for S3-compatible services).
    #[arg(long, env = "PYSHELF_S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// S3 access key.
    #[arg(long, env = "PYSHELF_S3_ACCESS_KEY")]
    s3_access_key: String,

    /// S3 secret key.
    #[arg(long, env = "PYSHELF_S3_SECRET_KEY")]
    s3_secret_key: String,

    /// Username required for uploads. Uploads are open when unset.
    #[arg(long, env = "PYSHELF_USERNAME")]
    username: Option<String>,

    /// Password required for uploads.
    #[arg(long, env = "PYSHELF_PASSWORD")]
    password: Option<String>,
}

fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_target(false)
        .with_file(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    configure_logging();
    let args = Args::parse();

    info!("pyshelf-server starting");

    let config = match &args.config {
        Some(path) => IndexConfig::load(path).unwrap_or_else(|e| {
            error!("Failed to load config from {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => IndexConfig::from_env(),
    };

    if args.username.is_some() != args.password.is_some() {
        error!("--username and --password must be provided together");
        std::process::exit(1);
    }
    let auth = BasicAuth::from_credentials(args.username.clone(), args.password.clone());
    if auth.enabled {
        info!("Upload authentication enabled");
    } else {
        info!("No upload credentials provided — uploads are open");
    }

    let store = S3PackageStore::new(S3Config {
        bucket_name: args.s3_bucket.clone(),
        region: args.s3_region.clone(),
        access_key_id: args.s3_access_key.clone(),
        secret_access_key: args.s3_secret_key.clone(),
        endpoint_url: args.s3_endpoint.clone(),
    })
    .await
    .unwrap_or_else(|e| {
        error!("Failed to create S3 store: {e}");
        std::process::exit(1);
    });
    let store: Arc<dyn PackageStore> = Arc::new(store);

    let state = Arc::new(AppState {
        index: PackageIndex::new(store.clone()),
        store,
        config,
        auth,
    });

    let app = create_router(state);
    let addr = format!("{}:{}", args.bind, args.port);

    info!("Binding to {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {addr}: {e}");
            std::process::exit(1);
        });

    info!("pyshelf-server listening on http://{addr}");
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
