use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::{io::AsyncReadExt, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::{AppConfig, RunMode};
use handlers::image_handlers::{Operation, dispatch};
use models::event::ApiEvent;
use services::{
    image_service::ImageService, metadata_store::SqliteMetadataStore,
    object_store::LocalObjectStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr keeps --invoke output clean) ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting image-store ({:?}) with config: {:?}", mode, cfg);

    // --- Initialize SQLite connection ---
    ensure_db_parent(&cfg.database_url)?;
    let options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url `{}`", cfg.database_url))?
        .create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    // --- Initialize stores ---
    let objects = LocalObjectStore::new(&cfg.storage_dir, &cfg.bucket_name);
    let metadata = SqliteMetadataStore::new(db, &cfg.table_name)?;

    match mode {
        RunMode::Migrate => run_migrations(&cfg, &objects, &metadata).await,
        RunMode::Invoke(op) => {
            let service = ImageService::new(Arc::new(objects), Arc::new(metadata));
            invoke_once(&service, op).await
        }
        RunMode::Serve => {
            let service = ImageService::new(Arc::new(objects), Arc::new(metadata));
            serve(&cfg, service).await
        }
    }
}

/// Create the bucket directory and metadata table, then exit.
async fn run_migrations(
    cfg: &AppConfig,
    objects: &LocalObjectStore,
    metadata: &SqliteMetadataStore,
) -> Result<()> {
    objects.create_bucket().await?;
    tracing::info!("Bucket `{}` ready under {}", cfg.bucket_name, cfg.storage_dir);

    metadata.migrate().await?;
    tracing::info!("Table `{}` ready. Migration complete.", cfg.table_name);
    Ok(())
}

/// Read a single event from stdin and print the response envelope to stdout.
async fn invoke_once(service: &ImageService, op: Operation) -> Result<()> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("reading event from stdin")?;

    let event: ApiEvent = if raw.trim().is_empty() {
        ApiEvent::default()
    } else {
        serde_json::from_str(&raw).context("parsing event JSON")?
    };

    let response = dispatch(service, op, event).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn serve(cfg: &AppConfig, service: ImageService) -> Result<()> {
    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_body_bytes).with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the directory that will hold a file-backed SQLite database.
fn ensure_db_parent(database_url: &str) -> Result<()> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if db_path.is_empty() || db_path.starts_with(":memory:") {
        return Ok(());
    }

    let db_path = db_path.split('?').next().unwrap_or(db_path);
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}
