use crate::handlers::image_handlers::Operation;
use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Largest request body the HTTP server buffers: 64 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding bucket directories.
    pub storage_dir: String,
    pub bucket_name: String,
    pub database_url: String,
    pub table_name: String,
    /// Request body limit for the HTTP server, in bytes.
    pub max_body_bytes: usize,
}

/// What the process should do once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Migrate,
    /// Handle a single event read from stdin, print the envelope, exit.
    Invoke(Operation),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image upload/list/get/delete service")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where buckets are stored (overrides IMAGE_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Bucket holding image blobs (overrides BUCKET_NAME)
    #[arg(long)]
    pub bucket_name: Option<String>,

    /// Database URL (overrides IMAGE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Metadata table name (overrides TABLE_NAME)
    #[arg(long)]
    pub table_name: Option<String>,

    /// Request body limit in bytes (overrides IMAGE_STORE_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// Create the metadata table and bucket directory, then exit
    #[arg(long, conflicts_with = "invoke")]
    pub migrate: bool,

    /// Read one event as JSON from stdin, run it through the given
    /// operation and print the response envelope
    #[arg(long, value_enum)]
    pub invoke: Option<Operation>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge `args` over values from `lookup` over built-in defaults.
    pub fn resolve(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, RunMode)> {
        let env_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        // --- Environment fallback ---
        let env_port = match lookup("IMAGE_STORE_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing IMAGE_STORE_PORT value `{}`", value))?,
            None => 3000,
        };
        let env_max_body = match lookup("IMAGE_STORE_MAX_BODY_BYTES") {
            Some(value) => value.parse::<usize>().with_context(|| {
                format!("parsing IMAGE_STORE_MAX_BODY_BYTES value `{}`", value)
            })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        // --- Merge ---
        let cfg = Self {
            host: args
                .host
                .unwrap_or_else(|| env_or("IMAGE_STORE_HOST", "0.0.0.0")),
            port: args.port.unwrap_or(env_port),
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| env_or("IMAGE_STORE_STORAGE_DIR", "./data/objects")),
            bucket_name: args
                .bucket_name
                .unwrap_or_else(|| env_or("BUCKET_NAME", "images-bucket")),
            database_url: args.database_url.unwrap_or_else(|| {
                env_or("IMAGE_STORE_DATABASE_URL", "sqlite://./data/meta/images.db")
            }),
            table_name: args
                .table_name
                .unwrap_or_else(|| env_or("TABLE_NAME", "images-metadata")),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_max_body),
        };

        let mode = match (args.migrate, args.invoke) {
            (true, _) => RunMode::Migrate,
            (false, Some(op)) => RunMode::Invoke(op),
            (false, None) => RunMode::Serve,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_env_or_flags() {
        let (cfg, mode) = AppConfig::resolve(Args::default(), env(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.bucket_name, "images-bucket");
        assert_eq!(cfg.table_name, "images-metadata");
        assert_eq!(cfg.storage_dir, "./data/objects");
        assert_eq!(cfg.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(mode, RunMode::Serve);
    }

    #[test]
    fn flags_override_env() {
        let args = Args::parse_from(["image-store", "--port", "8080", "--table-name", "t1"]);
        let (cfg, _) = AppConfig::resolve(
            args,
            env(&[
                ("IMAGE_STORE_PORT", "9000"),
                ("TABLE_NAME", "from-env"),
                ("BUCKET_NAME", "env-bucket"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.table_name, "t1");
        assert_eq!(cfg.bucket_name, "env-bucket");
    }

    #[test]
    fn bad_port_is_reported() {
        let err = AppConfig::resolve(Args::default(), env(&[("IMAGE_STORE_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("IMAGE_STORE_PORT"));
    }

    #[test]
    fn body_limit_from_env_and_flag() {
        let (cfg, _) = AppConfig::resolve(
            Args::default(),
            env(&[("IMAGE_STORE_MAX_BODY_BYTES", "1048576")]),
        )
        .unwrap();
        assert_eq!(cfg.max_body_bytes, 1024 * 1024);

        let args = Args::parse_from(["image-store", "--max-body-bytes", "2048"]);
        let (cfg, _) =
            AppConfig::resolve(args, env(&[("IMAGE_STORE_MAX_BODY_BYTES", "1048576")])).unwrap();
        assert_eq!(cfg.max_body_bytes, 2048);

        let err = AppConfig::resolve(
            Args::default(),
            env(&[("IMAGE_STORE_MAX_BODY_BYTES", "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("IMAGE_STORE_MAX_BODY_BYTES"));
    }

    #[test]
    fn run_mode_from_flags() {
        let args = Args::parse_from(["image-store", "--invoke", "delete"]);
        let (_, mode) = AppConfig::resolve(args, env(&[])).unwrap();
        assert_eq!(mode, RunMode::Invoke(Operation::Delete));

        let args = Args::parse_from(["image-store", "--migrate"]);
        let (_, mode) = AppConfig::resolve(args, env(&[])).unwrap();
        assert_eq!(mode, RunMode::Migrate);
    }
}
