use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was already installed in the global cache.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration shared by the HTTP server and the ingestion CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Elasticsearch node.
    pub elastic_url: String,
    /// Name of the index holding paragraph documents.
    pub index_name: String,
    /// Optional legacy mapping type name for engines that still expect one.
    pub doc_type: Option<String>,
    /// Port the HTTP API listens on.
    pub server_port: u16,
    /// Directory scanned for `.txt` source files.
    pub books_dir: PathBuf,
    /// Maximum number of documents per bulk request.
    pub ingest_batch_size: usize,
    /// Connectivity-check policy applied before the index is reset.
    pub connect: ConnectPolicy,
    /// Upper bound on any single Elasticsearch request.
    pub request_timeout: Duration,
}

/// Bounded retry policy for the startup connectivity check.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConnectPolicy {
    /// Maximum number of health probes before giving up.
    pub max_attempts: u32,
    /// Delay before the second probe; later delays grow exponentially.
    pub initial_backoff: Duration,
    /// Overall time budget for the retry loop.
    pub max_elapsed: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            initial_backoff: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(120),
        }
    }
}

/// Default index name used when `ES_INDEX` is unset.
pub const DEFAULT_INDEX_NAME: &str = "library";
/// Default per-request timeout used when `ES_REQUEST_TIMEOUT_SECS` is unset.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default bulk batch size used when `INGEST_BATCH_SIZE` is unset.
pub const DEFAULT_BATCH_SIZE: usize = 500;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = ConnectPolicy::default();
        let elastic_url = match vars.optional("ES_URL") {
            Some(url) => url,
            None => {
                let host = vars.optional("ES_HOST").unwrap_or_else(|| "localhost".into());
                let port: u16 = vars.parse("ES_PORT")?.unwrap_or(9200);
                format!("http://{host}:{port}")
            }
        };

        let ingest_batch_size = vars.parse("INGEST_BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        if ingest_batch_size == 0 {
            return Err(ConfigError::InvalidValue("INGEST_BATCH_SIZE".into()));
        }

        Ok(Self {
            elastic_url,
            index_name: vars
                .optional("ES_INDEX")
                .unwrap_or_else(|| DEFAULT_INDEX_NAME.into()),
            doc_type: vars.optional("ES_DOC_TYPE"),
            server_port: vars.parse("PORT")?.unwrap_or(3000),
            books_dir: vars
                .optional("BOOKS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./books")),
            ingest_batch_size,
            request_timeout: vars
                .parse("ES_REQUEST_TIMEOUT_SECS")?
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            connect: ConnectPolicy {
                max_attempts: vars
                    .parse("ES_CONNECT_MAX_ATTEMPTS")?
                    .unwrap_or(defaults.max_attempts)
                    .max(1),
                initial_backoff: vars
                    .parse("ES_CONNECT_INITIAL_BACKOFF_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_backoff),
                max_elapsed: vars
                    .parse("ES_CONNECT_MAX_ELAPSED_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.max_elapsed),
            },
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string()))
            })
            .transpose()
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, if [`init_config`] has run.
pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        elastic_url = %config.elastic_url,
        index = %config.index_name,
        doc_type = ?config.doc_type,
        server_port = config.server_port,
        books_dir = %config.books_dir.display(),
        batch_size = config.ingest_batch_size,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
}
