//! Environment-driven configuration (spec §6, SPEC_FULL §10).
//!
//! Every externally tunable value lives here, read once at startup via
//! [`Config::from_env`]. Nothing downstream reads `std::env` directly.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStoreDriver {
    Mongo,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStoreDriver {
    Neo4j,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreDriver {
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDriver {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub process_limit: usize,
    pub auto_complete_min_length: usize,
    pub data_dir: PathBuf,

    pub doc_store_driver: DocStoreDriver,
    pub mongo_uri: Option<String>,
    pub mongo_db_name: String,
    pub sqlite_db_path: PathBuf,

    pub graph_store_driver: GraphStoreDriver,
    pub neo4j_uri: Option<String>,
    pub neo4j_username: Option<String>,
    pub neo4j_password: Option<String>,
    pub neo4j_db_name: String,

    pub vector_store_driver: VectorStoreDriver,
    pub qdrant_uri: Option<String>,
    pub embedding_model_name: String,
    pub embedding_batch_size: usize,
    pub embedding_dimensions: usize,
    pub torch_device: String,

    pub cache_driver: CacheDriver,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,

    pub nhs_trud_api_key: Option<String>,
    pub bioportal_api_key: Option<String>,
    pub nih_umls_api_key: Option<String>,

    pub verbose_print: bool,
    pub disable_progress_bar: bool,
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_str(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_str(key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// sane single-node defaults for anything unset.
    pub fn from_env() -> Self {
        let data_dir = env_str("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let doc_store_driver = match env_str("DOC_STORE_DRIVER").as_deref() {
            Some("sqlite") => DocStoreDriver::Sqlite,
            _ => DocStoreDriver::Mongo,
        };
        let graph_store_driver = match env_str("GRAPH_STORE_DRIVER").as_deref() {
            Some("memory") => GraphStoreDriver::Memory,
            _ => GraphStoreDriver::Neo4j,
        };
        let vector_store_driver = match env_str("VECTOR_STORE_DRIVER").as_deref() {
            Some("memory") => VectorStoreDriver::Memory,
            _ => VectorStoreDriver::Qdrant,
        };
        let cache_driver = match env_str("CACHE_DRIVER").as_deref() {
            Some("memory") => CacheDriver::Memory,
            _ => CacheDriver::Redis,
        };

        Self {
            process_limit: env_parsed("PROCESS_LIMIT", num_cpus_fallback()),
            auto_complete_min_length: env_parsed("AUTO_COMPLETE_MIN_LENGTH", 3),
            data_dir,

            doc_store_driver,
            mongo_uri: env_str("MONGODB_URI"),
            mongo_db_name: env_str("MONGODB_DB_NAME").unwrap_or_else(|| "bioterms".to_string()),
            sqlite_db_path: env_str("SQLITE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/bioterms.sqlite3")),

            graph_store_driver,
            neo4j_uri: env_str("NEO4J_URI"),
            neo4j_username: env_str("NEO4J_USERNAME"),
            neo4j_password: env_str("NEO4J_PASSWORD"),
            neo4j_db_name: env_str("NEO4J_DB_NAME").unwrap_or_else(|| "neo4j".to_string()),

            vector_store_driver,
            qdrant_uri: env_str("QDRANT_URI"),
            embedding_model_name: env_str("EMBEDDING_MODEL_NAME")
                .unwrap_or_else(|| "nomic-embed-text-v1.5".to_string()),
            embedding_batch_size: env_parsed("EMBEDDING_BATCH_SIZE", 32),
            embedding_dimensions: env_parsed("EMBEDDING_DIMENSIONS", 768),
            torch_device: env_str("TORCH_DEVICE").unwrap_or_else(|| "cpu".to_string()),

            cache_driver,
            redis_host: env_str("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            redis_port: env_parsed("REDIS_PORT", 6379),
            redis_db: env_parsed("REDIS_DB", 0),

            nhs_trud_api_key: env_str("NHS_TRUD_API_KEY"),
            bioportal_api_key: env_str("BIOPORTAL_API_KEY"),
            nih_umls_api_key: env_str("NIH_UMLS_API_KEY"),

            verbose_print: env_bool("VERBOSE_PRINT", false),
            disable_progress_bar: env_bool("DISABLE_PROGRESS_BAR", false),
        }
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
