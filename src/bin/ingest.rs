//! bioterms-ingest — demonstration CLI for the ingest orchestrator.
//!
//! Not the product surface (spec §1 scopes the HTTP/CLI transport out);
//! this binary exists so the ingestion pipeline has a runnable entry
//! point, analogous to the teacher's `src/bin/plexus.rs`.
//!
//! Usage:
//!   bioterms-ingest download <prefix> [--redownload]
//!   bioterms-ingest load <prefix> [--drop-existing]
//!   bioterms-ingest embed <prefix>
//!   bioterms-ingest delete <prefix>
//!   bioterms-ingest status <prefix>
//!   bioterms-ingest annotation load <prefix1> <prefix2> [--overwrite]
//!   bioterms-ingest similarity calculate <method> <prefix> [--threshold N]

use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use bioterms::config::{CacheDriver, Config, DocStoreDriver, GraphStoreDriver, VectorStoreDriver};
use bioterms::error::BtsResult;
use bioterms::model::{Prefix, SimilarityMethod};
use bioterms::orchestrator::IngestOrchestrator;
use bioterms::store::cache::{Cache, MemoryCache};
use bioterms::store::document::{DocumentStore, SqliteDocumentStore};
use bioterms::store::graph::{GraphStore, MemoryGraphStore};
use bioterms::store::vector::{FakeEmbeddingModel, MemoryVectorStore, VectorStore};

#[cfg(feature = "mongo")]
use bioterms::store::document::MongoDocumentStore;
#[cfg(not(feature = "mongo"))]
use bioterms::store::document::MemoryDocumentStore;
#[cfg(feature = "neo4j")]
use bioterms::store::graph::Neo4jGraphStore;
#[cfg(feature = "qdrant")]
use bioterms::store::vector::QdrantVectorStore;
#[cfg(feature = "redis-cache")]
use bioterms::store::cache::RedisCache;

#[derive(Parser)]
#[command(name = "bioterms-ingest", version, about = "Terminology ingest orchestrator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a vocabulary's upstream files.
    Download {
        prefix: String,
        #[arg(long)]
        redownload: bool,
    },
    /// Parse and load a vocabulary into the document and graph stores.
    Load {
        prefix: String,
        #[arg(long)]
        drop_existing: bool,
    },
    /// Embed a loaded vocabulary's concepts into the vector store.
    Embed { prefix: String },
    /// Delete all data for a vocabulary.
    Delete { prefix: String },
    /// Print a vocabulary's ingest stage and concept count.
    Status { prefix: String },
    /// Cross-vocabulary annotation operations.
    Annotation {
        #[command(subcommand)]
        command: AnnotationCommands,
    },
    /// Similarity computation.
    Similarity {
        #[command(subcommand)]
        command: SimilarityCommands,
    },
}

#[derive(Subcommand)]
enum AnnotationCommands {
    Load {
        prefix1: String,
        prefix2: String,
        #[arg(long)]
        overwrite: bool,
    },
    Delete { prefix1: String, prefix2: String },
    Status { prefix1: String, prefix2: String },
}

#[derive(Subcommand)]
enum SimilarityCommands {
    Calculate {
        method: String,
        prefix: String,
        #[arg(long)]
        corpus: Option<String>,
        #[arg(long)]
        threshold: Option<f64>,
    },
}

fn parse_prefix(s: &str) -> Prefix {
    Prefix::from_str(s).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

fn parse_method(s: &str) -> SimilarityMethod {
    match s.to_ascii_lowercase().as_str() {
        "relevance" => SimilarityMethod::Relevance,
        "co_annotation" | "co-annotation" | "coannotation" => SimilarityMethod::CoAnnotation,
        other => {
            eprintln!("error: unknown similarity method \"{other}\" (expected relevance|co_annotation)");
            std::process::exit(1);
        }
    }
}

async fn build_document_store(config: &Config) -> BtsResult<Arc<dyn DocumentStore>> {
    match config.doc_store_driver {
        DocStoreDriver::Sqlite => Ok(Arc::new(SqliteDocumentStore::open(&config.sqlite_db_path)?)),
        #[cfg(feature = "mongo")]
        DocStoreDriver::Mongo => {
            let uri = config.mongo_uri.as_deref().unwrap_or("mongodb://localhost:27017");
            Ok(Arc::new(MongoDocumentStore::connect(uri, &config.mongo_db_name).await?))
        }
        #[cfg(not(feature = "mongo"))]
        DocStoreDriver::Mongo => {
            eprintln!("warning: built without the \"mongo\" feature, falling back to an in-process document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
    }
}

async fn build_graph_store(config: &Config) -> BtsResult<Arc<dyn GraphStore>> {
    match config.graph_store_driver {
        GraphStoreDriver::Memory => Ok(Arc::new(MemoryGraphStore::new())),
        #[cfg(feature = "neo4j")]
        GraphStoreDriver::Neo4j => {
            let uri = config.neo4j_uri.as_deref().unwrap_or("bolt://localhost:7687");
            let username = config.neo4j_username.as_deref().unwrap_or("neo4j");
            let password = config.neo4j_password.as_deref().unwrap_or("");
            Ok(Arc::new(
                Neo4jGraphStore::connect(uri, username, password, &config.neo4j_db_name).await?,
            ))
        }
        #[cfg(not(feature = "neo4j"))]
        GraphStoreDriver::Neo4j => {
            eprintln!("warning: built without the \"neo4j\" feature, falling back to an in-process graph store");
            Ok(Arc::new(MemoryGraphStore::new()))
        }
    }
}

fn build_vector_store(config: &Config) -> BtsResult<Arc<dyn VectorStore>> {
    match config.vector_store_driver {
        VectorStoreDriver::Memory => Ok(Arc::new(MemoryVectorStore::new())),
        #[cfg(feature = "qdrant")]
        VectorStoreDriver::Qdrant => {
            let uri = config.qdrant_uri.as_deref().unwrap_or("http://localhost:6334");
            Ok(Arc::new(QdrantVectorStore::connect(uri, config.embedding_dimensions as u64)?))
        }
        #[cfg(not(feature = "qdrant"))]
        VectorStoreDriver::Qdrant => {
            eprintln!("warning: built without the \"qdrant\" feature, falling back to an in-process vector store");
            Ok(Arc::new(MemoryVectorStore::new()))
        }
    }
}

async fn build_cache(config: &Config) -> BtsResult<Arc<dyn Cache>> {
    match config.cache_driver {
        CacheDriver::Memory => Ok(Arc::new(MemoryCache::new())),
        #[cfg(feature = "redis-cache")]
        CacheDriver::Redis => {
            let url = format!("redis://{}:{}/{}", config.redis_host, config.redis_port, config.redis_db);
            Ok(Arc::new(RedisCache::connect(&url).await?))
        }
        #[cfg(not(feature = "redis-cache"))]
        CacheDriver::Redis => {
            eprintln!("warning: built without the \"redis-cache\" feature, falling back to an in-process cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> BtsResult<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    let documents = build_document_store(&config).await?;
    let graph = build_graph_store(&config).await?;
    let vectors = build_vector_store(&config)?;
    let cache = build_cache(&config).await?;

    let orchestrator = IngestOrchestrator::new(config, documents, graph, vectors, cache);

    match cli.command {
        Commands::Download { prefix, redownload } => {
            orchestrator.download(parse_prefix(&prefix), redownload).await?;
            println!("downloaded {prefix}");
        }
        Commands::Load { prefix, drop_existing } => {
            let count = orchestrator.load(parse_prefix(&prefix), drop_existing).await?;
            println!("loaded {count} concepts for {prefix}");
        }
        Commands::Embed { prefix } => {
            let model = FakeEmbeddingModel::new(orchestrator.config.embedding_dimensions);
            let count = orchestrator.embed(parse_prefix(&prefix), &model).await?;
            println!("embedded {count} concepts for {prefix}");
        }
        Commands::Delete { prefix } => {
            orchestrator.delete_vocabulary(parse_prefix(&prefix)).await?;
            println!("deleted {prefix}");
        }
        Commands::Status { prefix } => {
            let status = orchestrator.vocabulary_status(parse_prefix(&prefix)).await?;
            println!("{status:?}");
        }
        Commands::Annotation { command } => match command {
            AnnotationCommands::Load {
                prefix1,
                prefix2,
                overwrite,
            } => {
                let count = orchestrator
                    .load_annotation((parse_prefix(&prefix1), parse_prefix(&prefix2)), overwrite)
                    .await?;
                println!("loaded {count} annotations between {prefix1} and {prefix2}");
            }
            AnnotationCommands::Delete { prefix1, prefix2 } => {
                orchestrator
                    .delete_annotation((parse_prefix(&prefix1), parse_prefix(&prefix2)))
                    .await?;
                println!("deleted annotations between {prefix1} and {prefix2}");
            }
            AnnotationCommands::Status { prefix1, prefix2 } => {
                let status = orchestrator
                    .annotation_status((parse_prefix(&prefix1), parse_prefix(&prefix2)))
                    .await?;
                println!("{status:?}");
            }
        },
        Commands::Similarity { command } => match command {
            SimilarityCommands::Calculate {
                method,
                prefix,
                corpus,
                threshold,
            } => {
                let count = orchestrator
                    .calculate_similarity(
                        parse_method(&method),
                        parse_prefix(&prefix),
                        corpus.map(|c| parse_prefix(&c)),
                        threshold,
                    )
                    .await?;
                println!("wrote {count} similarity edges for {prefix}");
            }
        },
    }

    Ok(())
}
