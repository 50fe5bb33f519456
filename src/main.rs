use anyhow::Result;
use clap::{Parser, Subcommand};
use graphrag::db::Db;
use graphrag::extract::{EntityExtractor, PromptTemplate};
use graphrag::graph::{ExpandOptions, Expander, SqliteGraphStore, UpsertEngine};
use graphrag::index::SqliteSimilarityIndex;
use graphrag::llm::{Embedder, GenerationService, OllamaClient};
use graphrag::{Config, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "graphrag")]
#[command(about = "Knowledge graph extraction and retrieval over a local model")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract a knowledge graph from text and merge it into the database
    Ingest {
        /// File to ingest; reads stdin when omitted
        file: Option<PathBuf>,

        /// Source label substituted into the extraction prompt
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Retrieve ranked relationships for a question
    Query {
        /// The question text
        text: String,
    },
    /// Verify database schema
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());

    // Initialize database and run migrations
    let db = Arc::new(Db::new(config.db_path()));
    db.migrate().await?;
    log::info!("Database initialized");

    match cli.command {
        Commands::Ingest { file, source } => {
            run_ingest(&config, db, file, source).await?;
        }
        Commands::Query { text } => {
            run_query(&config, db, &text).await?;
        }
        Commands::Verify => {
            run_schema_verification(&db).await?;
        }
    }

    Ok(())
}

/// Wire the model backends, stores and pipeline from configuration.
/// `source` labels where the content under extraction came from.
fn build_pipeline(config: &Config, db: Arc<Db>, source: &str) -> Pipeline {
    let client = Arc::new(OllamaClient::new(
        config.generation.base_url.clone(),
        config.generation.model.clone(),
        config.embeddings.model.clone(),
        config.generation.temperature,
        config.generation.timeout_secs,
    ));
    let generation: Arc<dyn GenerationService> = client.clone();
    let embedder: Arc<dyn Embedder> = client;

    let store = Arc::new(SqliteGraphStore::new(db.clone()));
    let index = Arc::new(SqliteSimilarityIndex::new(
        db,
        embedder,
        config.embeddings.cache_capacity,
    ));

    let extractor = EntityExtractor::new(
        generation,
        PromptTemplate::new(config.generation.template.clone()),
        source,
    );
    let engine = UpsertEngine::new(store.clone(), index.clone());
    let expander = Expander::new(
        store,
        index,
        ExpandOptions {
            seed_k: config.retrieval.seed_k,
            limit: config.retrieval.per_seed_limit,
        },
    );

    Pipeline::new(extractor, engine, expander, config.retrieval.global_cap)
}

/// Ingest one file (or stdin) through extraction into the graph
async fn run_ingest(
    config: &Config,
    db: Arc<Db>,
    file: Option<PathBuf>,
    source: Option<String>,
) -> Result<()> {
    let (input, label) = match &file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            (content, label)
        }
        None => (std::io::read_to_string(std::io::stdin())?, "stdin".to_string()),
    };
    let label = source.unwrap_or(label);

    log::info!("Ingesting {} bytes from {}", input.len(), label);
    let pipeline = build_pipeline(config, db, &label);
    let report = pipeline.ingest(&input).await?;

    if report.malformed > 0 {
        log::warn!("Some lines could not be parsed. Check logs above for details.");
    }

    Ok(())
}

/// Retrieve ranked relationship context for a question
async fn run_query(config: &Config, db: Arc<Db>, text: &str) -> Result<()> {
    let pipeline = build_pipeline(config, db, "query");
    let relationships = pipeline.retrieve(text).await?;

    if relationships.is_empty() {
        log::warn!("No relationships found for this query.");
        return Ok(());
    }

    log::info!("Retrieved {} relationships", relationships.len());
    for ranked in &relationships {
        println!("{:.4}  {}", ranked.score, ranked.edge);
    }

    Ok(())
}

/// Verify that all expected database objects exist
async fn run_schema_verification(db: &Db) -> Result<()> {
    use graphrag::db::migrate;
    use graphrag::error::GraphRagError;

    log::info!("Starting graphrag v{}", env!("CARGO_PKG_VERSION"));

    db.with_connection(|conn| {
        // Check tables
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = vec!["edges", "index_entries", "nodes", "schema_migrations"];
        let mut all_tables_exist = true;

        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }

        if !all_tables_exist {
            return Err(GraphRagError::Config("Not all required tables exist".to_string()));
        }

        // Check the reverse-direction edge index
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='index' AND name='idx_edges_target'")?;
        let index_exists: bool = stmt.exists([])?;
        if !index_exists {
            return Err(GraphRagError::Config("Index 'idx_edges_target' does not exist".to_string()));
        }
        log::debug!("✓ Edge target index exists");

        // Check migrations
        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < 2 {
            return Err(GraphRagError::Config(format!("Expected at least 2 migrations, found {}", applied.len())));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        // Check pragmas
        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(GraphRagError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }
        log::debug!("✓ Journal mode: WAL");

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(GraphRagError::Config("Foreign keys not enabled".to_string()));
        }
        log::debug!("✓ Foreign keys enabled");

        // Integrity check
        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(GraphRagError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
