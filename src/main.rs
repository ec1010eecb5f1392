//! CLI entry point for semsql.
//!
//! Builds the flat index from a SQLite database and runs searches against
//! it, either directly or through the registered SQL functions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use semsql::display::{
    THEME, create_build_table, create_results_table, create_stats_table, with_spinner,
};
use semsql::io::ExitCode;
use semsql::sql::{build_status_json, hits_json, stats_json};
use semsql::vector::blob::encode_f32_blob;
use semsql::{
    BuildOutcome, ChunkId, ExtensionError, IndexStatus, SearchHit, Settings,
    SqliteEmbeddingSource, VectorSearchEngine, register_functions,
};
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic search over SQLite chunk embeddings
#[derive(Parser)]
#[command(
    name = "semsql",
    version = env!("CARGO_PKG_VERSION"),
    about = "Exact nearest-neighbor search over SQLite chunk embeddings",
    long_about = "Build a flat L2 index from embeddings stored in SQLite and query it by text, by vector, or through SQL functions.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database holding the chunk embeddings (overrides settings)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .semsql directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Build the index and report what was loaded
    #[command(about = "Build the index from the database")]
    Build {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Search chunks by text
    #[command(
        about = "Find the chunks nearest to a text query",
        after_help = "Examples:\n  semsql search \"error handling\"\n  semsql search \"error handling\" -k 10 --json"
    )]
    Search {
        /// Query text
        query: String,

        /// Number of results (defaults to index.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Find chunks similar to an indexed chunk
    #[command(about = "Find the chunks nearest to an already indexed chunk")]
    Similar {
        /// Id of the indexed chunk
        chunk_id: i64,

        /// Number of results (defaults to index.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    #[command(about = "Build the index and show its statistics")]
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Encode text with the configured encoder
    #[command(about = "Print the embedding of a text")]
    Encode {
        /// Text to encode
        text: String,

        /// Print the packed little-endian f32 blob as hex
        #[arg(long)]
        hex: bool,
    },

    /// Run SQL with the search functions registered
    #[command(
        about = "Execute a SQL statement with the search functions available",
        after_help = "Examples:\n  semsql sql \"SELECT vec_build_index()\"\n  semsql sql \"SELECT vec_build_index(), vec_search('connection pooling', 3)\""
    )]
    Sql {
        /// Statement to execute
        statement: String,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", THEME.error_with_icon(&format!("Configuration error: {e}")));
            return ExitCode::ConfigError.into();
        }
    };

    init_tracing(cli.debug || settings.debug);

    match run(cli, settings) {
        Ok(code) => code.into(),
        Err(err) => {
            report_error(&err);
            exit_code_for(&err).into()
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<figment::Error>> {
    match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, settings: Settings) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { force } => {
            let dir = std::env::current_dir().context("Failed to read current directory")?;
            match Settings::init_config_file(&dir, force) {
                Ok(path) => {
                    println!(
                        "{}",
                        THEME.success_with_icon(&format!(
                            "Created configuration file at: {}",
                            path.display()
                        ))
                    );
                    println!("Edit this file to customize your settings.");
                    Ok(ExitCode::Success)
                }
                Err(e) => {
                    eprintln!("{}", THEME.error_with_icon(&e.to_string()));
                    Ok(ExitCode::ConfigError)
                }
            }
        }

        Commands::Config => {
            println!("{}", THEME.apply(&THEME.header, "Current Configuration:"));
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(ExitCode::Success)
        }

        Commands::Build { json } => {
            let conn = open_database(cli.db, &settings)?;
            let engine = VectorSearchEngine::from_settings(&settings)?;
            let outcome = build_index(&engine, &conn, &settings)?;

            if json {
                println!("{}", build_status_json(&outcome)?);
            } else {
                match &outcome {
                    BuildOutcome::Built(report) => {
                        println!("{}", THEME.success_with_icon("Index built"));
                        println!("{}", create_build_table(report));
                    }
                    BuildOutcome::NoData { skipped_rows } => warn_no_data(*skipped_rows),
                }
            }
            Ok(ExitCode::from_build_outcome(&outcome))
        }

        Commands::Search { query, top_k, json } => {
            let conn = open_database(cli.db, &settings)?;
            let engine = VectorSearchEngine::from_settings(&settings)?;
            if let BuildOutcome::NoData { skipped_rows } = build_index(&engine, &conn, &settings)? {
                warn_no_data(skipped_rows);
                return Ok(ExitCode::NotFound);
            }

            let hits = engine.search_by_text(&query, top_k)?;
            print_hits(&hits, json)?;
            Ok(ExitCode::Success)
        }

        Commands::Similar {
            chunk_id,
            top_k,
            json,
        } => {
            let conn = open_database(cli.db, &settings)?;
            let engine = VectorSearchEngine::from_settings(&settings)?;
            if let BuildOutcome::NoData { skipped_rows } = build_index(&engine, &conn, &settings)? {
                warn_no_data(skipped_rows);
                return Ok(ExitCode::NotFound);
            }

            let hits = engine.search_by_chunk(ChunkId::new(chunk_id), top_k)?;
            print_hits(&hits, json)?;
            Ok(ExitCode::Success)
        }

        Commands::Stats { json } => {
            let conn = open_database(cli.db, &settings)?;
            let engine = VectorSearchEngine::from_settings(&settings)?;
            let outcome = build_index(&engine, &conn, &settings)?;
            let status = engine.status();

            if json {
                println!("{}", stats_json(&status)?);
            } else {
                match &status {
                    IndexStatus::Built(stats) => println!("{}", create_stats_table(stats)),
                    IndexStatus::NotBuilt => {
                        if let BuildOutcome::NoData { skipped_rows } = &outcome {
                            warn_no_data(*skipped_rows);
                        }
                    }
                }
            }
            Ok(ExitCode::from_build_outcome(&outcome))
        }

        Commands::Encode { text, hex } => {
            let engine = VectorSearchEngine::from_settings(&settings)?;
            let embedding = engine.encode_text(&text)?;
            if hex {
                println!("{}", to_hex(&encode_f32_blob(&embedding)));
            } else {
                println!("{}", serde_json::to_string(&embedding)?);
            }
            Ok(ExitCode::Success)
        }

        Commands::Sql { statement } => {
            let conn = open_database(cli.db, &settings)?;
            let engine = Arc::new(VectorSearchEngine::from_settings(&settings)?);
            register_functions(&conn, engine, &settings.sql, &settings.source)?;
            run_statement(&conn, &statement)?;
            Ok(ExitCode::Success)
        }
    }
}

fn open_database(db: Option<PathBuf>, settings: &Settings) -> Result<Connection> {
    let path = db
        .or_else(|| settings.database.clone())
        .ok_or_else(|| ExtensionError::Config {
            reason: "No database configured. Pass --db or set `database` in settings.toml"
                .to_string(),
        })?;
    tracing::debug!(path = %path.display(), "opening database");
    Connection::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn build_index(
    engine: &VectorSearchEngine,
    conn: &Connection,
    settings: &Settings,
) -> Result<BuildOutcome> {
    let source =
        SqliteEmbeddingSource::new(conn, &settings.source).map_err(ExtensionError::from)?;
    let outcome = with_spinner("Building index", || engine.build_from(&source))?;
    Ok(outcome)
}

fn warn_no_data(skipped_rows: usize) {
    eprintln!(
        "{}",
        THEME.warning_with_icon(&format!(
            "No embeddings found ({skipped_rows} rows skipped)"
        ))
    );
}

fn print_hits(hits: &[SearchHit], json: bool) -> Result<()> {
    if json {
        println!("{}", hits_json(hits)?);
    } else if hits.is_empty() {
        println!("{}", THEME.apply(&THEME.dim, "No results"));
    } else {
        println!("{}", create_results_table(hits));
    }
    Ok(())
}

fn run_statement(conn: &Connection, statement: &str) -> Result<()> {
    let mut stmt = conn.prepare(statement)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values = (0..columns)
            .map(|i| row.get_ref(i).map(format_value))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        println!("{}", values.join("\t"));
    }
    Ok(())
}

fn format_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => format!("x'{}'", to_hex(bytes)),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn report_error(err: &anyhow::Error) {
    eprintln!("{}", THEME.error_with_icon(&format!("{err:#}")));
    if let Some(ext) = err.downcast_ref::<ExtensionError>() {
        for suggestion in ext.recovery_suggestions() {
            eprintln!("  {}", THEME.apply(&THEME.dim, suggestion));
        }
    }
    tracing::debug!(error = ?err, "command failed");
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(ext) = err.downcast_ref::<ExtensionError>() {
        ExitCode::from_error(ext)
    } else if err.downcast_ref::<rusqlite::Error>().is_some() {
        ExitCode::StorageError
    } else {
        ExitCode::GeneralError
    }
}
