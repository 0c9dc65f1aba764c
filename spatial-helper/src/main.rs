//! Point d'entrée CLI pour spatial-helper

use anyhow::Result;
use clap::Parser;
use geotable::{services, GeometryServices};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Échanger des données spatiales entre shapefiles, tables en mémoire et PostGIS
#[derive(Parser)]
#[command(name = "spatial-helper")]
#[command(author, version)]
#[command(about = "Charger des shapefiles dans PostGIS et importer des requêtes spatiales")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Coordinate precision (decimal places) applied to WKT output
    #[arg(long, global = true)]
    precision: Option<u8>,

    /// SRID assigned to decoded geometries that carry none
    #[arg(long, default_value_t = 0, global = true)]
    default_srid: i32,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let services = services::init(GeometryServices {
        precision: cli.precision,
        default_srid: cli.default_srid,
    })?;
    debug!(?services, "Geometry services ready");

    match cli.command {
        Commands::Header { path } => cli::cmd_header(&path)?,
        Commands::Import(args) => cli::cmd_import(args).await?,
        Commands::Query { sql, output, pg } => {
            cli::cmd_query(&sql, output.as_deref(), pg).await?
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
