//! Définition et implémentation des commandes CLI
//!
//! - `header`: métadonnées d'en-tête d'un shapefile (JSON)
//! - `import`: shapefile → table → PostgreSQL
//! - `query`: requête SQL → features (résumé, export GeoJSON optionnel)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use geotable::{read_header_info, shape_to_table};
use spatial_helper::export::export_to_geojson;
use spatial_helper::{query_to_feature_set, table_to_database, DatabaseConfig};

#[derive(Subcommand)]
pub enum Commands {
    /// Print shapefile header metadata as JSON
    Header {
        /// Path to the .shp file
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Load a shapefile into a PostgreSQL/PostGIS table
    ///
    /// Logical (L) dBASE fields have no destination column type: a shapefile
    /// carrying one is rejected before anything is written to the database.
    Import(ImportArgs),

    /// Run a query and load its rows as features
    Query {
        /// SQL query (the first geometry/geography column becomes the feature geometry)
        #[arg(long)]
        sql: String,

        /// Write the features to this GeoJSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        pg: PgArgs,
    },
}

#[derive(Args)]
pub struct ImportArgs {
    /// Path to the .shp file
    #[arg(short, long)]
    pub path: PathBuf,

    /// Destination table (optionally schema-qualified: schema.table)
    #[arg(short, long)]
    pub table: String,

    /// SRID of the spatial column; a positive value creates a geography column
    #[arg(long, default_value_t = 4326)]
    pub srid: i32,

    /// Name of the spatial column
    #[arg(long, default_value = "geom")]
    pub column: String,

    /// Reverse polygon ring orientation (geography only)
    #[arg(long)]
    pub reorient: bool,

    /// Drop and recreate the destination table if it exists
    #[arg(long)]
    pub new_table: bool,

    /// Save the write report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub pg: PgArgs,
}

/// Paramètres de connexion (surchargent les variables PG*)
#[derive(Args)]
pub struct PgArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / postgres)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

impl PgArgs {
    /// Configuration d'environnement + surcharges de la ligne de commande
    pub fn resolve(self) -> DatabaseConfig {
        let mut config = DatabaseConfig::from_env();
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(database) = self.database {
            config.dbname = database;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ssl) = self.ssl {
            match ssl.parse() {
                Ok(mode) => config.ssl_mode = mode,
                Err(e) => warn!("{}", e),
            }
        }
        config
    }
}

/// Exécute la commande header
pub fn cmd_header(path: &Path) -> Result<()> {
    let info = read_header_info(path)
        .with_context(|| format!("Failed to read shapefile header: {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Exécute la commande import
pub async fn cmd_import(args: ImportArgs) -> Result<()> {
    info!(
        path = %args.path.display(),
        table = %args.table,
        srid = args.srid,
        column = %args.column,
        new_table = args.new_table,
        "Starting import"
    );

    let table = shape_to_table(&args.path, args.srid, &args.column, args.reorient)
        .into_result()
        .with_context(|| format!("Failed to convert shapefile: {}", args.path.display()))?;

    let config = args.pg.resolve();
    println!(
        "Database: {} (SSL: {})",
        config.describe(),
        config.ssl_mode
    );

    let report = table_to_database(&table, &config, &config.dbname, &args.table, args.new_table).await;
    report.display();

    if let Some(path) = &args.report {
        report.save_to_file(path)?;
        info!(path = %path.display(), "Report saved");
    }

    if !report.is_ok() {
        anyhow::bail!("Import failed: {}", report.summary());
    }
    Ok(())
}

/// Exécute la commande query
pub async fn cmd_query(sql: &str, output: Option<&Path>, pg: PgArgs) -> Result<()> {
    let config = pg.resolve();

    let Some(set) = query_to_feature_set(&config, sql).await? else {
        println!("No rows");
        return Ok(());
    };

    println!(
        "{} features ({:?}), {} attribute columns",
        set.len(),
        set.feature_type(),
        set.columns().len()
    );
    for column in set.columns() {
        println!("  {}: {:?}", column.name, column.data_type);
    }

    if let Some(output) = output {
        export_to_geojson(&set, output)?;
        println!("Written to {}", output.display());
    }
    Ok(())
}
