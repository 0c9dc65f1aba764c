//! Écriture d'une table en mémoire vers PostgreSQL/PostGIS
//!
//! Existence, DROP, CREATE et COPY s'exécutent dans une seule transaction:
//! un échec laisse la destination inchangée.

use std::fmt;
use std::time::Instant;

use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};
use deadpool_postgres::Object;
use futures::SinkExt;
use geotable::{DataTable, ValueType};
use tokio_postgres::Transaction;
use tracing::{debug, info, warn};

use super::pg_types::{quote_ident, value_type_to_column_type, write_csv_value, ColumnType};
use super::pool::{create_pool, DatabaseConfig};
use crate::report::{TableAction, WriteReport};

/// Taille des chunks envoyés au flux COPY
const COPY_CHUNK_BYTES: usize = 1 << 20;

/// Nom de table, éventuellement qualifié par un schéma (`schema.table`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub table: String,
}

impl TableName {
    pub fn parse(name: &str) -> Result<Self> {
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (Some(schema.trim()), table.trim()),
            None => (None, name.trim()),
        };

        if table.is_empty() || table.contains('.') || schema.is_some_and(str::is_empty) {
            anyhow::bail!("Invalid table name: '{}'", name);
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => f.write_str(&quote_ident(&self.table)),
        }
    }
}

/// Écrit une table dans la base `database` (celle du descripteur si vide).
///
/// * table absente: création
/// * table existante et `new_table`: suppression puis recréation
/// * table existante sinon: réutilisation, chaque colonne source doit y exister
///
/// Ne retourne jamais d'erreur: l'échec éventuel est porté par le rapport.
pub async fn table_to_database(
    source: &DataTable,
    config: &DatabaseConfig,
    database: &str,
    table: &str,
    new_table: bool,
) -> WriteReport {
    let start = Instant::now();
    let config = if database.is_empty() {
        config.clone()
    } else {
        config.with_database(database)
    };

    let mut report = WriteReport::new(&config.dbname, table);
    match write_table(source, &config, table, new_table).await {
        Ok((action, rows)) => {
            report.succeed(action, rows);
            info!(
                database = %config.describe(),
                table = table,
                action = ?action,
                rows = rows,
                "Table written"
            );
        }
        Err(e) => {
            warn!(
                database = %config.describe(),
                table = table,
                error = %format!("{:#}", e),
                "Table write failed, nothing committed"
            );
            report.fail(&e);
        }
    }
    report.set_duration(start.elapsed());
    report
}

async fn write_table(
    source: &DataTable,
    config: &DatabaseConfig,
    table: &str,
    new_table: bool,
) -> Result<(TableAction, u64)> {
    let target = TableName::parse(table)?;
    let definitions = column_definitions(source)?;

    let pool = create_pool(config).await?;
    let mut client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;

    if has_spatial_column(source) {
        ensure_postgis(&client).await?;
    }

    let tx = client
        .transaction()
        .await
        .context("Failed to begin transaction")?;

    let exists = table_exists(&tx, &target).await?;
    let action = match (exists, new_table) {
        (true, true) => {
            tx.execute(&format!("DROP TABLE {}", target), &[])
                .await
                .with_context(|| format!("Failed to drop table {}", target))?;
            create_table(&tx, &target, &definitions).await?;
            TableAction::Recreated
        }
        (false, _) => {
            create_table(&tx, &target, &definitions).await?;
            TableAction::Created
        }
        (true, false) => {
            check_columns(&tx, &target, source).await?;
            TableAction::Reused
        }
    };
    debug!(table = %target, action = ?action, "Destination table ready");

    let rows = copy_rows(&tx, &target, source).await?;

    tx.commit().await.context("Failed to commit transaction")?;
    Ok((action, rows))
}

/// Définitions `(nom, type)` des colonnes de la table source
fn column_definitions(source: &DataTable) -> Result<Vec<(String, ColumnType)>> {
    source
        .columns()
        .iter()
        .map(|c| {
            value_type_to_column_type(c.data_type)
                .map(|ty| (c.name.clone(), ty))
                .with_context(|| format!("Column '{}' cannot be written", c.name))
        })
        .collect()
}

/// Active PostGIS si nécessaire (peut nécessiter des droits superuser).
///
/// Si l'extension existe déjà mais ne peut pas être (re)créée, on continue.
async fn ensure_postgis(client: &Object) -> Result<()> {
    match client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !exists {
                anyhow::bail!("PostGIS extension is not installed and could not be created: {e}");
            }
            Ok(())
        }
    }
}

async fn table_exists(tx: &Transaction<'_>, target: &TableName) -> Result<bool> {
    let row = tx
        .query_one(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = COALESCE($1::text, current_schema()::text)
                  AND table_name = $2::text
            )",
            &[&target.schema, &target.table],
        )
        .await
        .with_context(|| format!("Failed to check existence of {}", target))?;
    Ok(row.get(0))
}

async fn create_table(
    tx: &Transaction<'_>,
    target: &TableName,
    definitions: &[(String, ColumnType)],
) -> Result<()> {
    let columns: Vec<String> = definitions
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty))
        .collect();
    let sql = format!("CREATE TABLE {} ({})", target, columns.join(", "));

    tx.execute(&sql, &[])
        .await
        .with_context(|| format!("Failed to create table {}", target))?;

    info!("Created table {}", target);
    Ok(())
}

/// Vérifie que chaque colonne source existe dans la table réutilisée
async fn check_columns(tx: &Transaction<'_>, target: &TableName, source: &DataTable) -> Result<()> {
    let rows = tx
        .query(
            "SELECT column_name::text FROM information_schema.columns
             WHERE table_schema = COALESCE($1::text, current_schema()::text)
               AND table_name = $2::text",
            &[&target.schema, &target.table],
        )
        .await
        .with_context(|| format!("Failed to read columns of {}", target))?;
    let existing: Vec<String> = rows.iter().map(|r| r.get(0)).collect();

    let missing: Vec<&str> = source
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| !existing.iter().any(|e| e == name))
        .collect();

    if !missing.is_empty() {
        anyhow::bail!(
            "Table {} has no column(s) {}; use a new table to replace it",
            target,
            missing.join(", ")
        );
    }
    Ok(())
}

/// Copie toutes les lignes via `COPY ... FROM STDIN (FORMAT csv)`
async fn copy_rows(tx: &Transaction<'_>, target: &TableName, source: &DataTable) -> Result<u64> {
    if source.is_empty() || source.column_count() == 0 {
        return Ok(0);
    }

    let columns: Vec<String> = source.columns().iter().map(|c| quote_ident(&c.name)).collect();
    let copy_sql = format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, DELIMITER ',', QUOTE '\"', ESCAPE '\"', NULL '')",
        target,
        columns.join(", ")
    );

    let copy_in = tx.copy_in(&copy_sql).await.context("Failed to start COPY")?;
    let mut pinned = std::pin::pin!(copy_in);

    let mut buf = BytesMut::with_capacity(COPY_CHUNK_BYTES);
    let mut line = String::new();
    for (index, row) in source.rows().iter().enumerate() {
        line.clear();
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            write_csv_value(&mut line, value)
                .with_context(|| format!("Failed to encode row {}", index))?;
        }
        line.push('\n');
        buf.put_slice(line.as_bytes());

        if buf.len() >= COPY_CHUNK_BYTES {
            pinned
                .as_mut()
                .send(buf.split().freeze())
                .await
                .context("Failed to send COPY chunk")?;
        }
    }

    if !buf.is_empty() {
        pinned
            .as_mut()
            .send(buf.split().freeze())
            .await
            .context("Failed to send COPY chunk")?;
    }

    let rows = pinned.as_mut().finish().await.context("Failed to finish COPY")?;
    Ok(rows)
}

/// Vrai si la table contient une colonne spatiale
pub fn has_spatial_column(source: &DataTable) -> bool {
    source
        .columns()
        .iter()
        .any(|c| matches!(c.data_type, ValueType::Geometry | ValueType::Geography))
}
