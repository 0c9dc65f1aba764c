//! Requête SQL → collection de features

use anyhow::{Context, Result};
use geotable::{services, DataColumn, FeatureSet, FeatureType, SpatialKind, SpatialValue, Value, ValueType};
use tokio_postgres::types::Type;
use tokio_postgres::Row;
use tracing::{debug, info, warn};

use super::pg_types::{classify, ColumnClass, PgValue};
use super::pool::{create_pool, DatabaseConfig};

/// Disposition d'un résultat de requête
///
/// La première colonne spatiale devient la géométrie des features; toutes
/// les autres colonnes sont des attributs, dans l'ordre de la requête.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultLayout {
    /// Index et nature de la colonne spatiale retenue
    pub spatial: Option<(usize, SpatialKind)>,
    /// Index source → index d'attribut
    pub mapper: Vec<(usize, usize)>,
    /// Colonnes d'attributs (colonne spatiale exclue)
    pub columns: Vec<DataColumn>,
}

impl ResultLayout {
    /// Construit la disposition à partir des métadonnées de colonnes
    pub fn new<'a>(columns: impl IntoIterator<Item = (&'a str, &'a Type)>) -> Result<Self> {
        let mut layout = ResultLayout {
            spatial: None,
            mapper: Vec::new(),
            columns: Vec::new(),
        };

        for (index, (name, ty)) in columns.into_iter().enumerate() {
            let class = classify(ty)
                .with_context(|| format!("Could not get column type for '{}' ({})", name, ty))?;

            let value_type = match class {
                ColumnClass::Spatial(kind) if layout.spatial.is_none() => {
                    layout.spatial = Some((index, kind));
                    continue;
                }
                ColumnClass::Spatial(kind) => {
                    warn!(column = name, "Extra spatial column kept as attribute");
                    match kind {
                        SpatialKind::Geometry => ValueType::Geometry,
                        SpatialKind::Geography => ValueType::Geography,
                    }
                }
                ColumnClass::Attribute(value_type) => value_type,
            };

            layout.mapper.push((index, layout.columns.len()));
            layout.columns.push(DataColumn::new(name, value_type));
        }

        Ok(layout)
    }

    /// Décode une ligne: (géométrie, attributs)
    fn decode(&self, row: &Row) -> Result<(Option<SpatialValue>, Vec<Value>)> {
        let geometry = match self.spatial {
            Some((index, _)) => match read_cell(row, index)? {
                Value::Spatial(value) => Some(value),
                _ => None,
            },
            None => None,
        };

        let mut values = vec![Value::Null; self.columns.len()];
        for &(source, target) in &self.mapper {
            values[target] = read_cell(row, source)?;
        }

        Ok((geometry, values))
    }
}

fn read_cell(row: &Row, index: usize) -> Result<Value> {
    let cell: PgValue = row
        .try_get(index)
        .with_context(|| format!("Failed to decode column {}", index))?;
    Ok(cell.into_inner())
}

/// Exécute une requête et retourne ses lignes sous forme de features.
///
/// `None` si la requête ne retourne aucune ligne. Les erreurs (connexion,
/// type de colonne non pris en charge, décodage) sont propagées.
pub async fn query_to_feature_set(config: &DatabaseConfig, sql: &str) -> Result<Option<FeatureSet>> {
    services::get()?;

    let pool = create_pool(config).await?;
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;

    let statement = client.prepare(sql).await.context("Failed to prepare query")?;
    let layout = ResultLayout::new(
        statement
            .columns()
            .iter()
            .map(|c| (c.name(), c.type_())),
    )?;

    debug!(
        database = %config.describe(),
        attributes = layout.columns.len(),
        spatial = ?layout.spatial,
        "Query layout resolved"
    );

    let rows = client
        .query(&statement, &[])
        .await
        .context("Query execution failed")?;

    if rows.is_empty() {
        info!("Query returned no rows");
        return Ok(None);
    }

    let mut decoded = Vec::with_capacity(rows.len());
    for row in &rows {
        decoded.push(layout.decode(row)?);
    }

    let feature_type = decoded
        .iter()
        .find_map(|(geometry, _)| geometry.as_ref())
        .map(SpatialValue::feature_type)
        .unwrap_or(FeatureType::Unspecified);

    let mut set = FeatureSet::new(feature_type, layout.columns);
    for (geometry, values) in decoded {
        set.add_feature(geometry, values)?;
    }

    info!(
        features = set.len(),
        columns = set.columns().len(),
        feature_type = ?set.feature_type(),
        "Query imported as feature set"
    );

    Ok(Some(set))
}
