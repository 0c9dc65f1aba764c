//! Conversions shapefile → table et feature set → table

use std::path::Path;

use tracing::{info, warn};

use crate::feature::FeatureSet;
use crate::reader::ShapefileReader;
use crate::spatial::{SpatialKind, SpatialValue};
use crate::table::{DataTable, Value, ValueType};
use crate::GeoTableError;

/// Résultat d'une conversion shapefile → table
///
/// La conversion ne s'interrompt jamais par une erreur remontée: en cas d'échec,
/// `table` contient ce qui a pu être construit et `error` la cause.
#[derive(Debug)]
pub struct ShapeConversion {
    pub table: DataTable,
    pub error: Option<GeoTableError>,
}

impl ShapeConversion {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<DataTable, GeoTableError> {
        match self.error {
            None => Ok(self.table),
            Some(e) => Err(e),
        }
    }
}

/// Copie la table attributaire d'un shapefile et y ajoute une colonne spatiale.
///
/// * `srid > 0`: colonne geography étiquetée avec ce SRID
/// * sinon: colonne geometry
///
/// `reorient_ring` inverse le sens des anneaux (geography uniquement).
pub fn shape_to_table(
    path: &Path,
    srid: i32,
    spatial_column: &str,
    reorient_ring: bool,
) -> ShapeConversion {
    let mut table = DataTable::new();
    let error = fill_table(&mut table, path, srid, spatial_column, reorient_ring).err();

    match &error {
        None => info!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.column_count(),
            "Shapefile converted to table"
        ),
        Some(e) => warn!(
            path = %path.display(),
            rows = table.row_count(),
            error = %e,
            "Shapefile conversion aborted"
        ),
    }

    ShapeConversion { table, error }
}

fn fill_table(
    table: &mut DataTable,
    path: &Path,
    srid: i32,
    spatial_column: &str,
    reorient_ring: bool,
) -> Result<(), GeoTableError> {
    let reader = ShapefileReader::open(path)?;
    let set = reader.read_feature_set()?;

    *table = set.attribute_table()?;

    let (kind, column_type) = if srid > 0 {
        (SpatialKind::Geography, ValueType::Geography)
    } else {
        (SpatialKind::Geometry, ValueType::Geometry)
    };
    let column = table.add_column(spatial_column, column_type)?;

    for (i, feature) in set.features().iter().enumerate() {
        // Forme nulle: la cellule reste à Null
        let Some(geometry) = &feature.geometry else {
            continue;
        };

        let wkt = geometry.to_wkt()?;
        let mut value = SpatialValue::from_wkt(kind, &wkt, srid)?;
        if kind == SpatialKind::Geography && reorient_ring {
            value = value.reorient();
        }
        table.set_value(i, column, Value::Spatial(value))?;
    }

    Ok(())
}

/// Copie les lignes d'attributs d'un feature set dans une table générique.
///
/// Les colonnes sont nommées `Column1..N` et typées texte; seul le contenu est
/// conservé. Un feature set vide donne une table vide.
pub fn feature_set_to_table(set: &FeatureSet) -> Result<DataTable, GeoTableError> {
    let mut table = DataTable::new();
    let Some(first) = set.features().first() else {
        return Ok(table);
    };

    for i in 0..first.row.len() {
        table.add_column(format!("Column{}", i + 1), ValueType::Text)?;
    }

    for feature in set.features() {
        let row = feature
            .row
            .iter()
            .map(|v| match v {
                Value::Null => Value::Null,
                other => Value::Text(other.to_string()),
            })
            .collect();
        table.add_row(row)?;
    }

    Ok(table)
}
