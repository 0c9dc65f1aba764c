//! Collection de features en mémoire (géométrie + ligne d'attributs)

use crate::spatial::{FeatureType, SpatialValue};
use crate::table::{check_type, DataColumn, DataTable, Value};
use crate::GeoTableError;

/// Une feature: une valeur spatiale et une ligne d'attributs alignée sur les colonnes du set
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Géométrie (absente si la source n'a pas de colonne spatiale ou une forme nulle)
    pub geometry: Option<SpatialValue>,

    /// Valeurs d'attributs, dans l'ordre des colonnes du set
    pub row: Vec<Value>,
}

/// Collection de features partageant un même schéma d'attributs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    feature_type: FeatureType,
    columns: Vec<DataColumn>,
    features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(feature_type: FeatureType, columns: Vec<DataColumn>) -> Self {
        Self {
            feature_type,
            columns,
            features: Vec::new(),
        }
    }

    pub fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Ajoute une feature; la ligne doit avoir exactement une valeur par colonne,
    /// du type de la colonne ou `Null`
    pub fn add_feature(
        &mut self,
        geometry: Option<SpatialValue>,
        row: Vec<Value>,
    ) -> Result<&Feature, GeoTableError> {
        if row.len() != self.columns.len() {
            return Err(GeoTableError::RowWidth {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(&row) {
            check_type(column, value)?;
        }

        self.features.push(Feature { geometry, row });
        Ok(&self.features[self.features.len() - 1])
    }

    /// Table des attributs (sans la géométrie), schéma conservé
    pub fn attribute_table(&self) -> Result<DataTable, GeoTableError> {
        let mut table = DataTable::with_columns(self.columns.clone())?;
        for feature in &self.features {
            table.add_row(feature.row.clone())?;
        }
        Ok(table)
    }
}
