//! Table de données générique: colonnes nommées et typées, lignes alignées sur les colonnes

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::spatial::{SpatialKind, SpatialValue};
use crate::GeoTableError;

/// Types de valeurs supportés par une colonne
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    Float,
    Decimal,
    Text,
    DateTime,
    Int32,
    Int64,
    Boolean,
    Geometry,
    Geography,
}

/// Valeur d'une cellule
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Float(f64),
    /// Décimal exact, conservé sous forme textuelle (ex: "-12.50")
    Decimal(String),
    Text(String),
    DateTime(NaiveDateTime),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    Spatial(SpatialValue),
}

impl Value {
    /// Type de la valeur (`None` pour `Null`)
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Float(_) => Some(ValueType::Float),
            Value::Decimal(_) => Some(ValueType::Decimal),
            Value::Text(_) => Some(ValueType::Text),
            Value::DateTime(_) => Some(ValueType::DateTime),
            Value::Int32(_) => Some(ValueType::Int32),
            Value::Int64(_) => Some(ValueType::Int64),
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::Spatial(s) => Some(match s.kind {
                SpatialKind::Geometry => ValueType::Geometry,
                SpatialKind::Geography => ValueType::Geography,
            }),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_spatial(&self) -> Option<&SpatialValue> {
        match self {
            Value::Spatial(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(v) | Value::Text(v) => f.write_str(v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Spatial(v) => write!(f, "{}", v),
        }
    }
}

impl From<SpatialValue> for Value {
    fn from(value: SpatialValue) -> Self {
        Value::Spatial(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// Colonne d'une table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataColumn {
    pub name: String,
    pub data_type: ValueType,
}

impl DataColumn {
    pub fn new(name: impl Into<String>, data_type: ValueType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Table en mémoire
///
/// Chaque ligne a toujours exactement autant de valeurs que la table a de colonnes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<DataColumn>,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée une table vide avec le schéma donné
    pub fn with_columns(columns: Vec<DataColumn>) -> Result<Self, GeoTableError> {
        let mut table = Self::new();
        for column in columns {
            table.add_column(column.name, column.data_type)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index d'une colonne par nom (sensible à la casse)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Ajoute une colonne en fin de schéma; les lignes existantes reçoivent `Null`
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        data_type: ValueType,
    ) -> Result<usize, GeoTableError> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(GeoTableError::DuplicateColumn(name));
        }

        self.columns.push(DataColumn { name, data_type });
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        Ok(self.columns.len() - 1)
    }

    /// Ajoute une ligne. Une ligne partielle est complétée par des `Null`.
    pub fn add_row(&mut self, mut values: Vec<Value>) -> Result<usize, GeoTableError> {
        if values.len() > self.columns.len() {
            return Err(GeoTableError::RowWidth {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(&values) {
            check_type(column, value)?;
        }

        values.resize(self.columns.len(), Value::Null);
        self.rows.push(values);
        Ok(self.rows.len() - 1)
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Remplace la valeur d'une cellule
    pub fn set_value(&mut self, row: usize, column: usize, value: Value) -> Result<(), GeoTableError> {
        let row_count = self.rows.len();
        let col = self
            .columns
            .get(column)
            .ok_or_else(|| GeoTableError::UnknownColumn(format!("#{}", column)))?;
        check_type(col, &value)?;

        let cells = self.rows.get_mut(row).ok_or(GeoTableError::RowOutOfRange {
            index: row,
            count: row_count,
        })?;
        cells[column] = value;
        Ok(())
    }

    /// Remplace la valeur d'une cellule désignée par le nom de colonne
    pub fn set_named(&mut self, row: usize, column: &str, value: Value) -> Result<(), GeoTableError> {
        let index = self
            .column_index(column)
            .ok_or_else(|| GeoTableError::UnknownColumn(column.to_string()))?;
        self.set_value(row, index, value)
    }
}

pub(crate) fn check_type(column: &DataColumn, value: &Value) -> Result<(), GeoTableError> {
    match value.value_type() {
        None => Ok(()),
        Some(actual) if actual == column.data_type => Ok(()),
        Some(actual) => Err(GeoTableError::TypeMismatch {
            column: column.name.clone(),
            expected: column.data_type,
            actual,
        }),
    }
}
