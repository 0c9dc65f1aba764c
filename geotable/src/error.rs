//! Types d'erreurs pour le crate geotable

use thiserror::Error;

use crate::table::ValueType;

/// Erreurs pouvant survenir lors de la lecture d'un shapefile ou de la manipulation des tables
#[derive(Debug, Error)]
pub enum GeoTableError {
    /// Erreur d'I/O lors de la lecture d'un fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fichier compagnon manquant (.dbf, .shx...)
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// Structure binaire invalide
    #[error("Invalid {file} file: {reason}")]
    InvalidFile { file: &'static str, reason: String },

    /// Erreur de parsing d'une valeur
    #[error("Parse error in {file}: {reason}")]
    ParseError { file: String, reason: String },

    /// Type de forme non géré
    #[error("Unsupported shape type: {0}")]
    UnsupportedShapeType(i32),

    /// WKT illisible
    #[error("Invalid WKT: {0}")]
    Wkt(String),

    /// WKB / EWKB illisible
    #[error("Invalid WKB: {0}")]
    Wkb(String),

    /// Géographie hors bornes ou SRID invalide
    #[error("Invalid geography: {0}")]
    InvalidGeography(String),

    /// Colonne déjà présente dans la table
    #[error("Column already exists: {0}")]
    DuplicateColumn(String),

    /// Colonne absente de la table
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Ligne hors bornes
    #[error("Row index {index} out of range (row count {count})")]
    RowOutOfRange { index: usize, count: usize },

    /// Ligne plus large que le schéma
    #[error("Row has {got} values but table has {expected} columns")]
    RowWidth { expected: usize, got: usize },

    /// Valeur incompatible avec le type de colonne
    #[error("Column {column} expects {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// `services::init` n'a pas été appelé
    #[error("Geometry services are not initialized, call services::init first")]
    ServicesNotInitialized,

    /// `services::init` appelé deux fois
    #[error("Geometry services are already initialized")]
    ServicesAlreadyInitialized,
}

impl GeoTableError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse_error(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de structure de fichier
    pub fn invalid_file(file: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            file,
            reason: reason.into(),
        }
    }
}
