//! Types de données pour la lecture des shapefiles

use chrono::NaiveDate;
use serde::Serialize;

use crate::table::ValueType;
use crate::GeoTableError;

/// Type de forme déclaré dans l'en-tête .shp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Result<Self, GeoTableError> {
        Ok(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            other => return Err(GeoTableError::UnsupportedShapeType(other)),
        })
    }

    /// Valeur de l'énumération telle qu'écrite dans le fichier
    pub fn code(self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
            ShapeType::MultiPatch => 31,
        }
    }

    /// Type 2D correspondant (les ordonnées Z/M sont ignorées)
    pub fn base(self) -> Self {
        match self {
            ShapeType::PointZ | ShapeType::PointM => ShapeType::Point,
            ShapeType::PolyLineZ | ShapeType::PolyLineM => ShapeType::PolyLine,
            ShapeType::PolygonZ | ShapeType::PolygonM => ShapeType::Polygon,
            ShapeType::MultiPointZ | ShapeType::MultiPointM => ShapeType::MultiPoint,
            other => other,
        }
    }
}

/// Emprise déclarée dans l'en-tête .shp
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub m_min: f64,
    pub m_max: f64,
}

/// En-tête du fichier .shp (100 octets)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShpHeader {
    /// Longueur totale du fichier, en mots de 16 bits
    pub file_length: i32,
    pub version: i32,
    pub shape_type: ShapeType,
    pub bounds: BoundingBox,
}

/// Type d'un champ dBASE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
    Integer,
    Double,
    Memo,
    Other(u8),
}

impl FieldType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'C' => FieldType::Character,
            b'N' => FieldType::Numeric,
            b'F' => FieldType::Float,
            b'L' => FieldType::Logical,
            b'D' => FieldType::Date,
            b'I' => FieldType::Integer,
            b'O' => FieldType::Double,
            b'M' => FieldType::Memo,
            other => FieldType::Other(other),
        }
    }
}

/// Descripteur de champ dBASE
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbfField {
    pub name: String,
    pub field_type: FieldType,
    pub length: u8,
    pub decimal_count: u8,
}

impl DbfField {
    /// Type de colonne utilisé dans les tables
    pub fn value_type(&self) -> ValueType {
        match self.field_type {
            FieldType::Numeric if self.decimal_count == 0 && self.length <= 9 => ValueType::Int32,
            FieldType::Numeric if self.decimal_count == 0 => ValueType::Decimal,
            FieldType::Numeric | FieldType::Float | FieldType::Double => ValueType::Float,
            FieldType::Integer => ValueType::Int32,
            FieldType::Logical => ValueType::Boolean,
            FieldType::Date => ValueType::DateTime,
            FieldType::Character | FieldType::Memo | FieldType::Other(_) => ValueType::Text,
        }
    }
}

/// En-tête du fichier .dbf
#[derive(Debug, Clone, PartialEq)]
pub struct DbfHeader {
    pub version: u8,
    /// Date de dernière mise à jour (absente si les octets sont invalides)
    pub last_update: Option<NaiveDate>,
    pub num_records: u32,
    pub header_length: u16,
    pub record_length: u16,
    /// Identifiant de pilote de langue (code page)
    pub language_driver: u8,
    pub fields: Vec<DbfField>,
}

/// Métadonnées d'en-tête d'un shapefile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapefileHeaderInfo {
    pub bounds: BoundingBox,
    pub shape_type: ShapeType,
    /// En mots de 16 bits, tel qu'écrit dans l'en-tête
    pub file_length: i32,
    pub num_fields: usize,
    pub num_records: u32,
    pub last_update: Option<NaiveDate>,
}
