//! # geotable
//!
//! Lecture de shapefiles et tables de données spatiales en mémoire.
//!
//! ## Features
//!
//! - Parser SHP/DBF/PRJ/CPG sans dépendance native
//! - Tables typées (attributs + colonnes geometry / geography)
//! - Feature sets (géométrie + ligne d'attributs)
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geotable::{services, shape_to_table, GeometryServices};
//! use std::path::Path;
//!
//! services::init(GeometryServices::default())?;
//!
//! let conversion = shape_to_table(Path::new("communes.shp"), 4326, "geog", true);
//! let table = conversion.into_result()?;
//! println!("{} lignes, {} colonnes", table.row_count(), table.column_count());
//! ```

pub mod convert;
pub mod error;
pub mod feature;
pub mod parser;
pub mod reader;
pub mod services;
pub mod spatial;
pub mod table;
pub mod types;

pub use convert::{feature_set_to_table, shape_to_table, ShapeConversion};
pub use error::GeoTableError;
pub use feature::{Feature, FeatureSet};
pub use reader::ShapefileReader;
pub use services::GeometryServices;
pub use spatial::{FeatureType, SpatialKind, SpatialValue};
pub use table::{DataColumn, DataTable, Value, ValueType};
pub use types::{BoundingBox, ShapeType, ShapefileHeaderInfo};

use std::path::Path;

/// Lit les métadonnées d'en-tête d'un shapefile (.shp + .dbf).
///
/// # Errors
///
/// Retourne `GeoTableError` si un des fichiers est absent ou illisible.
pub fn read_header_info(path: &Path) -> Result<ShapefileHeaderInfo, GeoTableError> {
    let reader = ShapefileReader::open(path)?;
    let shp = reader.shp_header();
    let dbf = reader.dbf_header();

    Ok(ShapefileHeaderInfo {
        bounds: shp.bounds,
        shape_type: shp.shape_type,
        file_length: shp.file_length,
        num_fields: dbf.fields.len(),
        num_records: dbf.num_records,
        last_update: dbf.last_update,
    })
}
