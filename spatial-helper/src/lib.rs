//! # spatial-helper
//!
//! Échange de données spatiales entre PostgreSQL/PostGIS, shapefiles et
//! tables en mémoire (`geotable`).
//!
//! ## Features
//!
//! - Import d'une requête SQL en collection de features (geometry/geography décodés depuis l'EWKB)
//! - Écriture d'une table en mémoire vers PostgreSQL (création, recréation ou réutilisation, COPY en transaction)
//! - Export GeoJSON des collections de features
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # En-tête d'un shapefile
//! spatial-helper header --path ./communes.shp
//!
//! # Shapefile vers PostGIS (colonne geography en 4326, table recréée)
//! spatial-helper import --path ./communes.shp --table gis.communes --new-table --reorient
//!
//! # Requête vers GeoJSON
//! spatial-helper query --sql "SELECT id, geom FROM gis.communes" --output communes.geojson
//! ```

pub mod db;
pub mod export;
pub mod report;

pub use db::{
    create_pool, query_to_feature_set, table_to_database, value_type_to_column_type, ColumnType,
    DatabaseConfig, SslMode,
};
pub use export::export_to_geojson;
pub use report::{TableAction, WriteReport, WriteStatus};

/// Services géométriques par défaut pour les tests unitaires
#[cfg(test)]
pub(crate) fn init_test_services() {
    let _ = geotable::services::init(geotable::GeometryServices::default());
}
