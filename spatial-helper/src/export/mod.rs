//! Export de collections de features

pub mod geojson;

pub use geojson::export_to_geojson;
