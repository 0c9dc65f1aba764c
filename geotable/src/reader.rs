//! Lecture d'un shapefile et de ses fichiers compagnons (.shp, .dbf, .prj, .cpg)

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use geo::Geometry;
use tracing::debug;

use crate::feature::FeatureSet;
use crate::parser::{dbf, prj, shp};
use crate::spatial::{FeatureType, SpatialKind, SpatialValue};
use crate::table::{DataColumn, Value};
use crate::types::{DbfField, DbfHeader, ShapeType, ShpHeader};
use crate::{services, GeoTableError};

/// Shapefile chargé en mémoire
///
/// Les fichiers sont lus intégralement à l'ouverture puis refermés; les
/// enregistrements sont décodés à la demande.
#[derive(Debug)]
pub struct ShapefileReader {
    path: PathBuf,
    shp: Vec<u8>,
    dbf: Vec<u8>,
    shp_header: ShpHeader,
    dbf_header: DbfHeader,
    encoding: &'static Encoding,
    srid: Option<i32>,
}

impl ShapefileReader {
    /// Ouvre un shapefile (le chemin peut être donné avec ou sans extension)
    pub fn open(path: &Path) -> Result<Self, GeoTableError> {
        let shp_path = sibling(path, "shp")
            .ok_or_else(|| GeoTableError::MissingFile(path.with_extension("shp").display().to_string()))?;
        let dbf_path = sibling(path, "dbf")
            .ok_or_else(|| GeoTableError::MissingFile(path.with_extension("dbf").display().to_string()))?;

        let shp = std::fs::read(&shp_path)?;
        let dbf = std::fs::read(&dbf_path)?;
        let cpg = sibling(path, "cpg").map(std::fs::read).transpose()?;
        let prj = sibling(path, "prj").map(std::fs::read).transpose()?;

        let shp_header = shp::parse_header(&shp)?;
        let language_driver = dbf.get(29).copied().unwrap_or(0);
        let encoding = dbf::detect_encoding(cpg.as_deref(), language_driver);
        let dbf_header = dbf::parse_header(&dbf, encoding)?;
        let srid = prj.as_deref().and_then(prj::parse);

        debug!(
            path = %shp_path.display(),
            shape_type = ?shp_header.shape_type,
            records = dbf_header.num_records,
            fields = dbf_header.fields.len(),
            encoding = encoding.name(),
            srid = ?srid,
            "Opened shapefile"
        );

        Ok(Self {
            path: shp_path,
            shp,
            dbf,
            shp_header,
            dbf_header,
            encoding,
            srid,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shp_header(&self) -> &ShpHeader {
        &self.shp_header
    }

    pub fn dbf_header(&self) -> &DbfHeader {
        &self.dbf_header
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.dbf_header.fields
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// SRID déduit du fichier .prj
    pub fn detected_srid(&self) -> Option<i32> {
        self.srid
    }

    /// Géométries dans l'ordre du fichier (`None` pour les formes nulles)
    pub fn read_geometries(&self) -> Result<Vec<Option<Geometry>>, GeoTableError> {
        shp::parse_records(&self.shp)
    }

    /// Enregistrements attributaires dans l'ordre du fichier
    pub fn read_records(&self) -> Result<Vec<Vec<Value>>, GeoTableError> {
        dbf::parse_records(&self.dbf, &self.dbf_header, self.encoding)
    }

    /// Construit la collection de features (géométrie planaire, SRID du .prj)
    pub fn read_feature_set(&self) -> Result<FeatureSet, GeoTableError> {
        let services = services::get()?;
        let srid = self.srid.unwrap_or(services.default_srid);

        let geometries = self.read_geometries()?;
        let records = self.read_records()?;
        if geometries.len() != records.len() {
            return Err(GeoTableError::invalid_file(
                "dbf",
                format!(
                    "{} attribute records for {} shapes",
                    records.len(),
                    geometries.len()
                ),
            ));
        }

        let columns = self
            .fields()
            .iter()
            .map(|f| DataColumn::new(f.name.clone(), f.value_type()))
            .collect();
        let mut set = FeatureSet::new(feature_type_of(self.shp_header.shape_type), columns);

        for (geometry, row) in geometries.into_iter().zip(records) {
            let geometry = geometry
                .map(|g| SpatialValue::new(SpatialKind::Geometry, g, srid))
                .transpose()?;
            set.add_feature(geometry, row)?;
        }

        Ok(set)
    }
}

fn feature_type_of(shape_type: ShapeType) -> FeatureType {
    match shape_type.base() {
        ShapeType::Point => FeatureType::Point,
        ShapeType::PolyLine => FeatureType::Line,
        ShapeType::Polygon => FeatureType::Polygon,
        ShapeType::MultiPoint => FeatureType::MultiPoint,
        _ => FeatureType::Unspecified,
    }
}

/// Cherche un fichier compagnon, en minuscules puis en majuscules
fn sibling(path: &Path, extension: &str) -> Option<PathBuf> {
    [extension.to_string(), extension.to_uppercase()]
        .into_iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}
