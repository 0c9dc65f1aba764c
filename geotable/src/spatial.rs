//! Valeurs spatiales (geometry planaire / geography ellipsoïdale)
//!
//! Le WKT sert de format pivot entre shapefile, table et base; l'EWKB est le
//! format binaire échangé avec PostGIS.

use std::fmt;

use geo::{Coord, CoordsIter, Geometry, LineString, MapCoords, Polygon};
use geozero::wkb::Ewkb;
use geozero::wkt::{Wkt, WktWriter};
use geozero::{GeozeroGeometry, ToGeo};
use serde::Serialize;
use wkb::geom_to_wkb;

use crate::services;
use crate::GeoTableError;

/// Flag SRID des types EWKB PostGIS
const EWKB_SRID_FLAG: u32 = 0x2000_0000;

/// Nature de la valeur spatiale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpatialKind {
    /// Plan euclidien
    Geometry,
    /// Ellipsoïde, coordonnées en degrés (longitude, latitude)
    Geography,
}

/// Classification d'une géométrie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum FeatureType {
    #[default]
    Unspecified,
    Point,
    Line,
    Polygon,
    MultiPoint,
}

impl FeatureType {
    pub fn of(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Point(_) => FeatureType::Point,
            Geometry::MultiPoint(_) => FeatureType::MultiPoint,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                FeatureType::Line
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => FeatureType::Polygon,
            Geometry::GeometryCollection(_) => FeatureType::Unspecified,
        }
    }
}

/// Valeur spatiale: géométrie + nature + SRID
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialValue {
    pub kind: SpatialKind,
    pub srid: i32,
    pub geometry: Geometry,
}

impl SpatialValue {
    /// Crée une valeur spatiale, en validant les bornes pour une geography
    pub fn new(kind: SpatialKind, geometry: Geometry, srid: i32) -> Result<Self, GeoTableError> {
        services::get()?;
        let value = Self {
            kind,
            srid,
            geometry,
        };
        if kind == SpatialKind::Geography {
            value.validate_geography()?;
        }
        Ok(value)
    }

    /// Parse un WKT et l'étiquette avec le SRID demandé
    pub fn from_wkt(kind: SpatialKind, wkt: &str, srid: i32) -> Result<Self, GeoTableError> {
        let geometry = Wkt(wkt)
            .to_geo()
            .map_err(|e| GeoTableError::Wkt(e.to_string()))?;
        Self::new(kind, geometry, srid)
    }

    /// Décode de l'EWKB PostGIS. Sans SRID embarqué, le SRID par défaut des services s'applique.
    pub fn from_ewkb(kind: SpatialKind, bytes: &[u8]) -> Result<Self, GeoTableError> {
        let default_srid = services::get()?.default_srid;
        let srid = ewkb_srid(bytes)?.unwrap_or(default_srid);
        let geometry = Ewkb(bytes)
            .to_geo()
            .map_err(|e| GeoTableError::Wkb(e.to_string()))?;
        Self::new(kind, geometry, srid)
    }

    pub fn feature_type(&self) -> FeatureType {
        FeatureType::of(&self.geometry)
    }

    /// WKT, arrondi à la précision des services si elle est définie
    pub fn to_wkt(&self) -> Result<String, GeoTableError> {
        match services::get()?.precision {
            Some(precision) => {
                let factor = 10f64.powi(precision as i32);
                let rounded = self.geometry.map_coords(|c| Coord {
                    x: (c.x * factor).round() / factor,
                    y: (c.y * factor).round() / factor,
                });
                write_wkt(&rounded)
            }
            None => write_wkt(&self.geometry),
        }
    }

    /// Format EWKT: `SRID=n;WKT`
    pub fn to_ewkt(&self) -> Result<String, GeoTableError> {
        Ok(format!("SRID={};{}", self.srid, self.to_wkt()?))
    }

    /// EWKB avec flag SRID
    pub fn to_ewkb(&self) -> Result<Vec<u8>, GeoTableError> {
        let wkb = geom_to_wkb(&self.geometry)
            .map_err(|e| GeoTableError::Wkb(format!("{:?}", e)))?;
        Ok(add_srid_to_wkb(&wkb, self.srid))
    }

    /// Inverse le sens de parcours de tous les anneaux de polygones
    pub fn reorient(&self) -> SpatialValue {
        SpatialValue {
            kind: self.kind,
            srid: self.srid,
            geometry: reorient_geometry(&self.geometry),
        }
    }

    fn validate_geography(&self) -> Result<(), GeoTableError> {
        if self.srid <= 0 {
            return Err(GeoTableError::InvalidGeography(format!(
                "geography requires a positive SRID, got {}",
                self.srid
            )));
        }

        for coord in self.geometry.coords_iter() {
            if !(-90.0..=90.0).contains(&coord.y) {
                return Err(GeoTableError::InvalidGeography(format!(
                    "latitude {} out of range [-90, 90]",
                    coord.y
                )));
            }
            if !(-180.0..=180.0).contains(&coord.x) {
                return Err(GeoTableError::InvalidGeography(format!(
                    "longitude {} out of range [-180, 180]",
                    coord.x
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for SpatialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wkt = write_wkt(&self.geometry).map_err(|_| fmt::Error)?;
        f.write_str(&wkt)
    }
}

fn write_wkt(geometry: &Geometry) -> Result<String, GeoTableError> {
    let mut buf = Vec::new();
    {
        let mut writer = WktWriter::new(&mut buf);
        geometry
            .process_geom(&mut writer)
            .map_err(|e| GeoTableError::Wkt(e.to_string()))?;
    }
    String::from_utf8(buf).map_err(|e| GeoTableError::Wkt(e.to_string()))
}

/// Lit le SRID d'un en-tête EWKB s'il est présent
fn ewkb_srid(bytes: &[u8]) -> Result<Option<i32>, GeoTableError> {
    if bytes.len() < 5 {
        return Err(GeoTableError::Wkb(format!(
            "buffer too short ({} bytes)",
            bytes.len()
        )));
    }

    let little_endian = match bytes[0] {
        0 => false,
        1 => true,
        other => {
            return Err(GeoTableError::Wkb(format!("invalid byte order {}", other)));
        }
    };
    let read_u32 = |b: [u8; 4]| {
        if little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        }
    };

    let geom_type = read_u32([bytes[1], bytes[2], bytes[3], bytes[4]]);
    if geom_type & EWKB_SRID_FLAG == 0 {
        return Ok(None);
    }
    if bytes.len() < 9 {
        return Err(GeoTableError::Wkb("SRID flag set but no SRID".to_string()));
    }
    Ok(Some(read_u32([bytes[5], bytes[6], bytes[7], bytes[8]]) as i32))
}

/// Ajoute le SRID au WKB pour créer du EWKB
fn add_srid_to_wkb(wkb: &[u8], srid: i32) -> Vec<u8> {
    if wkb.len() < 5 {
        return wkb.to_vec();
    }

    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);

    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];
    if wkb[0] == 1 {
        let geom_type = u32::from_le_bytes(type_bytes) | EWKB_SRID_FLAG;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&srid.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | EWKB_SRID_FLAG;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&srid.to_be_bytes());
    }

    ewkb.extend_from_slice(&wkb[5..]);
    ewkb
}

fn reverse_ring(ring: &LineString) -> LineString {
    LineString::new(ring.0.iter().rev().copied().collect())
}

fn reverse_polygon(polygon: &Polygon) -> Polygon {
    Polygon::new(
        reverse_ring(polygon.exterior()),
        polygon.interiors().iter().map(reverse_ring).collect(),
    )
}

fn reorient_geometry(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Polygon(p) => Geometry::Polygon(reverse_polygon(p)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(geo::MultiPolygon::new(
            mp.0.iter().map(reverse_polygon).collect(),
        )),
        Geometry::Rect(r) => Geometry::Polygon(reverse_polygon(&r.to_polygon())),
        Geometry::Triangle(t) => Geometry::Polygon(reverse_polygon(&t.to_polygon())),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
            geo::GeometryCollection::new_from(gc.0.iter().map(reorient_geometry).collect()),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    fn setup() {
        services::init_for_tests();
    }

    #[test]
    fn test_wkt_roundtrip_keeps_feature_type() {
        setup();
        for wkt in [
            "POINT(1 2)",
            "LINESTRING(0 0,1 1,2 0)",
            "POLYGON((0 0,0 1,1 1,1 0,0 0))",
            "MULTIPOINT(0 0,1 1)",
            "MULTIPOLYGON(((0 0,0 1,1 1,0 0)),((5 5,5 6,6 6,5 5)))",
        ] {
            let value = SpatialValue::from_wkt(SpatialKind::Geometry, wkt, 2154).unwrap();
            let text = value.to_wkt().unwrap();
            let again = SpatialValue::from_wkt(SpatialKind::Geometry, &text, 2154).unwrap();
            assert_eq!(value.feature_type(), again.feature_type(), "{}", wkt);
            assert_eq!(value.geometry, again.geometry);
            assert_eq!(again.srid, 2154);
        }
    }

    #[test]
    fn test_feature_type_classification() {
        setup();
        let cases = [
            ("POINT(1 2)", FeatureType::Point),
            ("MULTIPOINT(0 0,1 1)", FeatureType::MultiPoint),
            ("MULTILINESTRING((0 0,1 1),(2 2,3 3))", FeatureType::Line),
            ("POLYGON((0 0,0 1,1 1,0 0))", FeatureType::Polygon),
            ("GEOMETRYCOLLECTION(POINT(1 2))", FeatureType::Unspecified),
        ];
        for (wkt, expected) in cases {
            let value = SpatialValue::from_wkt(SpatialKind::Geometry, wkt, 0).unwrap();
            assert_eq!(value.feature_type(), expected, "{}", wkt);
        }
    }

    #[test]
    fn test_geography_bounds() {
        setup();
        assert!(SpatialValue::from_wkt(SpatialKind::Geography, "POINT(2.35 48.85)", 4326).is_ok());
        assert!(matches!(
            SpatialValue::from_wkt(SpatialKind::Geography, "POINT(48.85 200)", 4326),
            Err(GeoTableError::InvalidGeography(_))
        ));
        assert!(matches!(
            SpatialValue::from_wkt(SpatialKind::Geography, "POINT(2 48)", 0),
            Err(GeoTableError::InvalidGeography(_))
        ));
        // Une geometry planaire n'a pas de bornes
        assert!(SpatialValue::from_wkt(SpatialKind::Geometry, "POINT(700000 6600000)", 2154).is_ok());
    }

    #[test]
    fn test_invalid_wkt() {
        setup();
        assert!(matches!(
            SpatialValue::from_wkt(SpatialKind::Geometry, "POINT(1", 0),
            Err(GeoTableError::Wkt(_))
        ));
    }

    #[test]
    fn test_reorient_reverses_rings() {
        setup();
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let value = SpatialValue::new(SpatialKind::Geography, Geometry::Polygon(poly.clone()), 4326)
            .unwrap();
        let reoriented = value.reorient();

        let Geometry::Polygon(rev) = &reoriented.geometry else {
            panic!("expected polygon");
        };
        let expected: Vec<Coord> = poly.exterior().0.iter().rev().copied().collect();
        assert_eq!(rev.exterior().0, expected);
        assert_eq!(reoriented.srid, 4326);
        assert_eq!(reoriented.reorient(), value);
    }

    #[test]
    fn test_reorient_point_unchanged() {
        setup();
        let value =
            SpatialValue::new(SpatialKind::Geometry, Geometry::Point(point!(x: 1.0, y: 2.0)), 0)
                .unwrap();
        assert_eq!(value.reorient(), value);
    }

    #[test]
    fn test_ewkb_roundtrip_with_srid() {
        setup();
        let value = SpatialValue::from_wkt(SpatialKind::Geometry, "LINESTRING(0 0,3 4)", 2154).unwrap();
        let ewkb = value.to_ewkb().unwrap();
        assert_eq!(ewkb_srid(&ewkb).unwrap(), Some(2154));

        let decoded = SpatialValue::from_ewkb(SpatialKind::Geometry, &ewkb).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_ewkb_without_srid_uses_default() {
        setup();
        let geom = Geometry::Point(point!(x: 1.0, y: 2.0));
        let wkb = geom_to_wkb(&geom).unwrap();
        assert_eq!(ewkb_srid(&wkb).unwrap(), None);

        let decoded = SpatialValue::from_ewkb(SpatialKind::Geometry, &wkb).unwrap();
        assert_eq!(decoded.srid, services::get().unwrap().default_srid);
    }

    #[test]
    fn test_ewkt() {
        setup();
        let value = SpatialValue::from_wkt(SpatialKind::Geography, "POINT(2 48)", 4326).unwrap();
        let ewkt = value.to_ewkt().unwrap();
        assert!(ewkt.starts_with("SRID=4326;POINT"));
    }
}
