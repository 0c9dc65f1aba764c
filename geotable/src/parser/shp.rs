//! Parser pour les fichiers SHP (géométries)

use geo::{
    Contains, Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon, Winding,
};

use crate::types::{BoundingBox, ShapeType, ShpHeader};
use crate::GeoTableError;

/// Taille de l'en-tête .shp
pub const HEADER_LEN: usize = 100;

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;

/// Parse l'en-tête (les 100 premiers octets)
pub fn parse_header(data: &[u8]) -> Result<ShpHeader, GeoTableError> {
    if data.len() < HEADER_LEN {
        return Err(GeoTableError::invalid_file(
            "shp",
            format!("header truncated ({} bytes)", data.len()),
        ));
    }

    let file_code = be_i32(data, 0)?;
    if file_code != FILE_CODE {
        return Err(GeoTableError::invalid_file(
            "shp",
            format!("bad file code {}", file_code),
        ));
    }

    let version = le_i32(data, 28)?;
    if version != VERSION {
        tracing::warn!(version, "Unexpected shapefile version");
    }

    Ok(ShpHeader {
        file_length: be_i32(data, 24)?,
        version,
        shape_type: ShapeType::from_code(le_i32(data, 32)?)?,
        bounds: BoundingBox {
            x_min: le_f64(data, 36)?,
            y_min: le_f64(data, 44)?,
            x_max: le_f64(data, 52)?,
            y_max: le_f64(data, 60)?,
            z_min: le_f64(data, 68)?,
            z_max: le_f64(data, 76)?,
            m_min: le_f64(data, 84)?,
            m_max: le_f64(data, 92)?,
        },
    })
}

/// Parse tous les enregistrements, dans l'ordre du fichier.
/// Une forme nulle donne `None`.
pub fn parse_records(data: &[u8]) -> Result<Vec<Option<Geometry>>, GeoTableError> {
    let mut geometries = Vec::new();
    let mut offset = HEADER_LEN;

    while offset + 8 <= data.len() {
        let record_number = be_i32(data, offset)?;
        let content_words = be_i32(data, offset + 4)?;
        if content_words < 0 {
            return Err(GeoTableError::invalid_file(
                "shp",
                format!("record {} has negative length", record_number),
            ));
        }

        let start = offset + 8;
        let end = start + content_words as usize * 2;
        let content = data.get(start..end).ok_or_else(|| {
            GeoTableError::invalid_file(
                "shp",
                format!("record {} truncated at byte {}", record_number, start),
            )
        })?;

        geometries.push(parse_shape(content)?);
        offset = end;
    }

    Ok(geometries)
}

/// Parse le contenu d'un enregistrement
fn parse_shape(content: &[u8]) -> Result<Option<Geometry>, GeoTableError> {
    let shape_type = ShapeType::from_code(le_i32(content, 0)?)?;

    match shape_type.base() {
        ShapeType::Null => Ok(None),
        ShapeType::Point => {
            let x = le_f64(content, 4)?;
            let y = le_f64(content, 12)?;
            Ok(Some(Geometry::Point(Point::new(x, y))))
        }
        ShapeType::MultiPoint => {
            // bbox (32 octets) puis nombre de points
            let num_points = count(content, 36)?;
            let coords = read_coords(content, 40, num_points)?;
            if coords.is_empty() {
                return Ok(None);
            }
            Ok(Some(Geometry::MultiPoint(MultiPoint::new(
                coords.into_iter().map(Point::from).collect(),
            ))))
        }
        ShapeType::PolyLine => {
            let parts = read_parts(content)?;
            Ok(match parts.len() {
                0 => None,
                1 => parts.into_iter().next().map(Geometry::LineString),
                _ => Some(Geometry::MultiLineString(MultiLineString::new(parts))),
            })
        }
        ShapeType::Polygon => {
            let rings = read_parts(content)?;
            let mut polygons = assemble_polygons(rings);
            Ok(match polygons.len() {
                0 => None,
                1 => polygons.pop().map(Geometry::Polygon),
                _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
            })
        }
        other => Err(GeoTableError::UnsupportedShapeType(other.code())),
    }
}

/// Lit les parties (PolyLine / Polygon): bbox, numParts, numPoints, parts[], points[]
fn read_parts(content: &[u8]) -> Result<Vec<LineString>, GeoTableError> {
    let num_parts = count(content, 36)?;
    let num_points = count(content, 40)?;
    fits(content, 44, num_parts, 4, "parts")?;

    let mut starts = Vec::with_capacity(num_parts);
    for i in 0..num_parts {
        starts.push(count(content, 44 + i * 4)?);
    }

    let coords = read_coords(content, 44 + num_parts * 4, num_points)?;

    let mut parts = Vec::with_capacity(num_parts);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(num_points);
        if start > end || end > coords.len() {
            return Err(GeoTableError::invalid_file(
                "shp",
                format!("part {} has invalid range {}..{}", i, start, end),
            ));
        }
        if end > start {
            parts.push(LineString::new(coords[start..end].to_vec()));
        }
    }
    Ok(parts)
}

/// Regroupe les anneaux: sens horaire = extérieur, anti-horaire = trou
fn assemble_polygons(rings: Vec<LineString>) -> Vec<Polygon> {
    let (mut shells, mut holes): (Vec<LineString>, Vec<LineString>) =
        rings.into_iter().partition(|ring| ring.is_cw());

    // Fichiers mal orientés: aucun anneau horaire, tout devient extérieur
    if shells.is_empty() {
        shells = std::mem::take(&mut holes);
    }

    let mut polygons: Vec<(LineString, Vec<LineString>)> =
        shells.into_iter().map(|shell| (shell, Vec::new())).collect();

    for hole in holes {
        let Some(first) = hole.0.first().copied() else {
            continue;
        };
        let owner = polygons
            .iter()
            .position(|(shell, _)| Polygon::new(shell.clone(), vec![]).contains(&Point::from(first)));

        match owner {
            Some(i) => polygons[i].1.push(hole),
            None => {
                tracing::debug!(points = hole.0.len(), "Orphan hole promoted to shell");
                polygons.push((hole, Vec::new()));
            }
        }
    }

    polygons
        .into_iter()
        .map(|(shell, holes)| Polygon::new(shell, holes))
        .collect()
}

fn read_coords(data: &[u8], at: usize, n: usize) -> Result<Vec<Coord>, GeoTableError> {
    fits(data, at, n, 16, "points")?;
    let mut coords = Vec::with_capacity(n);
    for i in 0..n {
        let base = at + i * 16;
        coords.push(Coord {
            x: le_f64(data, base)?,
            y: le_f64(data, base + 8)?,
        });
    }
    Ok(coords)
}

/// Un nombre annoncé d'éléments doit tenir dans les octets restants de l'enregistrement
fn fits(data: &[u8], at: usize, n: usize, item_len: usize, what: &str) -> Result<(), GeoTableError> {
    let available = data.len().saturating_sub(at) / item_len;
    if n > available {
        return Err(GeoTableError::invalid_file(
            "shp",
            format!("{} {} declared, only {} fit in the record", n, what, available),
        ));
    }
    Ok(())
}

fn count(data: &[u8], at: usize) -> Result<usize, GeoTableError> {
    let n = le_i32(data, at)?;
    usize::try_from(n)
        .map_err(|_| GeoTableError::invalid_file("shp", format!("negative count {} at {}", n, at)))
}

fn slice4(data: &[u8], at: usize) -> Result<[u8; 4], GeoTableError> {
    data.get(at..at + 4)
        .map(|b| [b[0], b[1], b[2], b[3]])
        .ok_or_else(|| GeoTableError::invalid_file("shp", format!("unexpected end at byte {}", at)))
}

fn be_i32(data: &[u8], at: usize) -> Result<i32, GeoTableError> {
    slice4(data, at).map(i32::from_be_bytes)
}

fn le_i32(data: &[u8], at: usize) -> Result<i32, GeoTableError> {
    slice4(data, at).map(i32::from_le_bytes)
}

fn le_f64(data: &[u8], at: usize) -> Result<f64, GeoTableError> {
    data.get(at..at + 8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .ok_or_else(|| GeoTableError::invalid_file("shp", format!("unexpected end at byte {}", at)))
}
