//! Export d'une collection de features vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use tracing::info;

use geotable::{DataColumn, Feature, FeatureSet, Value};

/// Exporte une collection de features en GeoJSON
///
/// Le CRS est celui de la première géométrie portant un SRID positif.
pub fn export_to_geojson(set: &FeatureSet, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    write_collection(&mut writer, set)?;
    writer.flush()?;

    info!(
        output = %output_path.display(),
        features = set.len(),
        "GeoJSON written"
    );
    Ok(())
}

fn write_collection<W: Write>(writer: &mut W, set: &FeatureSet) -> Result<()> {
    let srid = set
        .features()
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .map(|g| g.srid)
        .find(|&srid| srid > 0);

    // Header FeatureCollection avec CRS
    write!(writer, r#"{{"type":"FeatureCollection","#)?;
    if let Some(srid) = srid {
        write!(
            writer,
            r#""crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"#,
            srid
        )?;
    }
    write!(writer, r#""features":["#)?;

    for (i, feature) in set.features().iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, set.columns(), feature)?;
    }

    // Footer
    write!(writer, "]}}")?;
    Ok(())
}

/// Écrit une feature en GeoJSON
fn write_feature<W: Write>(writer: &mut W, columns: &[DataColumn], feature: &Feature) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;
    match &feature.geometry {
        Some(value) => {
            let mut geom_buf = Vec::new();
            let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
            value.geometry.process_geom(&mut geom_writer)?;
            writer.write_all(&geom_buf)?;
        }
        None => write!(writer, "null")?,
    }

    write!(writer, r#","properties":{{"#)?;
    for (i, (column, value)) in columns.iter().zip(&feature.row).enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, r#""{}":"#, escape_json(&column.name))?;
        write_value(writer, value)?;
    }
    write!(writer, "}}}}")?;

    Ok(())
}

fn write_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Null => write!(writer, "null")?,
        Value::Float(v) if v.is_finite() => write!(writer, "{}", v)?,
        Value::Float(_) => write!(writer, "null")?,
        Value::Int32(v) => write!(writer, "{}", v)?,
        Value::Int64(v) => write!(writer, "{}", v)?,
        Value::Boolean(v) => write!(writer, "{}", v)?,
        // Décimales exactes, dates et valeurs spatiales secondaires: texte
        other => write!(writer, r#""{}""#, escape_json(&other.to_string()))?,
    }
    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
