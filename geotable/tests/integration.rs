//! Tests d'intégration sur de vrais fichiers shapefile écrits dans un répertoire temporaire

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use geo::Geometry;
use geotable::{
    feature_set_to_table, read_header_info, services, shape_to_table, FeatureType, GeoTableError,
    GeometryServices, ShapeType, ShapefileReader, SpatialKind, Value, ValueType,
};

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Services par défaut, installés par le premier test qui en a besoin
fn init_services() {
    match services::init(GeometryServices::default()) {
        Ok(_) | Err(GeoTableError::ServicesAlreadyInitialized) => {}
        Err(e) => panic!("services init failed: {}", e),
    }
}

fn shp_header(shape_type: i32, file_words: i32, bbox: [f64; 4]) -> Vec<u8> {
    let mut buf = vec![0u8; 100];
    buf[0..4].copy_from_slice(&9994i32.to_be_bytes());
    buf[24..28].copy_from_slice(&file_words.to_be_bytes());
    buf[28..32].copy_from_slice(&1000i32.to_le_bytes());
    buf[32..36].copy_from_slice(&shape_type.to_le_bytes());
    for (i, v) in bbox.iter().enumerate() {
        buf[36 + i * 8..44 + i * 8].copy_from_slice(&v.to_le_bytes());
    }
    buf
}

fn push_record(buf: &mut Vec<u8>, number: i32, content: &[u8]) {
    buf.extend_from_slice(&number.to_be_bytes());
    buf.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
    buf.extend_from_slice(content);
}

/// .dbf avec un champ NAME C(20) et un champ ID N(9,0)
fn write_dbf(path: &Path, names: &[&str]) {
    let header_length: u16 = 32 + 2 * 32 + 1;
    let record_length: u16 = 1 + 20 + 9;

    let mut buf = vec![0u8; 32];
    buf[0] = 0x03;
    buf[1] = 123; // 2023
    buf[2] = 11;
    buf[3] = 5;
    buf[4..8].copy_from_slice(&(names.len() as u32).to_le_bytes());
    buf[8..10].copy_from_slice(&header_length.to_le_bytes());
    buf[10..12].copy_from_slice(&record_length.to_le_bytes());
    buf[29] = 0x57;

    for (name, ftype, len) in [("NAME", b'C', 20u8), ("ID", b'N', 9u8)] {
        let mut desc = [0u8; 32];
        desc[..name.len()].copy_from_slice(name.as_bytes());
        desc[11] = ftype;
        desc[16] = len;
        buf.extend_from_slice(&desc);
    }
    buf.push(0x0D);

    for (i, name) in names.iter().enumerate() {
        buf.push(b' ');
        let mut cell = name.as_bytes().to_vec();
        cell.resize(20, b' ');
        buf.extend_from_slice(&cell);
        buf.extend_from_slice(format!("{:>9}", i + 1).as_bytes());
    }
    buf.push(0x1A);

    std::fs::write(path, buf).unwrap();
}

fn write_points(dir: &Path, stem: &str, points: &[(f64, f64)], names: &[&str]) -> PathBuf {
    let bbox = [
        points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min),
        points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min),
        points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max),
        points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max),
    ];
    let words = (100 + points.len() * 28) / 2;
    let mut shp = shp_header(1, words as i32, bbox);
    for (i, (x, y)) in points.iter().enumerate() {
        let mut content = 1i32.to_le_bytes().to_vec();
        content.extend_from_slice(&x.to_le_bytes());
        content.extend_from_slice(&y.to_le_bytes());
        push_record(&mut shp, i as i32 + 1, &content);
    }

    let path = dir.join(format!("{}.shp", stem));
    std::fs::write(&path, shp).unwrap();
    write_dbf(&dir.join(format!("{}.dbf", stem)), names);
    std::fs::write(dir.join(format!("{}.prj", stem)), WGS84_PRJ).unwrap();
    path
}

/// Un carré, anneau extérieur horaire comme l'exige le format
fn write_square(dir: &Path, stem: &str, origin: (f64, f64)) -> PathBuf {
    let (x0, y0) = origin;
    let ring = [(x0, y0), (x0, y0 + 1.0), (x0 + 1.0, y0 + 1.0), (x0 + 1.0, y0), (x0, y0)];

    let mut content = 5i32.to_le_bytes().to_vec();
    for v in [x0, y0, x0 + 1.0, y0 + 1.0] {
        content.extend_from_slice(&v.to_le_bytes());
    }
    content.extend_from_slice(&1i32.to_le_bytes());
    content.extend_from_slice(&(ring.len() as i32).to_le_bytes());
    content.extend_from_slice(&0i32.to_le_bytes());
    for (x, y) in ring {
        content.extend_from_slice(&x.to_le_bytes());
        content.extend_from_slice(&y.to_le_bytes());
    }

    let words = (100 + 8 + content.len()) / 2;
    let mut shp = shp_header(5, words as i32, [x0, y0, x0 + 1.0, y0 + 1.0]);
    push_record(&mut shp, 1, &content);

    let path = dir.join(format!("{}.shp", stem));
    std::fs::write(&path, shp).unwrap();
    write_dbf(&dir.join(format!("{}.dbf", stem)), &["square"]);
    path
}

#[test]
fn test_header_info_literal_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_points(
        dir.path(),
        "cities",
        &[(2.35, 48.85), (4.83, 45.76), (5.37, 43.3)],
        &["Paris", "Lyon", "Marseille"],
    );

    let info = read_header_info(&path).unwrap();
    assert_eq!(info.shape_type, ShapeType::Point);
    assert_eq!(info.shape_type.code(), 1);
    assert_eq!(info.file_length, 92);
    assert_eq!(info.num_fields, 2);
    assert_eq!(info.num_records, 3);
    assert_eq!(info.bounds.x_min, 2.35);
    assert_eq!(info.bounds.y_min, 43.3);
    assert_eq!(info.bounds.x_max, 5.37);
    assert_eq!(info.bounds.y_max, 48.85);
    assert_eq!(info.last_update, NaiveDate::from_ymd_opt(2023, 11, 5));
}

#[test]
fn test_header_info_missing_dbf() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_points(dir.path(), "lonely", &[(0.0, 0.0)], &["a"]);
    std::fs::remove_file(dir.path().join("lonely.dbf")).unwrap();

    assert!(matches!(
        read_header_info(&path),
        Err(GeoTableError::MissingFile(_))
    ));
}

#[test]
fn test_shape_to_table_geography() {
    init_services();
    let dir = tempfile::tempdir().unwrap();
    let path = write_points(
        dir.path(),
        "cities",
        &[(2.35, 48.85), (4.83, 45.76), (5.37, 43.3)],
        &["Paris", "Lyon", "Marseille"],
    );

    let table = shape_to_table(&path, 4326, "geog", false).into_result().unwrap();

    assert_eq!(table.row_count(), 3);
    assert_eq!(table.column_count(), 3);
    assert_eq!(table.columns()[2].name, "geog");
    assert_eq!(table.columns()[2].data_type, ValueType::Geography);

    // Ordre du shapefile conservé
    let names: Vec<String> = table.rows().iter().map(|r| r[0].to_string()).collect();
    assert_eq!(names, ["Paris", "Lyon", "Marseille"]);
    assert_eq!(table.rows()[1][1], Value::Int32(2));

    let geog = table.rows()[0][2].as_spatial().unwrap();
    assert_eq!(geog.kind, SpatialKind::Geography);
    assert_eq!(geog.srid, 4326);
    assert_eq!(geog.feature_type(), FeatureType::Point);
}

#[test]
fn test_shape_to_table_geometry_when_srid_not_positive() {
    init_services();
    let dir = tempfile::tempdir().unwrap();
    let path = write_points(
        dir.path(),
        "projected",
        &[(700000.0, 6600000.0), (701000.0, 6601000.0)],
        &["a", "b"],
    );

    let table = shape_to_table(&path, 0, "geom", true).into_result().unwrap();
    assert_eq!(table.columns()[2].data_type, ValueType::Geometry);
    let geom = table.rows()[1][2].as_spatial().unwrap();
    assert_eq!(geom.kind, SpatialKind::Geometry);
    assert_eq!(geom.srid, 0);
    assert!(matches!(geom.geometry, Geometry::Point(p) if p.x() == 701000.0));
}

#[test]
fn test_shape_to_table_reorients_rings() {
    init_services();
    let dir = tempfile::tempdir().unwrap();
    let path = write_square(dir.path(), "square", (2.0, 48.0));

    let plain = shape_to_table(&path, 4326, "geog", false).into_result().unwrap();
    let flipped = shape_to_table(&path, 4326, "geog", true).into_result().unwrap();

    let a = plain.rows()[0][2].as_spatial().unwrap();
    let b = flipped.rows()[0][2].as_spatial().unwrap();
    assert_eq!(a.feature_type(), FeatureType::Polygon);
    assert_ne!(a.geometry, b.geometry);
    assert_eq!(&a.reorient(), b);
}

#[test]
fn test_shape_to_table_failure_keeps_partial_table() {
    init_services();
    let dir = tempfile::tempdir().unwrap();
    // Coordonnées projetées: invalides en geography
    let path = write_points(
        dir.path(),
        "lambert",
        &[(1.0, 1.0), (700000.0, 6600000.0)],
        &["ok", "out"],
    );

    let conversion = shape_to_table(&path, 4326, "geog", false);
    assert!(matches!(conversion.error, Some(GeoTableError::InvalidGeography(_))));

    // La table attributaire et la colonne spatiale sont déjà là, la première ligne est remplie
    assert_eq!(conversion.table.row_count(), 2);
    assert_eq!(conversion.table.column_count(), 3);
    assert!(conversion.table.rows()[0][2].as_spatial().is_some());
    assert!(conversion.table.rows()[1][2].is_null());
}

#[test]
fn test_feature_set_from_shapefile() {
    init_services();
    let dir = tempfile::tempdir().unwrap();
    let path = write_points(dir.path(), "cities", &[(2.35, 48.85), (4.83, 45.76)], &["Paris", "Lyon"]);

    let reader = ShapefileReader::open(&path).unwrap();
    assert_eq!(reader.detected_srid(), Some(4326));

    let set = reader.read_feature_set().unwrap();
    assert_eq!(set.feature_type(), FeatureType::Point);
    assert_eq!(set.len(), 2);
    assert_eq!(set.features()[0].geometry.as_ref().unwrap().srid, 4326);

    let flat = feature_set_to_table(&set).unwrap();
    assert_eq!(flat.column_count(), 2);
    assert_eq!(flat.rows()[1], vec![Value::Text("Lyon".into()), Value::Text("2".into())]);
}

#[test]
fn test_cpg_selects_text_encoding() {
    init_services();
    let dir = tempfile::tempdir().unwrap();
    // Octets UTF-8 alors que l'en-tête .dbf annonce Windows-1252
    let path = write_points(dir.path(), "villes", &[(6.02, 47.24), (5.04, 47.32)], &["Besançon", "Dijon"]);

    let latin = ShapefileReader::open(&path).unwrap();
    assert_eq!(latin.encoding(), encoding_rs::WINDOWS_1252);
    assert_eq!(latin.read_records().unwrap()[0][0], Value::Text("BesanÃ§on".into()));

    std::fs::write(dir.path().join("villes.cpg"), "UTF-8\r\n").unwrap();
    let reader = ShapefileReader::open(&path).unwrap();
    assert_eq!(reader.encoding(), encoding_rs::UTF_8);
    assert_eq!(reader.read_records().unwrap()[0][0], Value::Text("Besançon".into()));

    let table = shape_to_table(&path, 4326, "geog", false).into_result().unwrap();
    assert_eq!(table.rows()[0][0].to_string(), "Besançon");
}
