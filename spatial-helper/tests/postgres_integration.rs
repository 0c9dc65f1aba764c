//! Tests d'intégration PostgreSQL/PostGIS
//!
//! Ces tests nécessitent une base PostgreSQL avec PostGIS disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! # Avec PostgreSQL local
//! cargo test --test postgres_integration -- --ignored
//!
//! # Avec Docker
//! docker run -d --name postgres-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgis/postgis
//! PGPASSWORD=test cargo test --test postgres_integration -- --ignored
//! ```

use anyhow::Result;
use chrono::NaiveDate;
use geotable::{
    services, DataColumn, DataTable, FeatureType, GeoTableError, GeometryServices, SpatialKind,
    SpatialValue, Value, ValueType,
};
use spatial_helper::{
    create_pool, query_to_feature_set, table_to_database, DatabaseConfig, TableAction, WriteStatus,
};

fn init_services() {
    match services::init(GeometryServices::default()) {
        Ok(_) | Err(GeoTableError::ServicesAlreadyInitialized) => {}
        Err(e) => panic!("services init failed: {}", e),
    }
}

fn test_config() -> DatabaseConfig {
    DatabaseConfig::from_env()
}

/// Exécute un script SQL de préparation
async fn setup(sql: &str) -> Result<()> {
    let pool = create_pool(&test_config()).await?;
    let client = pool.get().await?;
    // L'extension peut déjà exister sans droits pour la recréer
    let _ = client.batch_execute("CREATE EXTENSION IF NOT EXISTS postgis").await;
    client.batch_execute(sql).await?;
    Ok(())
}

async fn count_rows(table: &str) -> Result<i64> {
    let pool = create_pool(&test_config()).await?;
    let client = pool.get().await?;
    let row = client
        .query_one(&format!("SELECT count(*) FROM {}", table), &[])
        .await?;
    Ok(row.get(0))
}

/// (nom, type udt) des colonnes, dans l'ordre
async fn table_columns(table: &str) -> Result<Vec<(String, String)>> {
    let pool = create_pool(&test_config()).await?;
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT column_name::text, udt_name::text FROM information_schema.columns
             WHERE table_schema = current_schema() AND table_name = $1
             ORDER BY ordinal_position",
            &[&table],
        )
        .await?;
    Ok(rows.iter().map(|r| (r.get(0), r.get(1))).collect())
}

fn roads(n: usize) -> DataTable {
    init_services();
    let mut table = DataTable::with_columns(vec![
        DataColumn::new("name", ValueType::Text),
        DataColumn::new("lanes", ValueType::Int32),
        DataColumn::new("length", ValueType::Float),
        DataColumn::new("geog", ValueType::Geography),
    ])
    .unwrap();

    for i in 0..n {
        let geog = SpatialValue::from_wkt(
            SpatialKind::Geography,
            &format!("LINESTRING({} 45,{} 46)", i, i),
            4326,
        )
        .unwrap();
        table
            .add_row(vec![
                format!("road, \"{}\"", i).into(),
                Value::Int32(i as i32),
                if i % 2 == 0 { Value::Float(i as f64 * 1.5) } else { Value::Null },
                Value::Spatial(geog),
            ])
            .unwrap();
    }
    table
}

/// Une table existante est remplacée: schéma identique à la source, anciennes lignes disparues
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_new_table_replaces_existing() {
    setup(
        r#"
        DROP TABLE IF EXISTS sh_test_replace;
        CREATE TABLE sh_test_replace (legacy text, other integer);
        INSERT INTO sh_test_replace VALUES ('a', 1), ('b', 2), ('c', 3);
        "#,
    )
    .await
    .expect("Failed to setup");

    let config = test_config();
    let source = roads(5);
    let report = table_to_database(&source, &config, &config.dbname, "sh_test_replace", true).await;

    assert_eq!(report.status, WriteStatus::Success, "{:?}", report.error);
    assert_eq!(report.action, Some(TableAction::Recreated));
    assert_eq!(report.rows_copied, 5);

    let columns = table_columns("sh_test_replace").await.unwrap();
    assert_eq!(
        columns,
        vec![
            ("name".to_string(), "varchar".to_string()),
            ("lanes".to_string(), "int4".to_string()),
            ("length".to_string(), "float8".to_string()),
            ("geog".to_string(), "geography".to_string()),
        ]
    );
    assert_eq!(count_rows("sh_test_replace").await.unwrap(), 5);
}

/// Table absente sans demande de nouvelle table: création quand même
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_missing_table_is_created() {
    setup("DROP TABLE IF EXISTS sh_test_create;")
        .await
        .expect("Failed to setup");

    let config = test_config();
    let report = table_to_database(&roads(3), &config, &config.dbname, "sh_test_create", false).await;

    assert!(report.is_ok(), "{:?}", report.error);
    assert_eq!(report.action, Some(TableAction::Created));
    assert_eq!(count_rows("sh_test_create").await.unwrap(), 3);
}

/// Réutilisation: les lignes s'ajoutent
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_existing_table_is_reused() {
    setup("DROP TABLE IF EXISTS sh_test_reuse;")
        .await
        .expect("Failed to setup");

    let config = test_config();
    let first = table_to_database(&roads(2), &config, &config.dbname, "sh_test_reuse", false).await;
    let second = table_to_database(&roads(4), &config, &config.dbname, "sh_test_reuse", false).await;

    assert_eq!(first.action, Some(TableAction::Created));
    assert_eq!(second.action, Some(TableAction::Reused));
    assert_eq!(second.rows_copied, 4);
    assert_eq!(count_rows("sh_test_reuse").await.unwrap(), 6);
}

/// Réutilisation d'une table incompatible: échec, table inchangée
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_reuse_with_schema_mismatch_fails() {
    setup(
        r#"
        DROP TABLE IF EXISTS sh_test_mismatch;
        CREATE TABLE sh_test_mismatch (name varchar(50), lanes integer);
        INSERT INTO sh_test_mismatch VALUES ('kept', 1);
        "#,
    )
    .await
    .expect("Failed to setup");

    let config = test_config();
    let report = table_to_database(&roads(2), &config, &config.dbname, "sh_test_mismatch", false).await;

    assert_eq!(report.status, WriteStatus::Failed);
    assert_eq!(report.rows_copied, 0);
    let error = report.error.unwrap();
    assert!(error.contains("length"));
    assert!(error.contains("geog"));
    assert_eq!(count_rows("sh_test_mismatch").await.unwrap(), 1);
}

/// Une colonne source sans type de destination échoue avant toute écriture
#[tokio::test]
async fn test_unmapped_column_type_is_reported() {
    let source = DataTable::with_columns(vec![
        DataColumn::new("id", ValueType::Int32),
        DataColumn::new("flag", ValueType::Boolean),
    ])
    .unwrap();

    let config = DatabaseConfig {
        host: "unreachable.invalid".into(),
        ..Default::default()
    };
    let report = table_to_database(&source, &config, "gis", "sh_test_unmapped", true).await;

    assert_eq!(report.status, WriteStatus::Failed);
    assert_eq!(report.action, None);
    assert_eq!(report.database, "gis");
    assert!(report.error.unwrap().contains("flag"));
}

/// N colonnes d'attributs + une colonne spatiale: N attributs, lignes dans l'ordre de la requête
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_query_to_feature_set() {
    init_services();
    setup(
        r#"
        DROP TABLE IF EXISTS sh_test_query;
        CREATE TABLE sh_test_query (
            id integer,
            geom geometry(Point, 2154),
            name text,
            area double precision,
            code numeric(6, 2),
            updated timestamp
        );
        INSERT INTO sh_test_query VALUES
            (1, ST_GeomFromText('POINT(700000 6600000)', 2154), 'un', 1.5, 12.5, '2024-03-01 10:00:00'),
            (2, ST_GeomFromText('POINT(701000 6601000)', 2154), NULL, 2.5, -0.25, NULL),
            (3, NULL, 'trois', NULL, NULL, NULL);
        "#,
    )
    .await
    .expect("Failed to setup");

    let set = query_to_feature_set(
        &test_config(),
        "SELECT id, geom, name, area, code, updated FROM sh_test_query ORDER BY id DESC",
    )
    .await
    .expect("Query failed")
    .expect("Rows expected");

    let names: Vec<&str> = set.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "area", "code", "updated"]);
    assert_eq!(set.columns()[3].data_type, ValueType::Decimal);
    assert_eq!(set.feature_type(), FeatureType::Point);
    assert_eq!(set.len(), 3);

    let features = set.features();
    assert_eq!(features[0].row[0], Value::Int32(3));
    assert!(features[0].geometry.is_none());

    assert_eq!(features[1].row[0], Value::Int32(2));
    assert_eq!(features[1].row[1], Value::Null);
    assert_eq!(features[1].row[3], Value::Decimal("-0.25".into()));
    let geometry = features[1].geometry.as_ref().unwrap();
    assert_eq!(geometry.kind, SpatialKind::Geometry);
    assert_eq!(geometry.srid, 2154);

    assert_eq!(features[2].row[3], Value::Decimal("12.50".into()));
    match &features[2].row[4] {
        Value::DateTime(ts) => assert_eq!(
            *ts,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap()
        ),
        other => panic!("expected a timestamp, got {:?}", other),
    }
}

/// Deux colonnes spatiales: la seconde reste un attribut
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_query_second_spatial_column() {
    init_services();
    let set = query_to_feature_set(
        &test_config(),
        "SELECT ST_GeogFromText('SRID=4326;POINT(2 48)') AS a, ST_GeogFromText('SRID=4326;POINT(3 49)') AS b",
    )
    .await
    .expect("Query failed")
    .expect("Rows expected");

    assert_eq!(set.columns().len(), 1);
    assert_eq!(set.columns()[0].data_type, ValueType::Geography);
    assert_eq!(set.features()[0].geometry.as_ref().unwrap().kind, SpatialKind::Geography);
    assert!(set.features()[0].row[0].as_spatial().is_some());
}

/// Aucune colonne spatiale: type de feature non spécifié
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_query_without_spatial_column() {
    init_services();
    let set = query_to_feature_set(&test_config(), "SELECT 1::int AS one, 'x'::text AS label")
        .await
        .expect("Query failed")
        .expect("Rows expected");

    assert_eq!(set.feature_type(), FeatureType::Unspecified);
    assert_eq!(set.columns().len(), 2);
    assert!(set.features()[0].geometry.is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_query_without_rows() {
    init_services();
    let result = query_to_feature_set(&test_config(), "SELECT 1::int AS one WHERE false")
        .await
        .expect("Query failed");
    assert!(result.is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_query_unsupported_column_type() {
    init_services();
    let result = query_to_feature_set(&test_config(), "SELECT '{}'::jsonb AS payload").await;
    assert!(result.is_err());
}
