//! Accès PostgreSQL/PostGIS: connexion, import de requêtes, écriture de tables

pub mod import;
pub mod pg_types;
pub mod pool;
pub mod writer;

pub use import::query_to_feature_set;
pub use pg_types::{value_type_to_column_type, ColumnType};
pub use pool::{create_pool, DatabaseConfig, SslMode};
pub use writer::table_to_database;
