//! Descripteur de connexion et pool PostgreSQL
//!
//! Un pool est créé par opération (import, écriture) et libéré à la fin de
//! celle-ci, quel que soit le chemin de sortie.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, warn};

/// Négociation TLS avec le serveur
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Connexion en clair (défaut)
    #[default]
    Disable,
    /// TLS tenté d'abord, repli en clair si la connexion échoue
    Prefer,
    /// TLS obligatoire
    Require,
}

impl SslMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SslMode {
    type Err = String;

    /// Valeurs de `PGSSLMODE` (libpq) et booléens usuels
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            other => Err(format!(
                "Invalid SSL mode '{}' (expected disable, prefer or require)",
                other
            )),
        }
    }
}

/// Descripteur de connexion
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "postgres".into(),
            user: "postgres".into(),
            password: None,
            pool_size: 4,
            ssl_mode: SslMode::Disable,
        }
    }
}

impl DatabaseConfig {
    /// Variables `PG*` (plus `POOL_SIZE`), valeurs par défaut sinon
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let ssl_mode = match lookup("PGSSLMODE").map(|s| s.parse::<SslMode>()) {
            Some(Ok(mode)) => mode,
            Some(Err(e)) => {
                warn!("{}, falling back to {}", e, defaults.ssl_mode);
                defaults.ssl_mode
            }
            None => defaults.ssl_mode,
        };

        Self {
            host: lookup("PGHOST").unwrap_or(defaults.host),
            port: lookup("PGPORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("PGDATABASE").unwrap_or(defaults.dbname),
            user: lookup("PGUSER").unwrap_or(defaults.user),
            password: lookup("PGPASSWORD"),
            pool_size: lookup("POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            ssl_mode,
        }
    }

    /// Même serveur, autre base
    pub fn with_database(&self, dbname: &str) -> Self {
        Self {
            dbname: dbname.to_string(),
            ..self.clone()
        }
    }

    /// `user@host:port/dbname`, sans le mot de passe (pour les logs)
    pub fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }

    fn to_deadpool(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = self.password.clone();
        cfg.pool = Some(PoolConfig {
            max_size: self.pool_size.max(1),
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(30)),
                create: Some(Duration::from_secs(10)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });
        cfg
    }
}

/// Connecteur rustls avec les racines webpki
fn tls_connector() -> MakeRustlsConnect {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let client = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    MakeRustlsConnect::new(client)
}

fn plain_pool(cfg: &Config) -> Result<Pool> {
    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create database pool")
}

fn tls_pool(cfg: &Config) -> Result<Pool> {
    cfg.create_pool(Some(Runtime::Tokio1), tls_connector())
        .context("Failed to create database pool with TLS")
}

/// Crée le pool de connexions d'une opération.
///
/// En mode `Prefer`, une première connexion TLS est ouverte; si elle échoue,
/// le pool est reconstruit sans TLS.
pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = config.to_deadpool();

    match config.ssl_mode {
        SslMode::Disable => plain_pool(&cfg),
        SslMode::Require => tls_pool(&cfg),
        SslMode::Prefer => {
            let pool = tls_pool(&cfg)?;
            match pool.get().await {
                Ok(_) => {
                    debug!(database = %config.describe(), "TLS connection established");
                    Ok(pool)
                }
                Err(e) => {
                    warn!(
                        database = %config.describe(),
                        error = %e,
                        "TLS connection failed, retrying without TLS"
                    );
                    pool.close();
                    plain_pool(&cfg)
                }
            }
        }
    }
}
