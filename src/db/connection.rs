use anyhow::{Context, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_postgres::NoTls;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub ssl_mode: SslMode,
    /// Accept invalid/self-signed certificates. Ignored for the verifying modes.
    pub accept_invalid_certs: bool,
    /// Optional path to a custom CA certificate file (PEM format).
    pub ca_cert_path: Option<String>,
    /// Maximum number of pooled connections.
    pub pool_size: usize,
    /// How long a caller waits for a free pooled connection.
    pub pool_wait_secs: u64,
}

/// SSL/TLS connection modes for PostgreSQL.
///
/// These match the standard PostgreSQL sslmode parameter:
/// - `Disable`: No SSL (unencrypted)
/// - `Prefer`: Try SSL first, fall back to non-SSL (default)
/// - `Require`: Require SSL but don't verify certificate
/// - `VerifyCa`: Require SSL and verify the server certificate is signed by a trusted CA
/// - `VerifyFull`: Like VerifyCa, but also verify the server hostname matches the certificate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl ConnectionConfig {
    pub fn connection_string(&self) -> String {
        let sslmode = match self.ssl_mode {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            // libpq-style verify modes are enforced by the TLS connector;
            // tokio-postgres itself only knows disable/prefer/require.
            SslMode::VerifyCa | SslMode::VerifyFull => "require",
        };
        format!(
            "host={} port={} dbname={} user={} password={} sslmode={} \
             connect_timeout=10 application_name=pgrag",
            quote_conn_value(&self.host),
            self.port,
            quote_conn_value(&self.database),
            quote_conn_value(&self.username),
            quote_conn_value(&self.password),
            sslmode
        )
    }

    pub fn display_string(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 5432,
            database: String::from("postgres"),
            username: String::from("postgres"),
            password: String::new(),
            ssl_mode: SslMode::default(),
            accept_invalid_certs: false,
            ca_cert_path: None,
            pool_size: 8,
            pool_wait_secs: 15,
        }
    }
}

/// Build a connection pool. No connection is opened until the first checkout.
pub fn create_pool(config: &ConnectionConfig) -> Result<Pool> {
    let pg_config: tokio_postgres::Config = config
        .connection_string()
        .parse()
        .context("Invalid PostgreSQL connection settings")?;
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let manager = match config.ssl_mode {
        SslMode::Disable => Manager::from_config(pg_config, NoTls, manager_config),
        SslMode::Prefer | SslMode::Require => {
            let tls = build_tls_connector(config, false)?;
            Manager::from_config(pg_config, tls, manager_config)
        }
        SslMode::VerifyCa | SslMode::VerifyFull => {
            let tls = build_tls_connector(config, true)?;
            Manager::from_config(pg_config, tls, manager_config)
        }
    };

    let wait = Duration::from_secs(config.pool_wait_secs.max(1));
    let pool = Pool::builder(manager)
        .max_size(config.pool_size.max(1))
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(wait))
        .create_timeout(Some(Duration::from_secs(15)))
        .build()
        .context("Failed to build PostgreSQL connection pool")?;

    tracing::debug!(
        target = %config.display_string(),
        max_size = config.pool_size,
        "connection pool ready"
    );
    Ok(pool)
}

/// Build a TLS connector with appropriate certificate configuration.
///
/// `strict_verify` forces certificate verification (verify-ca/verify-full).
fn build_tls_connector(config: &ConnectionConfig, strict_verify: bool) -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    if config.accept_invalid_certs && !strict_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else if let Some(ca_path) = &config.ca_cert_path {
        let pem = std::fs::read(ca_path)
            .with_context(|| format!("Failed to read CA certificate file: {}", ca_path))?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .with_context(|| format!("Invalid PEM certificate: {}", ca_path))?;
        builder.add_root_certificate(cert);
    }
    if strict_verify && config.ssl_mode == SslMode::VerifyCa {
        builder.danger_accept_invalid_hostnames(true);
    }

    let connector = builder.build().context("Failed to build TLS connector")?;
    Ok(MakeTlsConnector::new(connector))
}

/// Quote a value for use in a libpq key=value connection string.
/// Wraps in single quotes and escapes backslashes and single quotes.
fn quote_conn_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
