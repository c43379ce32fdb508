//! Database related things.

use std::{
    fmt,
    fs,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use deadpool::managed::{Manager, Pool, PoolError};
use deadpool_postgres::{Config as PoolConfig, Runtime};
use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use tokio_postgres::{NoTls, SimpleQueryMessage};

use crate::prelude::*;


pub(crate) mod query;
mod row;

#[cfg(test)]
pub(crate) mod tests;

pub(crate) use self::{
    query::{sql, Ident, SqlQuery},
    row::Row,
};

#[cfg(test)]
pub(crate) use self::row::row;


#[derive(Debug, confique::Config)]
pub(crate) struct DbConfig {
    /// The username of the database user.
    #[config(default = "wordpress")]
    pub(crate) user: String,

    /// The password of the database user. Can also be set via the
    /// `WPGATE_DB_PASSWORD` environment variable.
    #[config(env = "WPGATE_DB_PASSWORD")]
    pub(crate) password: SecretString,

    /// The host the database server is running on.
    #[config(default = "127.0.0.1")]
    pub(crate) host: String,

    /// The port the database server is listening on.
    #[config(default = 5432)]
    pub(crate) port: u16,

    /// The name of the database to use.
    #[config(default = "wordpress")]
    pub(crate) database: String,

    /// The table prefix of the WordPress installation (`$table_prefix` in
    /// `wp-config.php`). Users are read from the table `<prefix>users`.
    #[config(default = "wp_")]
    pub(crate) table_prefix: String,

    /// Maximum number of connections held by the pool.
    #[config(default = 10)]
    pub(crate) pool_size: usize,

    /// How long to wait for a free connection if all connections of the pool
    /// are in use. "0" means waiting indefinitely.
    #[config(default = "0", deserialize_with = crate::config::deserialize_duration)]
    pub(crate) acquire_timeout: Duration,

    /// The TLS mode for the database connection.
    ///
    /// - "on": encryption is required and the server certificate is validated
    ///    against trusted certificates which are loaded from the system's
    ///    native certificate store. If `server_cert` is set, that's also
    ///    loaded and trusted.
    /// - "off": no encryption. Discouraged.
    #[config(default = "on")]
    pub(crate) tls_mode: TlsMode,

    /// Path to the server certificate. This makes sense if you don't want to
    /// install the certificate globally on the system. Has to be a PEM encoded
    /// file containing one or more X509 certificates.
    pub(crate) server_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum TlsMode {
    Off,
    On,
}

impl DbConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.server_cert.is_some() && self.tls_mode != TlsMode::On {
            bail!(r#"`db.server_cert` is set, but TLS mode is NOT "on", which makes no sense"#);
        }
        if self.pool_size == 0 {
            bail!("`db.pool_size` must be at least 1");
        }

        Ok(())
    }

    /// Name of the WordPress users table.
    pub(crate) fn users_table(&self) -> Ident {
        Ident(format!("{}users", self.table_prefix))
    }
}


/// Errors from the database layer.
#[derive(Debug, thiserror::Error)]
pub(crate) enum DbError {
    /// No connection could be obtained from the pool.
    #[error("failed to obtain DB connection: {0}")]
    Connection(String),

    /// The database rejected the query or returned something unexpected.
    #[error("DB error when executing query: {0}")]
    Query(String),
}

impl From<tokio_postgres::Error> for DbError {
    fn from(src: tokio_postgres::Error) -> Self {
        debug!("Detailed DB error: {src:#?}");
        match src.as_db_error() {
            Some(db_error) => Self::Query(db_error.to_string()),
            None if src.is_closed() => Self::Connection(src.to_string()),
            None => Self::Query(src.to_string()),
        }
    }
}

/// A single database connection that can execute escaped queries.
pub(crate) trait Connection: Send + Sync {
    fn query(&self, query: &SqlQuery) -> impl Future<Output = Result<Vec<Row>, DbError>> + Send;
}

impl Connection for deadpool_postgres::ClientWrapper {
    async fn query(&self, query: &SqlQuery) -> Result<Vec<Row>, DbError> {
        trace!("Executing SQL query: \"{}\"", query);

        let mut columns: Option<Arc<[String]>> = None;
        let mut rows = Vec::new();
        for message in self.simple_query(query.as_str()).await? {
            if let SimpleQueryMessage::Row(row) = message {
                let columns = columns.get_or_insert_with(|| {
                    row.columns().iter().map(|c| c.name().to_owned()).collect()
                });
                let values = (0..row.len())
                    .map(|i| row.get(i).map(str::to_owned))
                    .collect();
                rows.push(Row::new(Arc::clone(columns), values));
            }
        }

        Ok(rows)
    }
}


/// The pool of DB connections. Every operation that needs the database goes
/// through `with_connection`. Cheap to clone.
pub(crate) struct Db<M: Manager = deadpool_postgres::Manager> {
    pool: Pool<M>,
}

impl<M: Manager> Clone for Db<M> {
    fn clone(&self) -> Self {
        Self { pool: self.pool.clone() }
    }
}

impl<M> Db<M>
where
    M: Manager,
    M::Type: Connection,
    M::Error: fmt::Display,
{
    pub(crate) fn new(pool: Pool<M>) -> Self {
        Self { pool }
    }

    /// Leases one connection from the pool, runs `op` with it and returns the
    /// connection to the pool afterwards, regardless of the outcome of `op`.
    /// Waits if all connections are currently leased. If no connection can be
    /// obtained, `op` is not called and `DbError::Connection` is returned.
    pub(crate) async fn with_connection<T, F>(&self, op: F) -> Result<T, DbError>
    where
        F: for<'c> FnOnce(&'c M::Type) -> BoxFuture<'c, Result<T, DbError>>,
    {
        let before = Instant::now();
        let conn = self.pool.get().await.map_err(|e| {
            error!("Failed to obtain DB connection: {e}");
            DbError::Connection(describe_pool_error(e))
        })?;

        let acquire_conn_time = before.elapsed();
        if acquire_conn_time > Duration::from_millis(5) {
            warn!("Acquiring DB connection from pool took {:.2?}", acquire_conn_time);
        }

        // The connection goes back to the pool when `conn` is dropped, which
        // also happens if `op` panics.
        let out = op(&*conn).await;
        drop(conn);
        out
    }

    pub(crate) fn status(&self) -> deadpool::Status {
        self.pool.status()
    }
}

fn describe_pool_error<E: fmt::Display>(e: PoolError<E>) -> String {
    match e {
        PoolError::Timeout(_) => "timed out waiting for a free connection".into(),
        PoolError::Closed => "pool has been closed".into(),
        other => other.to_string(),
    }
}


/// Creates a new database connection pool and checks that the database is
/// reachable.
pub(crate) async fn create_pool(config: &DbConfig) -> Result<Db> {
    let mut pool_settings = deadpool_postgres::PoolConfig::new(config.pool_size);
    if !config.acquire_timeout.is_zero() {
        pool_settings.timeouts.wait = Some(config.acquire_timeout);
    }

    let pool_config = PoolConfig {
        user: Some(config.user.clone()),
        password: Some(config.password.expose_secret().to_owned()),
        host: Some(config.host.clone()),
        port: Some(config.port),
        dbname: Some(config.database.clone()),
        ssl_mode: Some(if config.tls_mode == TlsMode::Off {
            deadpool_postgres::SslMode::Disable
        } else {
            deadpool_postgres::SslMode::Require
        }),
        application_name: Some("wpgate".into()),
        pool: Some(pool_settings),
        .. PoolConfig::default()
    };

    debug!(
        "Connecting to 'postgresql://{}:*****@{}:{}/{}' (TLS: {:?}, pool size: {})",
        config.user,
        config.host,
        config.port,
        config.database,
        config.tls_mode,
        config.pool_size,
    );

    let pool = if config.tls_mode == TlsMode::Off {
        pool_config.create_pool(Some(Runtime::Tokio1), NoTls)?
    } else {
        let mut root_certs = rustls::RootCertStore::empty();
        let system_certs = rustls_native_certs::load_native_certs();
        for e in &system_certs.errors {
            warn!("Error while loading system-wide certificates: {e}");
        }
        let (system_count, _) = root_certs.add_parsable_certificates(system_certs.certs);
        debug!("Loaded {system_count} system-wide certificates");

        if let Some(cert_path) = &config.server_cert {
            let custom_count = load_pem_file(cert_path, &mut root_certs)
                .with_context(|| format!("failed to load '{}'", cert_path.display()))?;
            debug!("Loaded {} certificates from '{}'", custom_count, cert_path.display());
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_certs)
            .with_no_client_auth();
        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        pool_config.create_pool(Some(Runtime::Tokio1), tls)?
    };
    info!("Created database pool");


    // Test the connection by executing a simple query.
    let client = pool.get().await
        .context("failed to get DB connection")?;
    client.simple_query("select 1").await
        .context("failed to execute DB test query")?;
    debug!("Successfully tested database connection with test query");
    drop(client);

    Ok(Db::new(pool))
}

/// Loads the PEM file at `path` and adds all X509 certificates in it to
/// `root_certs`. Returns the number of certs added to `root_certs`.
fn load_pem_file(path: &Path, root_certs: &mut rustls::RootCertStore) -> Result<usize> {
    let file = fs::read(path).context("could not read file")?;

    let mut count = 0;
    for cert in rustls_pemfile::certs(&mut &*file) {
        let cert = cert.context("could not parse file as PEM")?;
        root_certs.add(cert).context("failed to load X509 certificate")?;
        count += 1;
    }

    if count == 0 {
        bail!("file does not contain any X509 certificates");
    }

    Ok(count)
}
