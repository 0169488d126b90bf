//! Map information lookups.
//!
//! [`MapInfoService`] answers "what is at this position" for a tenant by
//! running each of the tenant's configured queries and concatenating their
//! results.
//!
//! ```ignore
//! use mapinfo::MapInfoServiceBuilder;
//!
//! let service = MapInfoServiceBuilder::new("/srv/qwc_service/config")
//!     .cache_size(50)
//!     .build();
//!
//! let entries = service
//!     .lookup("default", Some("950820,6003926"), Some("EPSG:3857"))
//!     .await?;
//! // [InfoEntry("Country", "Switzerland")]
//! ```
//!
//! Within one lookup, connections are opened at most once per distinct
//! `db_url` and all of them are closed before the lookup returns. A query
//! that fails (connection error, SQL error, timeout) is logged and
//! contributes nothing; the remaining queries still run.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::{QueryConfig, QueryKind, TenantConfig};
use crate::db::{Connection, Connector, PgConnector, Row};
use crate::error::{MapInfoError, Result};
use crate::params::{parse_crs, parse_position, Position, Srid};
use crate::sql::{build_query, BoundQuery};
use crate::store::ConfigStore;

/// Default number of tenant configurations kept in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 100;

/// A `(title, value)` result pair, serialized as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoEntry(pub String, pub Value);

impl InfoEntry {
    pub fn title(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> &Value {
        &self.1
    }
}

/// Feature information lookup service.
pub struct MapInfoService {
    store: ConfigStore,
    connector: Arc<dyn Connector>,
    /// `None` leaves timeouts to the database driver.
    query_timeout: Option<Duration>,
}

impl MapInfoService {
    /// Create a service over `config_dir` using PostgreSQL connections and
    /// default settings.
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        MapInfoServiceBuilder::new(config_dir).build()
    }

    pub fn builder<P: AsRef<Path>>(config_dir: P) -> MapInfoServiceBuilder {
        MapInfoServiceBuilder::new(config_dir)
    }

    pub fn config_dir(&self) -> &Path {
        self.store.config_dir()
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Parse the request parameters, resolve the tenant configuration and
    /// run its queries.
    ///
    /// # Errors
    ///
    /// - [`MapInfoError::InvalidPosition`] / [`MapInfoError::InvalidCrs`] for
    ///   missing or malformed parameters (checked in that order, before any
    ///   configuration is read)
    /// - configuration errors from [`Self::tenant_config`]
    ///
    /// Query failures are not errors; see [`Self::query`].
    pub async fn lookup(
        &self,
        tenant: &str,
        pos: Option<&str>,
        crs: Option<&str>,
    ) -> Result<Vec<InfoEntry>> {
        let position = parse_position(pos.ok_or(MapInfoError::InvalidPosition)?)?;
        let srid = parse_crs(crs.ok_or(MapInfoError::InvalidCrs)?)?;

        let config = self.tenant_config(tenant).await?;
        Ok(self.query(&config, position, srid).await)
    }

    /// Resolve the configuration of `tenant`.
    pub async fn tenant_config(&self, tenant: &str) -> Result<Arc<TenantConfig>> {
        self.store.get(tenant).await
    }

    /// Run every configured query at `position` and concatenate the results
    /// in configuration order.
    pub async fn query(
        &self,
        config: &TenantConfig,
        position: Position,
        srid: Srid,
    ) -> Vec<InfoEntry> {
        let mut connections = ConnectionSet::new(self.connector.as_ref(), self.query_timeout);
        let mut entries = Vec::new();

        for (index, query) in config.queries().iter().enumerate() {
            match self.run_query(&mut connections, query, position, srid).await {
                Ok(Some(row)) => entries.extend(row_entries(query, row)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(query = index, error = %e, "Info query failed, skipping");
                }
            }
        }

        connections.close_all().await;

        tracing::debug!(
            x = position.x,
            y = position.y,
            srid = srid.code(),
            results = entries.len(),
            "Info lookup complete"
        );
        entries
    }

    async fn run_query(
        &self,
        connections: &mut ConnectionSet<'_>,
        query: &QueryConfig,
        position: Position,
        srid: Srid,
    ) -> Result<Option<Row>> {
        let bound = build_query(&query.kind, position, srid)?;
        tracing::debug!(sql = %bound.sql, "info query");
        tracing::debug!(x = position.x, y = position.y, srid = srid.code(), "params");

        connections.fetch_first(&query.db_url, &bound).await
    }
}

/// Convert a matched row into result pairs.
fn row_entries(query: &QueryConfig, row: Row) -> Vec<InfoEntry> {
    match &query.kind {
        QueryKind::Raw { .. } => query
            .title
            .labels()
            .iter()
            .zip(row.values())
            .map(|(title, value)| InfoEntry(title.clone(), value.clone()))
            .collect(),
        QueryKind::Structured(_) => {
            let title = query.title.labels().first().cloned().unwrap_or_default();
            let value = row.values().next().cloned().unwrap_or(Value::Null);
            vec![InfoEntry(title, value)]
        }
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| MapInfoError::Timeout { after })?,
        None => fut.await,
    }
}

enum Slot {
    Open(Box<dyn Connection>),
    /// Connecting failed earlier in this request.
    Failed(String),
}

/// Connections opened during one lookup, keyed by `db_url`.
struct ConnectionSet<'a> {
    connector: &'a dyn Connector,
    timeout: Option<Duration>,
    slots: HashMap<String, Slot>,
}

impl<'a> ConnectionSet<'a> {
    fn new(connector: &'a dyn Connector, timeout: Option<Duration>) -> Self {
        Self {
            connector,
            timeout,
            slots: HashMap::new(),
        }
    }

    async fn get(&mut self, db_url: &str) -> Result<&mut Box<dyn Connection>> {
        let slot = match self.slots.entry(db_url.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                match with_timeout(self.timeout, self.connector.connect(db_url)).await {
                    Ok(conn) => entry.insert(Slot::Open(conn)),
                    Err(e) => {
                        entry.insert(Slot::Failed(e.to_string()));
                        return Err(e);
                    }
                }
            }
        };

        match slot {
            Slot::Open(conn) => Ok(conn),
            Slot::Failed(reason) => Err(MapInfoError::Unavailable {
                reason: reason.clone(),
            }),
        }
    }

    /// Run `query` on the connection for `db_url`.
    ///
    /// A connection whose query timed out is closed and counts as failed for
    /// the rest of the request.
    async fn fetch_first(&mut self, db_url: &str, query: &BoundQuery) -> Result<Option<Row>> {
        let timeout = self.timeout;
        let conn = self.get(db_url).await?;
        let result = with_timeout(timeout, conn.fetch_first(query)).await;

        if let Err(e @ MapInfoError::Timeout { .. }) = &result {
            self.abandon(db_url, e.to_string()).await;
        }
        result
    }

    async fn abandon(&mut self, db_url: &str, reason: String) {
        let previous = self.slots.insert(db_url.to_string(), Slot::Failed(reason));
        if let Some(Slot::Open(conn)) = previous {
            if let Err(e) = with_timeout(self.timeout, conn.close()).await {
                tracing::debug!(db_url = %redact(db_url), error = %e, "Closing connection failed");
            }
        }
    }

    async fn close_all(self) {
        for (db_url, slot) in self.slots {
            if let Slot::Open(conn) = slot {
                if let Err(e) = conn.close().await {
                    tracing::debug!(db_url = %redact(&db_url), error = %e, "Closing connection failed");
                }
            }
        }
    }
}

/// Strip credentials from a connection URL for logging.
fn redact(db_url: &str) -> String {
    match (db_url.find("://"), db_url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &db_url[..scheme_end], &db_url[at..])
        }
        _ => db_url.to_string(),
    }
}

/// Builder for [`MapInfoService`].
pub struct MapInfoServiceBuilder {
    config_dir: PathBuf,
    cache_size: u64,
    cache_ttl: Option<Duration>,
    query_timeout: Option<Duration>,
    connector: Option<Arc<dyn Connector>>,
}

impl MapInfoServiceBuilder {
    /// Create a new builder reading tenant configuration from `config_dir`.
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl: None,
            query_timeout: None,
            connector: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `MAPINFO_CONFIG_PATH` | Directory containing `<tenant>/mapinfoConfig.json` | `config` |
    /// | `MAPINFO_CONFIG_CACHE_SIZE` | Maximum tenant configurations in cache | 100 |
    /// | `MAPINFO_CONFIG_TTL_SECS` | Seconds before a cached configuration is reloaded | never |
    /// | `MAPINFO_QUERY_TIMEOUT_SECS` | Timeout for each connection attempt and query | none |
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn from_env() -> Self {
        let config_dir =
            std::env::var("MAPINFO_CONFIG_PATH").unwrap_or_else(|_| "config".to_string());

        let mut builder = Self::new(config_dir);
        if let Some(size) = env_number("MAPINFO_CONFIG_CACHE_SIZE") {
            builder = builder.cache_size(size);
        }
        builder.cache_ttl = env_number("MAPINFO_CONFIG_TTL_SECS").map(Duration::from_secs);
        builder.query_timeout = env_number("MAPINFO_QUERY_TIMEOUT_SECS").map(Duration::from_secs);
        builder
    }

    /// Set the configuration directory.
    pub fn config_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of tenant configurations to keep in cache.
    ///
    /// Default is 100.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Reload cached tenant configurations after `ttl`.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Bound each connection attempt and each query by `timeout`.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Use `connector` instead of [`PgConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build the [`MapInfoService`].
    pub fn build(self) -> MapInfoService {
        MapInfoService {
            store: ConfigStore::new(&self.config_dir, self.cache_size, self.cache_ttl),
            connector: self.connector.unwrap_or_else(|| Arc::new(PgConnector)),
            query_timeout: self.query_timeout,
        }
    }
}

fn env_number(name: &str) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(variable = name, value = %value, "Ignoring non-numeric value");
            None
        }
    }
}
