//! Tenant configuration store with caching.
//!
//! Each tenant's configuration lives at
//! `<config_dir>/<tenant>/mapinfoConfig.json`. Parsed configurations are
//! kept in a bounded cache, optionally expiring after a time-to-live so that
//! edits are picked up without a restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::config::TenantConfig;
use crate::error::{MapInfoError, Result};

/// File name of a tenant's configuration inside its directory.
pub const CONFIG_FILE_NAME: &str = "mapinfoConfig.json";

/// Loads and caches [`TenantConfig`]s from a configuration directory.
pub struct ConfigStore {
    config_dir: PathBuf,
    cache: Cache<String, Arc<TenantConfig>>,
}

impl ConfigStore {
    /// Create a store reading from `config_dir`, caching up to `capacity`
    /// tenants. Cached entries expire after `ttl` when one is given.
    pub fn new<P: AsRef<Path>>(config_dir: P, capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            cache: builder.build(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the configuration file for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`MapInfoError::InvalidTenant`] for names that could escape
    /// the configuration directory.
    pub fn config_path(&self, tenant: &str) -> Result<PathBuf> {
        validate_tenant(tenant)?;
        Ok(self.config_dir.join(tenant).join(CONFIG_FILE_NAME))
    }

    /// Configuration for `tenant`, from cache or disk.
    pub async fn get(&self, tenant: &str) -> Result<Arc<TenantConfig>> {
        let path = self.config_path(tenant)?;

        if let Some(config) = self.cache.get(tenant) {
            return Ok(config);
        }

        let config = Arc::new(load_config(tenant, &path).await?);
        tracing::info!(
            tenant,
            path = %path.display(),
            queries = config.queries().len(),
            "Loaded tenant configuration"
        );
        self.cache.insert(tenant.to_string(), config.clone());
        Ok(config)
    }

    /// Drop a tenant's cached configuration.
    pub fn invalidate(&self, tenant: &str) {
        self.cache.invalidate(tenant);
    }

    /// Number of cached tenant configurations.
    pub fn cached_tenants(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

async fn load_config(tenant: &str, path: &Path) -> Result<TenantConfig> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MapInfoError::TenantNotFound {
                tenant: tenant.to_string(),
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    TenantConfig::from_json(&text)
}

fn validate_tenant(tenant: &str) -> Result<()> {
    let valid = !tenant.is_empty()
        && tenant != "."
        && tenant != ".."
        && tenant
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(MapInfoError::InvalidTenant {
            tenant: tenant.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const COUNTRIES: &str = r#"{
        "service": "mapinfo",
        "config": {
            "db_url": "postgresql://qwc_service@localhost/qwc_demo",
            "info_title": "Country",
            "info_table": "qwc_geodb.ne_10m_admin_0_countries",
            "info_geom_col": "wkb_geometry",
            "info_display_col": "name"
        }
    }"#;

    fn write_config(dir: &Path, tenant: &str, contents: &str) {
        let tenant_dir = dir.join(tenant);
        fs::create_dir_all(&tenant_dir).unwrap();
        fs::write(tenant_dir.join(CONFIG_FILE_NAME), contents).unwrap();
    }

    #[tokio::test]
    async fn test_load_and_cache() {
        let temp_dir = TempDir::new().unwrap();
        write_config(temp_dir.path(), "default", COUNTRIES);

        let store = ConfigStore::new(temp_dir.path(), 10, None);
        let first = store.get("default").await.unwrap();
        assert_eq!(first.queries().len(), 1);

        // Removing the file does not affect the cached entry.
        fs::remove_file(temp_dir.path().join("default").join(CONFIG_FILE_NAME)).unwrap();
        let second = store.get("default").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.cached_tenants(), 1);

        store.invalidate("default");
        assert!(matches!(
            store.get("default").await,
            Err(MapInfoError::TenantNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_tenants_are_separate() {
        let temp_dir = TempDir::new().unwrap();
        write_config(temp_dir.path(), "default", COUNTRIES);
        write_config(
            temp_dir.path(),
            "acme",
            r#"{"db_url": "postgresql://localhost/acme", "info_title": "Parcel", "info_sql": "SELECT 'p1' AS id"}"#,
        );

        let store = ConfigStore::new(temp_dir.path(), 10, None);
        let default = store.get("default").await.unwrap();
        let acme = store.get("acme").await.unwrap();
        assert_ne!(default, acme);
        assert_eq!(acme.queries()[0].db_url, "postgresql://localhost/acme");
    }

    #[tokio::test]
    async fn test_missing_tenant() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path(), 10, None);

        let err = store.get("nobody").await.unwrap_err();
        assert!(matches!(err, MapInfoError::TenantNotFound { tenant, .. } if tenant == "nobody"));
    }

    #[tokio::test]
    async fn test_malformed_config_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        write_config(temp_dir.path(), "default", "{ not json");

        let store = ConfigStore::new(temp_dir.path(), 10, None);
        assert!(matches!(
            store.get("default").await,
            Err(MapInfoError::Json(_))
        ));

        write_config(temp_dir.path(), "default", COUNTRIES);
        assert!(store.get("default").await.is_ok());
    }

    #[test]
    fn test_tenant_names() {
        let store = ConfigStore::new("/srv/config", 10, None);
        assert_eq!(
            store.config_path("acme-1.prod").unwrap(),
            PathBuf::from("/srv/config/acme-1.prod/mapinfoConfig.json")
        );

        for bad in ["", ".", "..", "../etc", "a/b", "a\\b", "ten ant"] {
            assert!(
                matches!(store.config_path(bad), Err(MapInfoError::InvalidTenant { .. })),
                "{bad:?}"
            );
        }
    }
}
