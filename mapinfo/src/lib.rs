//! # MapInfo - feature information at a map position
//!
//! Answers "what is here?" for a clicked map position: given a position, its
//! CRS and a tenant, the configured PostGIS queries are run and the
//! attributes of the containing features are returned as `(title, value)`
//! pairs.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mapinfo::MapInfoService;
//!
//! let service = MapInfoService::new("/srv/qwc_service/config");
//! let entries = service
//!     .lookup("default", Some("950820,6003926"), Some("EPSG:3857"))
//!     .await?;
//! for entry in &entries {
//!     println!("{}: {}", entry.title(), entry.value());
//! }
//! ```
//!
//! ## Configuration
//!
//! Tenants are configured with `<config_dir>/<tenant>/mapinfoConfig.json`,
//! see [`config`] for the format. A query is either *structured* (a table
//! with geometry and display columns, optionally an extra `WHERE` clause) or
//! *raw* (a SQL statement using the placeholders `:x`, `:y` and `:srid`).

pub mod config;
pub mod db;
pub mod error;
pub mod params;
pub mod service;
pub mod sql;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::{QueryConfig, QueryKind, StructuredQuery, TableRef, TenantConfig, Title};
pub use db::{Connection, Connector, PgConnector, Row};
pub use error::{MapInfoError, Result};
pub use params::{Position, Srid};
pub use service::{InfoEntry, MapInfoService, MapInfoServiceBuilder};
pub use store::ConfigStore;
