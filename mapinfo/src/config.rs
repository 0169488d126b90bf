//! Tenant query configuration.
//!
//! A tenant's `mapinfoConfig.json` either describes a single query inline
//! or lists several under `queries`:
//!
//! ```json
//! {
//!   "service": "mapinfo",
//!   "config": {
//!     "db_url": "postgresql://qwc_service@db/qwc_demo",
//!     "queries": [
//!       {
//!         "info_title": "Country",
//!         "info_table": "qwc_geodb.ne_10m_admin_0_countries",
//!         "info_geom_col": "wkb_geometry",
//!         "info_display_col": "name"
//!       },
//!       {
//!         "info_title": ["Elevation", "Slope"],
//!         "info_sql": "SELECT elevation, slope FROM dem.summary WHERE ST_Intersects(geom, ST_SetSRID(ST_Point(:x, :y), :srid)) LIMIT 1"
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! Entries of a `queries` list inherit the top-level `db_url` when they do
//! not set their own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MapInfoError, Result};
use crate::sql::validate_identifier;

/// Schema assumed for tables configured without one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Label(s) attached to the values a query returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Title {
    One(String),
    Many(Vec<String>),
}

impl Title {
    /// Labels in order, a single title counting as a one-element list.
    pub fn labels(&self) -> &[String] {
        match self {
            Title::One(title) => std::slice::from_ref(title),
            Title::Many(titles) => titles,
        }
    }
}

/// A `schema.table` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    /// Parse `schema.table` or a bare `table` in [`DEFAULT_SCHEMA`].
    pub fn parse(value: &str) -> Result<Self> {
        let (schema, table) = match value.split_once('.') {
            Some((schema, table)) => (schema, table),
            None => (DEFAULT_SCHEMA, value),
        };
        validate_identifier(schema)?;
        validate_identifier(table)?;
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// The qualified name as used in SQL.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// A point-in-polygon lookup against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredQuery {
    pub table: TableRef,
    pub geometry_column: String,
    pub display_column: String,
    /// Additional SQL condition, ANDed with the containment test.
    pub extra_where: Option<String>,
}

/// How a query's SQL is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// SQL generated from table and column names.
    Structured(StructuredQuery),
    /// SQL supplied verbatim using `:x`, `:y` and `:srid` placeholders.
    Raw { sql: String },
}

/// One configured lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub title: Title,
    pub db_url: String,
    pub kind: QueryKind,
}

/// All lookups configured for a tenant, in result order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    queries: Vec<QueryConfig>,
}

/// Field names accepted in configuration documents.
#[derive(Debug, Default, Deserialize)]
struct QueryDocument {
    #[serde(default, alias = "title")]
    info_title: Option<Title>,
    #[serde(default, alias = "dbUrl")]
    db_url: Option<String>,
    #[serde(default, alias = "table")]
    info_table: Option<String>,
    #[serde(default, alias = "geometryColumn")]
    info_geom_col: Option<String>,
    #[serde(default, alias = "displayColumn")]
    info_display_col: Option<String>,
    #[serde(default, alias = "extraWhere")]
    info_where: Option<String>,
    #[serde(default, alias = "rawSql")]
    info_sql: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TenantDocument {
    #[serde(flatten)]
    flat: QueryDocument,
    #[serde(default)]
    queries: Vec<QueryDocument>,
}

impl TenantConfig {
    /// Build a tenant configuration from already-constructed queries.
    ///
    /// # Errors
    ///
    /// Returns [`MapInfoError::InvalidConfig`] if `queries` is empty or any
    /// query fails [`QueryConfig::validate`].
    pub fn new(queries: Vec<QueryConfig>) -> Result<Self> {
        let config = Self { queries };
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration document.
    ///
    /// Accepts either the bare configuration object or the service wrapper
    /// `{"service": "mapinfo", "config": {...}}`.
    pub fn from_value(document: Value) -> Result<Self> {
        let document = match document {
            Value::Object(mut map) if map.contains_key("config") => {
                map.remove("config").unwrap_or(Value::Null)
            }
            other => other,
        };
        if !document.is_object() {
            return Err(MapInfoError::invalid_config("expected a JSON object"));
        }

        let TenantDocument { flat, queries } = serde_json::from_value(document)?;
        let default_db_url = flat.db_url.clone();

        let queries = if queries.is_empty() {
            vec![flat.into_query(None)?]
        } else {
            queries
                .into_iter()
                .map(|query| query.into_query(default_db_url.as_deref()))
                .collect::<Result<Vec<_>>>()?
        };

        Self::new(queries)
    }

    /// Parse a configuration document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn queries(&self) -> &[QueryConfig] {
        &self.queries
    }

    /// Check structural invariants and identifier safety of every query.
    pub fn validate(&self) -> Result<()> {
        if self.queries.is_empty() {
            return Err(MapInfoError::invalid_config("no queries configured"));
        }
        for (index, query) in self.queries.iter().enumerate() {
            query.validate().map_err(|e| match e {
                MapInfoError::InvalidConfig { reason } => {
                    MapInfoError::invalid_config(format!("query {index}: {reason}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.db_url.trim().is_empty() {
            return Err(MapInfoError::invalid_config("db_url is empty"));
        }
        match &self.kind {
            QueryKind::Structured(query) => {
                if !matches!(self.title, Title::One(_)) {
                    return Err(MapInfoError::invalid_config(
                        "structured queries take a single info_title",
                    ));
                }
                validate_identifier(&query.table.schema)?;
                validate_identifier(&query.table.table)?;
                validate_identifier(&query.geometry_column)?;
                validate_identifier(&query.display_column)?;
            }
            QueryKind::Raw { sql } => {
                if sql.trim().is_empty() {
                    return Err(MapInfoError::invalid_config("info_sql is empty"));
                }
            }
        }
        Ok(())
    }
}

impl QueryDocument {
    fn into_query(self, default_db_url: Option<&str>) -> Result<QueryConfig> {
        let title = self
            .info_title
            .ok_or_else(|| MapInfoError::invalid_config("info_title is required"))?;
        let db_url = self
            .db_url
            .or_else(|| default_db_url.map(str::to_string))
            .ok_or_else(|| MapInfoError::invalid_config("db_url is required"))?;

        let structured = (
            self.info_table,
            self.info_geom_col,
            self.info_display_col,
            self.info_where,
        );

        let kind = match (self.info_sql, structured) {
            (Some(sql), (None, None, None, None)) => QueryKind::Raw { sql },
            (Some(_), _) => {
                return Err(MapInfoError::invalid_config(
                    "info_sql cannot be combined with info_table, info_geom_col, info_display_col or info_where",
                ))
            }
            (None, (Some(table), Some(geometry_column), Some(display_column), extra_where)) => {
                QueryKind::Structured(StructuredQuery {
                    table: TableRef::parse(&table)?,
                    geometry_column,
                    display_column,
                    extra_where: extra_where.filter(|clause| !clause.trim().is_empty()),
                })
            }
            (None, _) => {
                return Err(MapInfoError::invalid_config(
                    "either info_sql or all of info_table, info_geom_col and info_display_col are required",
                ))
            }
        };

        Ok(QueryConfig {
            title,
            db_url,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_structured_config() {
        let config = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_title": "Gemeinde",
            "info_table": "agi_hoheitsgrenzen_pub.hoheitsgrenzen_gemeindegrenze",
            "info_geom_col": "geometrie",
            "info_display_col": "gemeindename"
        }))
        .unwrap();

        assert_eq!(config.queries().len(), 1);
        let query = &config.queries()[0];
        assert_eq!(query.title, Title::One("Gemeinde".to_string()));
        assert_eq!(query.db_url, "postgresql://geo@localhost/geodb");
        let QueryKind::Structured(structured) = &query.kind else {
            panic!("expected structured query");
        };
        assert_eq!(structured.table.schema, "agi_hoheitsgrenzen_pub");
        assert_eq!(structured.table.table, "hoheitsgrenzen_gemeindegrenze");
        assert_eq!(structured.extra_where, None);
    }

    #[test]
    fn test_wrapped_config_with_queries() {
        let config = TenantConfig::from_value(json!({
            "$schema": "https://example.com/mapinfo.json",
            "service": "mapinfo",
            "config": {
                "db_url": "postgresql://geo@localhost/geodb",
                "queries": [
                    {
                        "info_title": "Country",
                        "info_table": "countries",
                        "info_geom_col": "wkb_geometry",
                        "info_display_col": "name",
                        "info_where": "continent = 'Europe'"
                    },
                    {
                        "db_url": "postgresql://dem@localhost/dem",
                        "info_title": ["Elevation", "Slope"],
                        "info_sql": "SELECT 1 AS elevation, 2 AS slope"
                    }
                ]
            }
        }))
        .unwrap();

        let queries = config.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].db_url, "postgresql://geo@localhost/geodb");
        assert_eq!(queries[1].db_url, "postgresql://dem@localhost/dem");

        let QueryKind::Structured(structured) = &queries[0].kind else {
            panic!("expected structured query");
        };
        assert_eq!(structured.table.schema, DEFAULT_SCHEMA);
        assert_eq!(structured.extra_where.as_deref(), Some("continent = 'Europe'"));
        assert!(matches!(queries[1].kind, QueryKind::Raw { .. }));
        assert_eq!(queries[1].title.labels(), ["Elevation", "Slope"]);
    }

    #[test]
    fn test_camel_case_aliases() {
        let config = TenantConfig::from_json(
            r#"{
                "dbUrl": "postgresql://geo@localhost/geodb",
                "title": "Country",
                "table": "qwc_geodb.ne_10m_admin_0_countries",
                "geometryColumn": "wkb_geometry",
                "displayColumn": "name",
                "extraWhere": "pop_est > 0"
            }"#,
        )
        .unwrap();
        let QueryKind::Structured(structured) = &config.queries()[0].kind else {
            panic!("expected structured query");
        };
        assert_eq!(structured.geometry_column, "wkb_geometry");
        assert_eq!(structured.extra_where.as_deref(), Some("pop_est > 0"));
    }

    #[test]
    fn test_empty_queries_falls_back_to_flat() {
        let config = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_title": "Title",
            "info_sql": "SELECT 'x' AS value",
            "queries": []
        }))
        .unwrap();
        assert_eq!(config.queries().len(), 1);
    }

    #[test]
    fn test_mode_must_be_exclusive() {
        let err = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_title": "Title",
            "info_sql": "SELECT 1",
            "info_table": "countries"
        }))
        .unwrap_err();
        assert!(matches!(err, MapInfoError::InvalidConfig { .. }));

        let err = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_title": "Title",
            "info_table": "countries",
            "info_geom_col": "geom"
        }))
        .unwrap_err();
        assert!(matches!(err, MapInfoError::InvalidConfig { .. }));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = TenantConfig::from_value(json!({
            "info_title": "Title",
            "info_sql": "SELECT 1"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("db_url"));

        let err = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_sql": "SELECT 1"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("info_title"));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let err = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_title": "Country",
            "info_table": "countries; DROP TABLE countries",
            "info_geom_col": "geom",
            "info_display_col": "name"
        }))
        .unwrap_err();
        assert!(matches!(err, MapInfoError::InvalidIdentifier { .. }));

        let err = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_title": "Country",
            "info_table": "a.b.c",
            "info_geom_col": "geom",
            "info_display_col": "name"
        }))
        .unwrap_err();
        assert!(matches!(err, MapInfoError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_structured_requires_single_title() {
        let err = TenantConfig::from_value(json!({
            "db_url": "postgresql://geo@localhost/geodb",
            "info_title": ["A", "B"],
            "info_table": "countries",
            "info_geom_col": "geom",
            "info_display_col": "name"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("query 0"));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(TenantConfig::from_value(json!([1, 2])).is_err());
        assert!(TenantConfig::from_value(json!({"config": "nope"})).is_err());
        assert!(TenantConfig::new(Vec::new()).is_err());
    }
}
