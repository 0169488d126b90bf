//! Error types for the MapInfo library.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while answering a map information request.
#[derive(Error, Debug)]
pub enum MapInfoError {
    /// The `pos` parameter is missing or not of the form `x,y`.
    #[error("Invalid position specified")]
    InvalidPosition,

    /// The `crs` parameter is missing or not of the form `EPSG:<code>`.
    #[error("Invalid projection specified")]
    InvalidCrs,

    /// A table, schema or column name from configuration failed validation.
    #[error("Invalid SQL identifier: {identifier:?}")]
    InvalidIdentifier { identifier: String },

    /// A raw SQL statement references a placeholder other than `:x`, `:y`, `:srid`.
    #[error("Unknown SQL placeholder: :{name}")]
    UnknownParameter { name: String },

    /// The tenant name cannot be used to locate configuration.
    #[error("Invalid tenant name: {tenant:?}")]
    InvalidTenant { tenant: String },

    /// No configuration file exists for the tenant.
    #[error("No mapinfo configuration for tenant {tenant:?} (looked in {path})")]
    TenantNotFound { tenant: String, path: PathBuf },

    /// The configuration document is well-formed JSON but semantically wrong.
    #[error("Invalid mapinfo configuration: {reason}")]
    InvalidConfig { reason: String },

    /// JSON syntax or shape error in a configuration document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error when reading configuration files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the database driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An earlier connection attempt to the same database failed during
    /// this request.
    #[error("Database unavailable: {reason}")]
    Unavailable { reason: String },

    /// A connection attempt or query exceeded the configured timeout.
    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },
}

impl MapInfoError {
    /// Whether this error was caused by the request parameters rather than
    /// configuration or infrastructure.
    pub fn is_parameter_error(&self) -> bool {
        matches!(self, Self::InvalidPosition | Self::InvalidCrs)
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`MapInfoError`].
pub type Result<T> = std::result::Result<T, MapInfoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            MapInfoError::InvalidPosition.to_string(),
            "Invalid position specified"
        );
        assert_eq!(
            MapInfoError::InvalidCrs.to_string(),
            "Invalid projection specified"
        );

        let err = MapInfoError::TenantNotFound {
            tenant: "acme".to_string(),
            path: PathBuf::from("/srv/config/acme/mapinfoConfig.json"),
        };
        assert!(err.to_string().contains("acme"));
        assert!(err.to_string().contains("mapinfoConfig.json"));

        let err = MapInfoError::UnknownParameter {
            name: "zoom".to_string(),
        };
        assert!(err.to_string().contains(":zoom"));
    }

    #[test]
    fn test_parameter_errors() {
        assert!(MapInfoError::InvalidPosition.is_parameter_error());
        assert!(MapInfoError::InvalidCrs.is_parameter_error());
        assert!(!MapInfoError::invalid_config("x").is_parameter_error());
    }
}
