//! Tenant selection for incoming requests.

use axum::http::HeaderMap;

/// Tenant used when a request does not name one.
pub const DEFAULT_TENANT: &str = "default";

/// Derives the tenant name from request headers.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    header: Option<String>,
    default_tenant: String,
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(None, DEFAULT_TENANT)
    }
}

impl TenantResolver {
    /// Read the tenant from `header` when given, falling back to
    /// `default_tenant`.
    pub fn new(header: Option<String>, default_tenant: impl Into<String>) -> Self {
        Self {
            header: header.filter(|h| !h.trim().is_empty()),
            default_tenant: default_tenant.into(),
        }
    }

    /// Configure from `MAPINFO_TENANT_HEADER` and `MAPINFO_DEFAULT_TENANT`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("MAPINFO_TENANT_HEADER").ok(),
            std::env::var("MAPINFO_DEFAULT_TENANT").unwrap_or_else(|_| DEFAULT_TENANT.to_string()),
        )
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// Tenant name for a request with `headers`.
    pub fn resolve(&self, headers: &HeaderMap) -> String {
        self.header
            .as_deref()
            .and_then(|name| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|tenant| !tenant.is_empty())
            .unwrap_or(self.default_tenant.as_str())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_default_without_header_config() {
        let resolver = TenantResolver::default();
        let mut headers = HeaderMap::new();
        headers.insert("tenant", HeaderValue::from_static("acme"));
        assert_eq!(resolver.resolve(&headers), "default");
    }

    #[test]
    fn test_header_selects_tenant() {
        let resolver = TenantResolver::new(Some("X-Tenant".to_string()), "default");
        let mut headers = HeaderMap::new();
        assert_eq!(resolver.resolve(&headers), "default");

        headers.insert("x-tenant", HeaderValue::from_static(" acme "));
        assert_eq!(resolver.resolve(&headers), "acme");

        headers.insert("x-tenant", HeaderValue::from_static(""));
        assert_eq!(resolver.resolve(&headers), "default");
    }

    #[test]
    fn test_blank_header_name_is_ignored() {
        let resolver = TenantResolver::new(Some("  ".to_string()), "main");
        assert_eq!(resolver.header(), None);
        assert_eq!(resolver.resolve(&HeaderMap::new()), "main");
    }
}
