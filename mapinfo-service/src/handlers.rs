//! HTTP request handlers for the map information service.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use mapinfo::{InfoEntry, MapInfoError};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::OptionalAuth;
use crate::AppState;

/// Successful lookup response.
#[derive(Debug, Serialize, ToSchema)]
pub struct MapInfoResponse {
    /// `[title, value]` pairs in configuration order.
    #[schema(value_type = Vec<Vec<Object>>)]
    pub results: Vec<InfoEntry>,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Always `OK`.
    pub status: String,
}

/// Return information about the features at a map position.
///
/// # Query Parameters
///
/// - `pos`: Map position as `x,y`
/// - `crs`: CRS of the position as `EPSG:<code>`
///
/// Parameter names are case-insensitive.
///
/// # Returns
///
/// - `200 OK` with `{"results": [...]}`
/// - `200 OK` with `{"error": ...}` if `pos` or `crs` is missing or invalid
/// - `500 Internal Server Error` if the tenant configuration cannot be loaded
#[utoipa::path(
    get,
    path = "/",
    tag = "mapinfo",
    params(
        ("pos" = String, Query, description = "Map position: x,y", example = "950820,6003926"),
        ("crs" = String, Query, description = "CRS of the map position coordinates", example = "EPSG:3857")
    ),
    responses(
        (status = 200, description = "Lookup results, or an error for invalid parameters", body = MapInfoResponse),
        (status = 500, description = "Tenant configuration unavailable", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_mapinfo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    auth: OptionalAuth,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let tenant = state.tenants.resolve(&headers);
    let pos = query_param(&params, "pos");
    let crs = query_param(&params, "crs");

    tracing::debug!(
        tenant = %tenant,
        pos = ?pos,
        crs = ?crs,
        authenticated = auth.is_authenticated(),
        "MapInfo query"
    );

    match state.mapinfo_service.lookup(&tenant, pos, crs).await {
        Ok(results) => {
            tracing::info!(tenant = %tenant, results = results.len(), "MapInfo lookup");
            (StatusCode::OK, Json(MapInfoResponse { results })).into_response()
        }
        Err(e) => error_response(&tenant, e),
    }
}

/// Message returned for failures other than bad parameters.
const INTERNAL_ERROR: &str = "Internal server error";

/// Create an error response for lookups.
///
/// Parameter errors are reported with status 200, which is what map clients
/// of this service expect. Other errors are only detailed in the log.
fn error_response(tenant: &str, e: MapInfoError) -> axum::response::Response {
    let (status, error) = if e.is_parameter_error() {
        tracing::debug!(tenant = %tenant, error = %e, "Rejected MapInfo parameters");
        (StatusCode::OK, e.to_string())
    } else {
        tracing::error!(tenant = %tenant, error = %e, "MapInfo configuration unavailable");
        (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR.to_string())
    };

    (status, Json(ErrorResponse { error })).into_response()
}

/// First value of a query parameter, ignoring the case of its name.
fn query_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "system",
    responses((status = 200, description = "Service is alive", body = StatusResponse))
)]
pub async fn healthz() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK".to_string(),
    })
}

/// Readiness check.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "system",
    responses((status = 200, description = "Service is ready", body = StatusResponse))
)]
pub async fn ready() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_case_insensitive() {
        let params = vec![
            ("POS".to_string(), "1,2".to_string()),
            ("crs".to_string(), "EPSG:3857".to_string()),
        ];

        assert_eq!(query_param(&params, "pos"), Some("1,2"));
        assert_eq!(query_param(&params, "crs"), Some("EPSG:3857"));
        assert_eq!(query_param(&params, "zoom"), None);
    }

    #[test]
    fn test_query_param_first_occurrence_wins() {
        let params = vec![
            ("Pos".to_string(), "1,2".to_string()),
            ("pos".to_string(), "3,4".to_string()),
            ("POS".to_string(), "5,6".to_string()),
        ];

        assert_eq!(query_param(&params, "pos"), Some("1,2"));
    }

    #[test]
    fn test_error_response_status() {
        let err = MapInfoError::TenantNotFound {
            tenant: "acme".to_string(),
            path: "/srv/config/acme/mapinfoConfig.json".into(),
        };
        let response = error_response("acme", err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = error_response("acme", MapInfoError::InvalidCrs);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_mapinfo_response_serialize() {
        let response = MapInfoResponse {
            results: vec![InfoEntry("Country".to_string(), json!("Switzerland"))],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"results": [["Country", "Switzerland"]]}));
    }

    #[test]
    fn test_error_response_serialize() {
        let response = ErrorResponse {
            error: MapInfoError::InvalidPosition.to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"error":"Invalid position specified"}"#);
    }
}
