//! MapInfo Service - HTTP microservice for map feature information.
//!
//! Returns attributes of the features containing a clicked map position,
//! e.g. the municipality or country name shown in a map viewer's info panel.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MAPINFO_CONFIG_PATH` | Directory containing `<tenant>/mapinfoConfig.json` | `config` |
//! | `MAPINFO_CONFIG_CACHE_SIZE` | Maximum tenant configurations in cache | 100 |
//! | `MAPINFO_CONFIG_TTL_SECS` | Seconds before cached configurations are reloaded | never |
//! | `MAPINFO_QUERY_TIMEOUT_SECS` | Timeout per connection attempt and query | none |
//! | `MAPINFO_TENANT_HEADER` | Request header naming the tenant | None |
//! | `MAPINFO_DEFAULT_TENANT` | Tenant used without tenant header | `default` |
//! | `MAPINFO_PORT` | HTTP server port | 5016 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /?pos=x,y&crs=EPSG:code` - Feature information at a position
//! - `GET /healthz` - Liveness check
//! - `GET /ready` - Readiness check
//! - `GET /api/` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use mapinfo::MapInfoServiceBuilder;
use mapinfo_service::{handlers, tenant::TenantResolver, AppState};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the MapInfo service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MapInfo service API",
        version = "1.0",
        description = "Additional information at a geographic position displayed with right mouse click on map.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(handlers::get_mapinfo, handlers::healthz, handlers::ready),
    components(
        schemas(
            handlers::MapInfoResponse,
            handlers::ErrorResponse,
            handlers::StatusResponse,
        )
    ),
    tags(
        (name = "mapinfo", description = "MapInfo operations"),
        (name = "system", description = "Health check endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mapinfo=info,mapinfo_service=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("MAPINFO_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5016);

    let mapinfo_service = MapInfoServiceBuilder::from_env().build();
    let tenants = TenantResolver::from_env();

    if !mapinfo_service.config_dir().is_dir() {
        tracing::warn!(
            config_dir = %mapinfo_service.config_dir().display(),
            "Configuration directory does not exist, lookups will fail until it is created"
        );
    }

    tracing::info!(
        config_dir = %mapinfo_service.config_dir().display(),
        query_timeout = ?mapinfo_service.query_timeout(),
        tenant_header = ?tenants.header(),
        port = port,
        "Starting MapInfo service"
    );

    let state = Arc::new(AppState {
        mapinfo_service,
        tenants,
    });

    let app = mapinfo_service::router(state)
        .merge(SwaggerUi::new("/api/").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
