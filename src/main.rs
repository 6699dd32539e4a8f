use std::net::SocketAddr;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use xapi::config::{Config, LogFormat};
use xapi::handlers::{
    AdvancedConfigListResponse, AdvancedConfigResponse, CopyRequestInfoResponse,
    HistoryEntryResponse, MessageResponse, ProjectRequestAction, RequestInfoListResponse,
    RequestInfoResponse, SaveAdvancedConfigRequest, SaveRequestInfoRequest,
    SaveRequestInfoResponse, SendRequestBody,
};
use xapi::state::AppState;
use xapi::{build_router, handlers};

/// Security scheme for Bearer token
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::send::send_request,
        handlers::history::get_request_history,
        handlers::request_info::save_request_info,
        handlers::request_info::copy_request_info,
        handlers::request_info::delete_request_info,
        handlers::request_info::list_project_requests,
        handlers::advanced_config::create_advanced_config,
        handlers::advanced_config::list_advanced_configs,
        handlers::advanced_config::get_advanced_config,
        handlers::advanced_config::update_advanced_config,
        handlers::advanced_config::delete_advanced_config,
    ),
    components(schemas(
        SendRequestBody,
        HistoryEntryResponse,
        SaveRequestInfoRequest,
        SaveRequestInfoResponse,
        ProjectRequestAction,
        CopyRequestInfoResponse,
        RequestInfoResponse,
        RequestInfoListResponse,
        SaveAdvancedConfigRequest,
        AdvancedConfigResponse,
        AdvancedConfigListResponse,
        MessageResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Requests", description = "Send and manage saved requests"),
        (name = "History", description = "Execution history of saved requests"),
        (name = "Advanced Config", description = "Pre-request configuration")
    )
)]
struct ApiDoc;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);
    let addr = config.server_addr();

    tracing::info!("Connecting to database...");
    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    tracing::info!("Database connection established");

    let app = build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server started on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
