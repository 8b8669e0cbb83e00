use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;
use crate::services::SelectionMode;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::spin::spin,
        handlers::spin::update_inventory,
    ),
    components(
        schemas(
            PrizeRecord,
            SpinResult,
            SpinStats,
            PrizeWinCount,
            SpinResponse,
            ConfirmSpinRequest,
            ConfirmSpinResponse,
            ErrorResponse,
            SelectionMode,
        )
    ),
    tags(
        (name = "spin", description = "Prize wheel API"),
    ),
    info(
        title = "Prize Wheel Backend API",
        version = "1.0.0",
        description = "Weighted prize wheel with inventory and daily statistics"
    ),
    servers(
        (url = "/api", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
