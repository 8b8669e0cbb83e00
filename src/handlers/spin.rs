use actix_web::http::Method;
use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::error::AppError;
use crate::models::*;
use crate::services::SpinService;

#[utoipa::path(
    get,
    path = "/spin",
    tag = "spin",
    responses(
        (status = 200, description = "抽奖成功", body = SpinResponse),
        (status = 405, description = "请求方法不支持", body = ErrorResponse),
        (status = 500, description = "读取或写入存储失败", body = ErrorResponse)
    )
)]
/// 转盘抽奖：按配置的算法抽取奖品，draw_and_commit 模式下同时扣减库存并更新当日统计
pub async fn spin(service: web::Data<SpinService>) -> Result<HttpResponse> {
    match service.draw().await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/update-inventory",
    tag = "spin",
    request_body = ConfirmSpinRequest,
    responses(
        (status = 200, description = "结果已记录", body = ConfirmSpinResponse),
        (status = 400, description = "缺少 PrizeId 或请求体无效", body = ErrorResponse),
        (status = 405, description = "请求方法不支持", body = ErrorResponse),
        (status = 500, description = "读取或写入存储失败", body = ErrorResponse)
    )
)]
/// 确认客户端抽奖结果：扣减库存并更新当日统计，无法确认的奖品按 Try Again 记录
pub async fn update_inventory(
    service: web::Data<SpinService>,
    request: web::Json<ConfirmSpinRequest>,
) -> Result<HttpResponse> {
    match service.confirm(&request).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(e.error_response()),
    }
}

/// 非预检的 OPTIONS 请求直接返回 200
async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

async fn method_not_allowed() -> HttpResponse {
    AppError::MethodNotAllowed.error_response()
}

/// 请求体解析失败统一返回 400；不强制 Content-Type，兼容 text/plain 提交
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .content_type_required(false)
        .error_handler(|err, _req| {
            AppError::ValidationError(format!("Invalid JSON body: {err}")).into()
        })
}

/// 路由配置
pub fn spin_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::resource("/spin")
                .route(web::get().to(spin))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/update-inventory")
                .route(web::post().to(update_inventory))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlgorithmSetting, SpinConfig, SpinFlow, WriteStrategy};
    use crate::external::{DocumentStore, MemoryStore};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn spin_service(store: Arc<MemoryStore>) -> SpinService {
        SpinService::new(
            store,
            SpinConfig {
                try_again_weight: 0.0,
                algorithm: AlgorithmSetting::Inventory,
                flow: SpinFlow::DrawAndCommit,
                inventory_write: WriteStrategy::CompareAndSwap,
                try_again_jitter: None,
                rng_seed: Some(11),
            },
        )
    }

    fn seeded_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_document(json!({
            "Prizes": [
                { "PrizeId": "A", "PrizeName": "Sticker", "Remaining": 2, "Quantity": 2 }
            ]
        })))
    }

    macro_rules! app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(spin_service($store)))
                    .service(web::scope("/api").configure(spin_config)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_get_spin_returns_result_and_stats() {
        let store = seeded_store();
        let app = app!(store.clone());

        let req = test::TestRequest::get().uri("/api/spin").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["result"]["PrizeId"], json!("A"));
        assert_eq!(body["result"]["PrizeName"], json!("Sticker"));
        assert_eq!(body["result"]["Index"], json!(0));
        assert!(body["result"]["utcDate"].is_string());
        assert_eq!(body["algorithm"], json!("inventory"));
        assert_eq!(body["stats"]["totalSpins"], json!(1));
        assert_eq!(store.get("Prizes/0/Remaining").await.unwrap(), Some(json!(1)));
    }

    #[actix_web::test]
    async fn test_wrong_methods_are_rejected() {
        let app = app!(seeded_store());

        let req = test::TestRequest::post().uri("/api/spin").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], json!("Method not allowed"));

        let req = test::TestRequest::get().uri("/api/update-inventory").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[actix_web::test]
    async fn test_options_is_ok() {
        let app = app!(seeded_store());
        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/spin")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_update_inventory_requires_prize_id() {
        let store = seeded_store();
        let app = app!(store.clone());

        let req = test::TestRequest::post()
            .uri("/api/update-inventory")
            .set_json(json!({ "Index": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], json!("PrizeId is required"));

        let req = test::TestRequest::post()
            .uri("/api/update-inventory")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(store.get("GameStats").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_update_inventory_records_prize() {
        let store = seeded_store();
        let app = app!(store.clone());

        let req = test::TestRequest::post()
            .uri("/api/update-inventory")
            .set_json(json!({ "PrizeId": "A", "Index": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["result"]["PrizeId"], json!("A"));
        assert_eq!(body["stats"]["updatedPrize"]["winCount"], json!(1));
        assert_eq!(body["stats"]["totalSpins"], json!(1));
        assert_eq!(store.get("Prizes/0/Remaining").await.unwrap(), Some(json!(1)));
    }

    #[actix_web::test]
    async fn test_malformed_catalog_is_500() {
        let store = Arc::new(MemoryStore::with_document(json!({ "Prizes": "broken" })));
        let app = app!(store);

        let req = test::TestRequest::get().uri("/api/spin").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], json!("Prizes is not an array"));
    }
}
