use actix_cors::Cors;
use actix_web::http::header;

/// 仅回显白名单中的来源
pub fn create_cors(allowed_origins: &[String]) -> Cors {
    let allowed = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            allowed.iter().any(|o| o.as_bytes() == origin.as_bytes())
        })
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600)
}
