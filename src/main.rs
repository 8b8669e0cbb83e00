use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use prize_wheel_backend::{
    config::{Config, SpinFlow, WriteStrategy},
    external::build_store,
    handlers,
    middlewares::create_cors,
    services::SpinService,
    swagger::swagger_config,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建存储客户端
    let store = build_store(&config.store).expect("Failed to create document store");
    log::info!(
        "Using {:?} store at {}, algorithm {:?}, inventory write {:?}",
        config.store.backend,
        config.store.url,
        config.spin.algorithm,
        config.spin.inventory_write
    );
    if config.spin.inventory_write == WriteStrategy::Overwrite {
        log::warn!("Inventory writes are unconditional, concurrent spins can over-award prizes");
    }

    let spin_service = SpinService::new(store, config.spin.clone());
    match spin_service.flow() {
        SpinFlow::DrawAndCommit => log::info!("GET /api/spin commits inventory and stats"),
        SpinFlow::ConfirmOnly => {
            log::info!("GET /api/spin only draws, POST /api/update-inventory commits")
        }
    }
    let allowed_origins = config.cors.allowed_origins.clone();

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&allowed_origins))
            .app_data(web::Data::new(spin_service.clone()))
            .configure(swagger_config)
            .service(web::scope("/api").configure(handlers::spin_config))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
