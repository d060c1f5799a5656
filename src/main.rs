mod api;
mod config;
mod db;
mod logger;
mod vfs;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use sqlx::postgres::PgPoolOptions;
use std::io;

use config::AppConfig;
use vfs::{LocalBlobStore, ManagerOptions, PostgresBackend, VfsManager};

// 应用状态
pub struct AppState {
    pub vfs_manager: VfsManager,
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 加载 .env
    dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| startup_error("配置错误", e))?;

    // 初始化日志系统
    let log_path = config.log_dir.join("app.log");
    if let Err(e) = logger::Logger::init(&log_path, config.log_level) {
        eprintln!("初始化日志系统失败: {}", e);
    }

    info!("应用程序启动");

    // 连接数据库
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| startup_error("数据库连接错误", e))?;

    // 初始化数据库
    db::initialize_db(pool.clone())
        .await
        .map_err(|e| startup_error("数据库初始化错误", e))?;

    let blobs = LocalBlobStore::new(&config.blob_dir)
        .map_err(|e| startup_error("文件存储目录初始化错误", e))?;

    let vfs_manager = VfsManager::new(
        PostgresBackend::new(pool),
        blobs,
        ManagerOptions {
            default_folder: config.default_folder.clone(),
            seed_user: config.seed_user.clone(),
            verify_blobs: config.verify_blobs,
            max_upload_bytes: config.max_upload_bytes,
        },
    );
    if let Err(e) = vfs_manager.seed_if_empty().await {
        error!("写入初始目录结构失败: {}", e);
    }

    let app_state = web::Data::new(AppState { vfs_manager });
    let max_upload_bytes = config.max_upload_bytes;

    info!("服务器启动在 http://{}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(api::json_config(max_upload_bytes))
            .app_data(api::query_config())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(api::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
