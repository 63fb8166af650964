use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::sync::Arc;

mod api;
mod auth;
mod commands;
mod config;
mod db;
mod docs;
mod engine;
mod model;
mod models;
mod notify;
mod report;
mod routes;
mod store;
mod sweep;

use config::Config;
use db::init_db;

use crate::engine::AttendanceEngine;
use crate::notify::TracingNotifier;
use crate::report::ReportingReader;
use crate::store::mysql::MySqlStore;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "FaceTrack attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    let pool = init_db(&config.database_url).await?;

    if std::env::args().nth(1).as_deref() == Some("create-admin") {
        let seed = commands::AdminSeed::from_lookup(|key| std::env::var(key).ok())?;
        let created = commands::create_admin(&pool, &seed).await?;
        println!(
            "{}",
            if created {
                "Admin user created successfully."
            } else {
                "User with this email already exists."
            }
        );
        return Ok(());
    }

    info!("Server starting...");
    info!(
        start = %config.policy.working_hours_start,
        end = %config.policy.working_hours_end,
        threshold = config.policy.recognition_threshold,
        offset = %config.policy.timezone,
        "Attendance policy loaded"
    );

    let store = Arc::new(MySqlStore::new(pool.clone()));
    let notifier = Arc::new(TracingNotifier::new(config.policy.timezone));
    let engine = Arc::new(AttendanceEngine::new(
        config.policy.clone(),
        store.clone(),
        store.clone(),
        notifier,
    ));
    let reader = ReportingReader::new(store.clone(), store);

    if config.absence_sweep_enabled {
        sweep::spawn_absence_sweep(engine.clone(), config.absence_sweep_grace);
    } else {
        warn!("Absentee sweep disabled; use POST /attendance/absentees/{{date}}");
    }

    let server_addr = config.server_addr.clone();
    let openapi = docs::api_doc(&config.api_prefix);
    let engine_data = Data::from(engine);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", openapi.clone()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(engine_data.clone())
            .app_data(Data::new(reader.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
