use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tradelog::JournalStore;

mod handlers;

/// Shared application state
pub struct AppState {
    pub store: JournalStore,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Starting tradelog server");

    let data_dir = std::env::var("TRADELOG_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let images_dir = std::env::var("TRADELOG_IMAGES_DIR").unwrap_or_else(|_| "images".to_string());
    let host = std::env::var("TRADELOG_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("TRADELOG_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    log::info!("Opening journal at: {data_dir} (images: {images_dir})");
    let store = JournalStore::open(&data_dir, &images_dir).expect("Failed to open journal store");

    let state = web::Data::new(AppState { store });

    log::info!("Listening on {host}:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(2 * 1024 * 1024))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
            .service(actix_files::Files::new(
                tradelog::attachment::MOUNT_PATH,
                state.store.attachments().root(),
            ))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
