mod api;
mod catalog;
mod config;
mod covers;
mod models;
mod openapi;
mod player;
mod scan_manager;
mod scanner;
mod state;
mod volume;
mod walker;

use std::path::PathBuf;
use std::sync::Arc;

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::catalog::CatalogDb;
use crate::player::Player;
use crate::scan_manager::ScanManager;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "nostalgia-server")]
struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:8080
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Music library root directory
    #[arg(long)]
    music_dir: Option<PathBuf>,

    /// Optional server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,nostalgia_server=info")
        }))
        .init();

    let cfg = match args.config.as_ref() {
        Some(path) => config::ServerConfig::load(path)?,
        None => {
            let auto_path = std::env::current_exe()
                .ok()
                .and_then(|path| path.parent().map(|dir| dir.join("config.toml")));
            match auto_path.filter(|path| path.exists()) {
                Some(path) => config::ServerConfig::load(&path)?,
                None => return Err(anyhow::anyhow!("config file is required; use --config")),
            }
        }
    };
    let bind = match args.bind {
        Some(addr) => addr,
        None => config::bind_from_config(&cfg)?
            .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("default bind")),
    };
    let music_dir = match args.music_dir {
        Some(dir) => dir,
        None => config::music_dir_from_config(&cfg)?,
    };
    let storage_dir = config::storage_dir_from_config(&cfg);
    let db_path = config::catalog_db_path_from_config(&cfg, &storage_dir);
    let covers_dir = storage_dir.join("covers");

    tracing::info!(
        bind = %bind,
        music_dir = %music_dir.display(),
        db = %db_path.display(),
        "starting nostalgia-server"
    );

    let catalog = CatalogDb::open(&db_path)?;
    let scans = Arc::new(ScanManager::new(catalog.clone(), covers_dir.clone()));
    let player = Arc::new(Player::new(config::player_from_config(&cfg)));
    let covers = covers::CoverStore::new(covers_dir.clone())?;
    let covers_mount = covers.dir().to_path_buf();

    let _ = ctrlc::set_handler(move || {
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        } else {
            std::process::exit(0);
        }
    });

    let player_handle = player.clone();
    let state = web::Data::new(AppState {
        catalog,
        scans,
        player,
        music_dir,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default().exclude("/api/player/status"))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi::ApiDoc::openapi()),
            )
            .service(api::health::health)
            .service(api::scan_start)
            .service(api::scan_status)
            .service(api::scan_stop)
            .service(api::scan_events)
            .service(api::albums_list)
            .service(api::album_detail)
            .service(api::tracks_list)
            .service(api::track_by_path)
            .service(api::track_detail)
            .service(api::play)
            .service(api::pause)
            .service(api::resume)
            .service(api::toggle)
            .service(api::stop)
            .service(api::status)
            .service(api::volume_set)
            .service(api::volume_up)
            .service(api::volume_down)
            .service(api::volume10_set)
            .service(api::volume10_up)
            .service(api::volume10_down)
            .service(Files::new("/covers", covers_mount.clone()))
    })
    .bind(bind)?
    .run()
    .await?;

    // The engine is our child; leave nothing orphaned behind.
    player_handle.shutdown().await;

    Ok(())
}
