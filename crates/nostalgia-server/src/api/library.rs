//! Library and scan API handlers.

use std::path::PathBuf;

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::catalog::{AlbumRecord, TrackRecord};
use crate::models::{
    AlbumDetailResponse, ErrorResponse, ScanStartRequest, ScanStartResponse, ScanStatusResponse,
    ScanStopResponse,
};
use crate::state::AppState;

use super::db_error;

/// Query parameters for album/track listings.
#[derive(Deserialize, ToSchema)]
pub struct ListQuery {
    /// Optional case-insensitive title substring filter.
    pub search: Option<String>,
    /// Page size (default 100, capped at 500).
    pub limit: Option<i64>,
    /// Page offset.
    pub offset: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Query parameters for exact-path track lookup.
#[derive(Deserialize, ToSchema)]
pub struct TrackPathQuery {
    /// Full source file path, as stored in the catalog.
    pub path: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/library/scan/start",
    request_body = ScanStartRequest,
    responses(
        (status = 200, description = "Scan job started or already running", body = ScanStartResponse),
        (status = 400, description = "Scan root does not exist", body = ErrorResponse)
    )
)]
#[post("/api/library/scan/start")]
/// Start a library scan, or return the running job unchanged.
pub async fn scan_start(
    state: web::Data<AppState>,
    body: Option<web::Json<ScanStartRequest>>,
) -> impl Responder {
    let root = body
        .as_ref()
        .and_then(|b| b.root_dir.as_deref())
        .map(PathBuf::from)
        .unwrap_or_else(|| state.music_dir.clone());

    if !root.is_dir() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: format!("scan root {:?} is not a directory", root),
        });
    }

    let (job, already_running) = state.scans.start_scan(root);
    HttpResponse::Ok().json(ScanStartResponse {
        job,
        already_running,
    })
}

#[utoipa::path(
    get,
    path = "/api/library/scan/status",
    responses(
        (status = 200, description = "Current scan job, null when none has run", body = ScanStatusResponse)
    )
)]
#[get("/api/library/scan/status")]
/// Report the current scan job.
pub async fn scan_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ScanStatusResponse {
        job: state.scans.status(),
    })
}

#[utoipa::path(
    post,
    path = "/api/library/scan/stop",
    responses(
        (status = 200, description = "Cancellation requested", body = ScanStopResponse),
        (status = 409, description = "No running scan", body = ErrorResponse)
    )
)]
#[post("/api/library/scan/stop")]
/// Request cancellation of the running scan.
pub async fn scan_stop(state: web::Data<AppState>) -> impl Responder {
    match state.scans.stop_scan() {
        Some(job) => HttpResponse::Ok().json(ScanStopResponse {
            ok: true,
            message: "Cancellation requested".to_string(),
            job: Some(job),
        }),
        None => HttpResponse::Conflict().json(ErrorResponse {
            error: "No running scan".to_string(),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/api/albums",
    params(
        ("search" = Option<String>, Query, description = "Title substring filter"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset")
    ),
    responses(
        (status = 200, description = "Albums, newest first", body = [AlbumRecord])
    )
)]
#[get("/api/albums")]
/// List albums, newest first.
pub async fn albums_list(state: web::Data<AppState>, query: web::Query<ListQuery>) -> impl Responder {
    match state
        .catalog
        .list_albums(query.search.as_deref(), query.limit(), query.offset())
    {
        Ok(albums) => HttpResponse::Ok().json(albums),
        Err(err) => db_error(err),
    }
}

#[utoipa::path(
    get,
    path = "/api/albums/{id}",
    params(
        ("id" = i64, Path, description = "Album id")
    ),
    responses(
        (status = 200, description = "Album with its tracks", body = AlbumDetailResponse),
        (status = 404, description = "Unknown album", body = ErrorResponse)
    )
)]
#[get("/api/albums/{id}")]
/// Fetch one album with its tracks in disc/track order.
pub async fn album_detail(state: web::Data<AppState>, id: web::Path<i64>) -> impl Responder {
    let id = id.into_inner();
    let album = match state.catalog.album_by_id(id) {
        Ok(Some(album)) => album,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: format!("album {id} not found"),
            });
        }
        Err(err) => return db_error(err),
    };
    match state.catalog.tracks_for_album(id) {
        Ok(tracks) => HttpResponse::Ok().json(AlbumDetailResponse { album, tracks }),
        Err(err) => db_error(err),
    }
}

#[utoipa::path(
    get,
    path = "/api/tracks",
    params(
        ("search" = Option<String>, Query, description = "Title substring filter"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset")
    ),
    responses(
        (status = 200, description = "Tracks, newest first", body = [TrackRecord])
    )
)]
#[get("/api/tracks")]
/// List tracks, newest first.
pub async fn tracks_list(state: web::Data<AppState>, query: web::Query<ListQuery>) -> impl Responder {
    match state
        .catalog
        .list_tracks(query.search.as_deref(), query.limit(), query.offset())
    {
        Ok(tracks) => HttpResponse::Ok().json(tracks),
        Err(err) => db_error(err),
    }
}

#[utoipa::path(
    get,
    path = "/api/tracks/by-path",
    params(
        ("path" = String, Query, description = "Full source file path")
    ),
    responses(
        (status = 200, description = "Track record", body = TrackRecord),
        (status = 400, description = "Missing path parameter", body = ErrorResponse),
        (status = 404, description = "No track for the given path", body = ErrorResponse)
    )
)]
#[get("/api/tracks/by-path")]
/// Fetch one track by its exact source file path.
///
/// Registered ahead of `/api/tracks/{id}` so the literal segment wins.
pub async fn track_by_path(
    state: web::Data<AppState>,
    query: web::Query<TrackPathQuery>,
) -> impl Responder {
    let path = query.path.as_deref().map(str::trim).unwrap_or_default();
    if path.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "path query param is required".to_string(),
        });
    }
    match state.catalog.track_by_path(path) {
        Ok(Some(track)) => HttpResponse::Ok().json(track),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Track not found for given path".to_string(),
        }),
        Err(err) => db_error(err),
    }
}

#[utoipa::path(
    get,
    path = "/api/tracks/{id}",
    params(
        ("id" = i64, Path, description = "Track id")
    ),
    responses(
        (status = 200, description = "Track record", body = TrackRecord),
        (status = 404, description = "Unknown track", body = ErrorResponse)
    )
)]
#[get("/api/tracks/{id}")]
/// Fetch one track by id.
pub async fn track_detail(state: web::Data<AppState>, id: web::Path<i64>) -> impl Responder {
    let id = id.into_inner();
    match state.catalog.track_by_id(id) {
        Ok(Some(track)) => HttpResponse::Ok().json(track),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            error: format!("track {id} not found"),
        }),
        Err(err) => db_error(err),
    }
}
