//! HTTP API handlers.
//!
//! Defines the Actix routes for the library catalog, scan control, and
//! the playback engine.

pub mod health;
pub mod library;
pub mod player;
pub mod streams;

pub use library::{
    album_detail,
    albums_list,
    scan_start,
    scan_status,
    scan_stop,
    track_by_path,
    track_detail,
    tracks_list,
};
pub use player::{
    pause,
    play,
    resume,
    status,
    stop,
    toggle,
    volume10_down,
    volume10_set,
    volume10_up,
    volume_down,
    volume_set,
    volume_up,
};
pub use streams::scan_events;

use actix_web::HttpResponse;

use crate::models::ErrorResponse;

/// Map a catalog failure to a 500 with a structured body.
pub(crate) fn db_error(err: anyhow::Error) -> HttpResponse {
    tracing::error!(error = %format!("{err:#}"), "catalog query failed");
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: "catalog query failed".to_string(),
    })
}
