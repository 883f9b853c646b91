//! Playback API handlers.

use actix_web::{get, post, web, HttpResponse, Responder};

use crate::models::{
    ErrorResponse, Level10Response, Level10SetRequest, Level10StepRequest, OkResponse,
    PlayRequest, PlayResponse, PlayerStatusBody, PlayerStatusResponse, VolumeResponse,
    VolumeSetRequest, VolumeStepRequest,
};
use crate::state::AppState;
use crate::volume::{engine_to_level, level_to_engine};

use super::db_error;

#[utoipa::path(
    post,
    path = "/api/player/play",
    request_body = PlayRequest,
    responses(
        (status = 200, description = "Playback started", body = PlayResponse),
        (status = 404, description = "Unknown track", body = ErrorResponse)
    )
)]
#[post("/api/player/play")]
/// Play a cataloged track, replacing whatever is current.
pub async fn play(state: web::Data<AppState>, body: web::Json<PlayRequest>) -> impl Responder {
    let track = match state.catalog.track_by_id(body.track_id) {
        Ok(Some(track)) => track,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: format!("track {} not found", body.track_id),
            });
        }
        Err(err) => return db_error(err),
    };

    match state.player.play(&track.file_path).await {
        Ok(()) => {
            tracing::info!(track_id = track.id, path = %track.file_path, "playback started");
            HttpResponse::Ok().json(PlayResponse {
                ok: true,
                track_id: track.id,
                file_path: track.file_path,
            })
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/pause",
    responses(
        (status = 200, description = "Playback paused", body = OkResponse)
    )
)]
#[post("/api/player/pause")]
/// Pause playback.
pub async fn pause(state: web::Data<AppState>) -> impl Responder {
    match state.player.pause().await {
        Ok(()) => HttpResponse::Ok().json(OkResponse { ok: true }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/resume",
    responses(
        (status = 200, description = "Playback resumed", body = OkResponse)
    )
)]
#[post("/api/player/resume")]
/// Resume paused playback.
pub async fn resume(state: web::Data<AppState>) -> impl Responder {
    match state.player.resume().await {
        Ok(()) => HttpResponse::Ok().json(OkResponse { ok: true }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/toggle",
    responses(
        (status = 200, description = "Pause state toggled", body = OkResponse)
    )
)]
#[post("/api/player/toggle")]
/// Toggle the pause state.
pub async fn toggle(state: web::Data<AppState>) -> impl Responder {
    match state.player.toggle().await {
        Ok(()) => HttpResponse::Ok().json(OkResponse { ok: true }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/stop",
    responses(
        (status = 200, description = "Playback stopped, engine idle", body = OkResponse)
    )
)]
#[post("/api/player/stop")]
/// Stop playback and return the engine to idle.
pub async fn stop(state: web::Data<AppState>) -> impl Responder {
    match state.player.stop().await {
        Ok(()) => HttpResponse::Ok().json(OkResponse { ok: true }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/player/status",
    responses(
        (status = 200, description = "Engine status with derived 1-10 level", body = PlayerStatusResponse)
    )
)]
#[get("/api/player/status")]
/// Report engine status; unavailable properties come back null.
pub async fn status(state: web::Data<AppState>) -> impl Responder {
    match state.player.status().await {
        Ok(status) => {
            let volume10 = engine_to_level(status.volume.unwrap_or(0.0));
            HttpResponse::Ok().json(PlayerStatusResponse {
                ok: true,
                status: PlayerStatusBody { status, volume10 },
            })
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/volume/set",
    request_body = VolumeSetRequest,
    responses(
        (status = 200, description = "Volume set (engine scale)", body = VolumeResponse)
    )
)]
#[post("/api/player/volume/set")]
/// Set the engine volume (0-100, clamped).
pub async fn volume_set(
    state: web::Data<AppState>,
    body: web::Json<VolumeSetRequest>,
) -> impl Responder {
    match state.player.set_volume(body.volume).await {
        Ok(volume) => HttpResponse::Ok().json(VolumeResponse {
            ok: true,
            volume: Some(volume),
        }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/volume/up",
    request_body = VolumeStepRequest,
    responses(
        (status = 200, description = "Volume raised", body = VolumeResponse)
    )
)]
#[post("/api/player/volume/up")]
/// Raise volume by the configured (or given) step.
pub async fn volume_up(
    state: web::Data<AppState>,
    body: Option<web::Json<VolumeStepRequest>>,
) -> impl Responder {
    let step = body
        .as_ref()
        .and_then(|b| b.step)
        .unwrap_or_else(|| state.player.volume_step());
    match state.player.adjust_volume(step).await {
        Ok(volume) => HttpResponse::Ok().json(VolumeResponse {
            ok: true,
            volume: Some(volume),
        }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/volume/down",
    request_body = VolumeStepRequest,
    responses(
        (status = 200, description = "Volume lowered", body = VolumeResponse)
    )
)]
#[post("/api/player/volume/down")]
/// Lower volume by the configured (or given) step.
pub async fn volume_down(
    state: web::Data<AppState>,
    body: Option<web::Json<VolumeStepRequest>>,
) -> impl Responder {
    let step = body
        .as_ref()
        .and_then(|b| b.step)
        .unwrap_or_else(|| state.player.volume_step());
    match state.player.adjust_volume(-step).await {
        Ok(volume) => HttpResponse::Ok().json(VolumeResponse {
            ok: true,
            volume: Some(volume),
        }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/volume10/set",
    request_body = Level10SetRequest,
    responses(
        (status = 200, description = "Level applied", body = Level10Response)
    )
)]
#[post("/api/player/volume10/set")]
/// Set volume on the 1-10 user scale.
pub async fn volume10_set(
    state: web::Data<AppState>,
    body: web::Json<Level10SetRequest>,
) -> impl Responder {
    let engine = level_to_engine(body.level);
    match state.player.set_volume(engine as f64).await {
        Ok(volume) => HttpResponse::Ok().json(Level10Response {
            ok: true,
            level: engine_to_level(volume),
            volume: Some(volume),
        }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/player/volume10/up",
    request_body = Level10StepRequest,
    responses(
        (status = 200, description = "Level raised", body = Level10Response)
    )
)]
#[post("/api/player/volume10/up")]
/// Raise volume by whole 1-10 notches.
pub async fn volume10_up(
    state: web::Data<AppState>,
    body: Option<web::Json<Level10StepRequest>>,
) -> impl Responder {
    step_level(&state, body.as_ref().and_then(|b| b.step).unwrap_or(1)).await
}

#[utoipa::path(
    post,
    path = "/api/player/volume10/down",
    request_body = Level10StepRequest,
    responses(
        (status = 200, description = "Level lowered", body = Level10Response)
    )
)]
#[post("/api/player/volume10/down")]
/// Lower volume by whole 1-10 notches.
pub async fn volume10_down(
    state: web::Data<AppState>,
    body: Option<web::Json<Level10StepRequest>>,
) -> impl Responder {
    step_level(&state, -body.as_ref().and_then(|b| b.step).unwrap_or(1)).await
}

/// Read the current level, move it by `notches`, and apply the result.
async fn step_level(state: &AppState, notches: i64) -> HttpResponse {
    let current = match state.player.get_property("volume").await {
        Ok(value) => value.and_then(|v| v.as_f64()).unwrap_or(0.0),
        Err(err) => return err.into_response(),
    };
    let level = engine_to_level(current).saturating_add(notches);
    let engine = level_to_engine(level);
    match state.player.set_volume(engine as f64).await {
        Ok(volume) => HttpResponse::Ok().json(Level10Response {
            ok: true,
            level: engine_to_level(volume),
            volume: Some(volume),
        }),
        Err(err) => err.into_response(),
    }
}
