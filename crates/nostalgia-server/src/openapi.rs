use utoipa::OpenApi;

use crate::api;
use crate::catalog;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health,
        api::library::scan_start,
        api::library::scan_status,
        api::library::scan_stop,
        api::streams::scan_events,
        api::library::albums_list,
        api::library::album_detail,
        api::library::tracks_list,
        api::library::track_by_path,
        api::library::track_detail,
        api::player::play,
        api::player::pause,
        api::player::resume,
        api::player::toggle,
        api::player::stop,
        api::player::status,
        api::player::volume_set,
        api::player::volume_up,
        api::player::volume_down,
        api::player::volume10_set,
        api::player::volume10_up,
        api::player::volume10_down,
    ),
    components(
        schemas(
            api::health::HealthResponse,
            catalog::AlbumRecord,
            catalog::TrackRecord,
            models::ScanStatus,
            models::DiscoveredItem,
            models::ScanJobSnapshot,
            models::ScanStartRequest,
            models::ScanStartResponse,
            models::ScanStatusResponse,
            models::ScanStopResponse,
            models::AlbumDetailResponse,
            models::PlayRequest,
            models::PlayResponse,
            models::OkResponse,
            models::ErrorResponse,
            models::VolumeSetRequest,
            models::VolumeStepRequest,
            models::VolumeResponse,
            models::Level10SetRequest,
            models::Level10StepRequest,
            models::Level10Response,
            models::PlayerStatus,
            models::PlayerStatusResponse,
            models::PlayerStatusBody,
        )
    ),
    tags(
        (name = "nostalgia-server", description = "Music library and playback control API")
    )
)]
pub struct ApiDoc;
