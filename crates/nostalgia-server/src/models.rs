//! API models and OpenAPI schemas.
//!
//! Defines request/response structures for the scan and player APIs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::{AlbumRecord, TrackRecord};

/// Lifecycle state of a scan job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

/// One successfully cataloged file, emitted as a discovery event.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DiscoveredItem {
    /// Catalog id of the upserted track.
    pub track_id: i64,
    /// Resolved track title (tag or filename fallback).
    pub title: String,
    /// Catalog id of the resolved album.
    pub album_id: i64,
    /// Album title the track landed in.
    pub album_title: String,
    /// Absolute path of the source file.
    pub file_path: String,
}

/// Point-in-time view of the current scan job.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanJobSnapshot {
    /// Job id, unique per scan run.
    pub id: String,
    /// Root directory being scanned.
    pub root_dir: String,
    /// Current lifecycle state.
    pub status: ScanStatus,
    /// Start time (unix millis).
    pub started_at_ms: i64,
    /// Finish time (unix millis), set on terminal states.
    pub finished_at_ms: Option<i64>,
    /// Human-readable progress message.
    pub message: String,
    /// True once a stop was requested.
    pub cancel_requested: bool,
    /// Every file visited so far.
    pub scanned_files: u64,
    /// Files with the supported extension.
    pub flac_found: u64,
    /// Files successfully cataloged.
    pub tracks_created_or_updated: u64,
    /// Files that failed extraction or persistence.
    pub errors: u64,
    /// Message of the most recent fatal error, if any.
    pub last_error: Option<String>,
    /// Most recent discoveries, newest first (capped at 50).
    pub recent_discovered: Vec<DiscoveredItem>,
}

/// Typed events pushed to scan subscribers.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    Started { job: ScanJobSnapshot },
    Discovered { item: DiscoveredItem, job: ScanJobSnapshot },
    Progress { job: ScanJobSnapshot },
    CancelRequested { job: ScanJobSnapshot },
    Completed { job: ScanJobSnapshot },
    Stopped { job: ScanJobSnapshot },
    Failed { job: ScanJobSnapshot },
}

/// Request body for `/api/library/scan/start`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ScanStartRequest {
    /// Directory to scan; defaults to the configured music root.
    #[serde(default)]
    pub root_dir: Option<String>,
}

/// Response for `/api/library/scan/start`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanStartResponse {
    pub job: ScanJobSnapshot,
    /// True when an existing running job was returned instead of a new one.
    pub already_running: bool,
}

/// Response for `/api/library/scan/status`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanStatusResponse {
    /// Snapshot of the current job, or null when none has run yet.
    pub job: Option<ScanJobSnapshot>,
}

/// Response for `/api/library/scan/stop`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanStopResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<ScanJobSnapshot>,
}

/// Album plus its tracks in disc/track order.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AlbumDetailResponse {
    pub album: AlbumRecord,
    pub tracks: Vec<TrackRecord>,
}

/// Request body for `/api/player/play`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PlayRequest {
    /// Catalog id of the track to play.
    pub track_id: i64,
}

/// Response for `/api/player/play`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PlayResponse {
    pub ok: bool,
    pub track_id: i64,
    pub file_path: String,
}

/// Generic acknowledgement payload.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

/// Structured error payload.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request body for `/api/player/volume/set` (engine scale, 0-100).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VolumeSetRequest {
    pub volume: f64,
}

/// Optional step payload for `/api/player/volume/{up,down}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct VolumeStepRequest {
    #[serde(default)]
    pub step: Option<f64>,
}

/// Response carrying the engine volume after a change.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VolumeResponse {
    pub ok: bool,
    pub volume: Option<f64>,
}

/// Request body for `/api/player/volume10/set` (user scale, 1-10).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Level10SetRequest {
    pub level: i64,
}

/// Optional notch step for `/api/player/volume10/{up,down}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Level10StepRequest {
    #[serde(default)]
    pub step: Option<i64>,
}

/// Response carrying both volume scales after a level change.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Level10Response {
    pub ok: bool,
    pub level: i64,
    pub volume: Option<f64>,
}

/// Playback engine status fields; any unavailable property is null.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PlayerStatus {
    pub pause: Option<bool>,
    pub volume: Option<f64>,
    pub path: Option<String>,
    pub time_pos: Option<f64>,
    pub duration: Option<f64>,
}

/// Response for `/api/player/status`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PlayerStatusResponse {
    pub ok: bool,
    pub status: PlayerStatusBody,
}

/// Status payload including the derived 1-10 level.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PlayerStatusBody {
    #[serde(flatten)]
    pub status: PlayerStatus,
    pub volume10: i64,
}
