//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::CatalogDb;
use crate::player::Player;
use crate::scan_manager::ScanManager;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Album/track catalog.
    pub catalog: CatalogDb,
    /// Single-job scan lifecycle manager.
    pub scans: Arc<ScanManager>,
    /// Playback engine supervisor.
    pub player: Arc<Player>,
    /// Configured music library root.
    pub music_dir: PathBuf,
}
