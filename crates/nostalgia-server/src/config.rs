//! Configuration loading and parsing.
//!
//! Defines the server config schema and resolves defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Music library root directory.
    pub music_dir: Option<String>,
    /// Storage directory for the catalog DB and extracted covers.
    pub storage_dir: Option<String>,
    /// Optional full path to the catalog SQLite DB file.
    pub catalog_db_path: Option<String>,
    /// Playback engine settings.
    pub player: Option<PlayerConfigToml>,
}

/// Playback engine config from TOML.
#[derive(Debug, Deserialize)]
pub struct PlayerConfigToml {
    /// Engine binary (defaults to `mpv` on PATH).
    pub bin: Option<String>,
    /// IPC socket path override.
    pub socket_path: Option<String>,
    /// Initial engine volume, 0-100.
    pub default_volume: Option<f64>,
    /// Step for volume up/down, in engine units.
    pub volume_step: Option<f64>,
}

/// Resolved playback engine settings.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub bin: String,
    pub socket_path: PathBuf,
    pub default_volume: f64,
    pub volume_step: f64,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Extract the music directory from config.
pub fn music_dir_from_config(cfg: &ServerConfig) -> Result<PathBuf> {
    let dir = cfg
        .music_dir
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("music_dir is required in config"))?;
    Ok(PathBuf::from(dir))
}

/// Resolve the storage directory (catalog DB and covers live here).
pub fn storage_dir_from_config(cfg: &ServerConfig) -> PathBuf {
    cfg.storage_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("storage"))
}

/// Resolve the catalog DB path, defaulting to the storage directory.
pub fn catalog_db_path_from_config(cfg: &ServerConfig, storage_dir: &Path) -> PathBuf {
    cfg.catalog_db_path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| storage_dir.join("catalog.sqlite3"))
}

/// Parse an optional bind address from config.
pub fn bind_from_config(cfg: &ServerConfig) -> Result<Option<std::net::SocketAddr>> {
    let Some(bind) = cfg.bind.as_deref() else {
        return Ok(None);
    };
    let addr = bind.parse().with_context(|| format!("parse bind {bind}"))?;
    Ok(Some(addr))
}

/// Resolve playback engine settings, filling in defaults.
pub fn player_from_config(cfg: &ServerConfig) -> PlayerConfig {
    let player = cfg.player.as_ref();
    PlayerConfig {
        bin: player
            .and_then(|p| p.bin.clone())
            .unwrap_or_else(|| "mpv".to_string()),
        socket_path: player
            .and_then(|p| p.socket_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::temp_dir().join(format!("nostalgia-mpv-{}.sock", std::process::id()))
            }),
        default_volume: player.and_then(|p| p.default_volume).unwrap_or(50.0),
        volume_step: player.and_then(|p| p.volume_step).unwrap_or(5.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ServerConfig {
        toml::from_str::<ServerConfig>(raw).unwrap()
    }

    #[test]
    fn bind_from_config_parses_when_present() {
        let cfg = parse("bind = \"127.0.0.1:9000\"");
        let addr = bind_from_config(&cfg).unwrap().unwrap();
        assert_eq!(addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn music_dir_is_required() {
        let cfg = parse("");
        assert!(music_dir_from_config(&cfg).is_err());

        let cfg = parse("music_dir = \"/music\"");
        assert_eq!(music_dir_from_config(&cfg).unwrap(), PathBuf::from("/music"));
    }

    #[test]
    fn catalog_db_path_defaults_into_storage_dir() {
        let cfg = parse("storage_dir = \"/var/lib/nostalgia\"");
        let storage = storage_dir_from_config(&cfg);
        assert_eq!(storage, PathBuf::from("/var/lib/nostalgia"));
        assert_eq!(
            catalog_db_path_from_config(&cfg, &storage),
            PathBuf::from("/var/lib/nostalgia/catalog.sqlite3")
        );

        let cfg = parse("catalog_db_path = \"/data/db.sqlite3\"");
        assert_eq!(
            catalog_db_path_from_config(&cfg, &storage),
            PathBuf::from("/data/db.sqlite3")
        );

        // Blank override falls back to the default.
        let cfg = parse("catalog_db_path = \"  \"");
        assert_eq!(
            catalog_db_path_from_config(&cfg, &storage),
            PathBuf::from("/var/lib/nostalgia/catalog.sqlite3")
        );
    }

    #[test]
    fn player_settings_fill_defaults() {
        let cfg = parse("");
        let player = player_from_config(&cfg);
        assert_eq!(player.bin, "mpv");
        assert_eq!(player.default_volume, 50.0);
        assert_eq!(player.volume_step, 5.0);

        let cfg = parse(
            "[player]\nbin = \"/usr/local/bin/mpv\"\nsocket_path = \"/tmp/p.sock\"\ndefault_volume = 30\nvolume_step = 10\n",
        );
        let player = player_from_config(&cfg);
        assert_eq!(player.bin, "/usr/local/bin/mpv");
        assert_eq!(player.socket_path, PathBuf::from("/tmp/p.sock"));
        assert_eq!(player.default_volume, 30.0);
        assert_eq!(player.volume_step, 10.0);
    }
}
