//! Library scan pipeline.
//!
//! Walks the music root, probes FLAC metadata, and upserts albums/tracks
//! into the catalog. Per-file failures are counted and never abort the
//! scan; cancellation is a distinguished interrupt, not a failure.

use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, StandardVisualKey};
use symphonia::core::probe::Hint;

use crate::catalog::{CatalogDb, TrackFields};
use crate::covers::CoverStore;
use crate::models::DiscoveredItem;
use crate::walker::walk_files;

const UNKNOWN_ALBUM: &str = "Unknown Album";
const PROGRESS_INTERVAL: Duration = Duration::from_millis(400);
const MAX_COVER_ART_BYTES: usize = 5_000_000;

/// Counters reported while a scan runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// Every file visited, matching or not.
    pub scanned_files: u64,
    /// Files with a `.flac` extension.
    pub flac_found: u64,
    /// Files successfully cataloged (created or refreshed).
    pub tracks_created_or_updated: u64,
    /// Files that failed metadata extraction or persistence.
    pub errors: u64,
}

/// Why a scan ended early.
#[derive(Debug)]
pub enum ScanError {
    /// Cooperative cancellation observed at a file boundary.
    Cancelled,
    /// Unexpected pipeline failure; the scan halts.
    Pipeline(anyhow::Error),
}

enum Interrupt {
    Cancelled,
}

/// Run one scan over `root`, reporting progress and discoveries.
///
/// `on_progress` is invoked at most every ~400ms plus one unconditional
/// final flush, so the last reported counters always match the returned
/// summary. `on_discovered` fires once per successfully cataloged file.
pub fn scan_library(
    root: &Path,
    covers_dir: &Path,
    catalog: &CatalogDb,
    mut on_discovered: impl FnMut(DiscoveredItem),
    mut on_progress: impl FnMut(ScanProgress),
    should_cancel: impl Fn() -> bool,
) -> Result<ScanProgress, ScanError> {
    let covers = CoverStore::new(covers_dir.to_path_buf()).map_err(ScanError::Pipeline)?;

    let mut progress = ScanProgress::default();
    let mut last_emit = Instant::now();

    let walked = walk_files(root, |path| {
        if should_cancel() {
            return Err(Interrupt::Cancelled);
        }

        progress.scanned_files += 1;

        if is_flac(path) {
            progress.flac_found += 1;
            match catalog_file(path, catalog, &covers) {
                Ok(item) => {
                    progress.tracks_created_or_updated += 1;
                    on_discovered(item);
                }
                Err(err) => {
                    progress.errors += 1;
                    tracing::warn!(path = %path.display(), error = %err, "scan error");
                }
            }
        }

        if last_emit.elapsed() >= PROGRESS_INTERVAL {
            last_emit = Instant::now();
            on_progress(progress);
        }
        Ok(())
    });

    // Final counters are flushed even when the walk was interrupted.
    on_progress(progress);

    match walked {
        Ok(()) => Ok(progress),
        Err(Interrupt::Cancelled) => Err(ScanError::Cancelled),
    }
}

fn is_flac(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("flac"))
}

/// Probe, resolve the album, upsert the track, and persist any cover.
fn catalog_file(path: &Path, catalog: &CatalogDb, covers: &CoverStore) -> Result<DiscoveredItem> {
    let meta = probe_flac(path)?;

    let album_title = meta
        .album
        .clone()
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
    let album_artist = meta.album_artist.clone().or_else(|| meta.artist.clone());
    let album = catalog.find_or_create_album(&album_title, album_artist.as_deref(), meta.year)?;
    if album.year.is_none() {
        if let Some(year) = meta.year {
            catalog.set_album_year_if_missing(album.id, year)?;
        }
    }
    if album.genre.is_none() {
        if let Some(genre) = meta.genre.as_deref() {
            catalog.set_album_genre_if_missing(album.id, genre)?;
        }
    }

    let cover_url = match meta.cover.as_ref() {
        Some(cover) => Some(covers.store_for_source(path, &cover.mime_type, &cover.data)?),
        None => None,
    };
    if let Some(url) = cover_url.as_deref() {
        catalog.set_album_cover_if_missing(album.id, url)?;
    }

    let title = meta.title.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("<unknown>")
            .to_string()
    });
    let fields = TrackFields {
        title: Some(title.clone()),
        track_artist: meta.artist.clone().or_else(|| meta.album_artist.clone()),
        track_no: meta.track_no,
        disc_no: meta.disc_no,
        duration_sec: meta.duration_sec,
        format: Some("FLAC".to_string()),
        sample_rate: meta.sample_rate,
        bit_rate: meta.bit_rate,
        album_id: album.id,
    };
    let file_path = path.to_string_lossy().to_string();
    let track = catalog.upsert_track(&file_path, &fields)?;
    tracing::debug!(
        path = %path.display(),
        track_id = track.id,
        created = track.created,
        changed = track.changed,
        "track cataloged"
    );
    if let Some(url) = cover_url.as_deref() {
        catalog.set_track_cover_if_missing(track.id, url)?;
    }

    Ok(DiscoveredItem {
        track_id: track.id,
        title,
        album_id: album.id,
        album_title: album.title,
        file_path,
    })
}

#[derive(Debug, Default)]
struct FlacMeta {
    title: Option<String>,
    artist: Option<String>,
    album_artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    year: Option<i64>,
    track_no: Option<i64>,
    disc_no: Option<i64>,
    duration_sec: Option<i64>,
    sample_rate: Option<i64>,
    bit_rate: Option<i64>,
    cover: Option<CoverArt>,
}

#[derive(Debug)]
struct CoverArt {
    mime_type: String,
    data: Vec<u8>,
}

fn probe_flac(path: &Path) -> Result<FlacMeta> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;
    let size_bytes = file
        .metadata()
        .with_context(|| format!("stat {:?}", path))?
        .len();

    let mut hint = Hint::new();
    hint.with_extension("flac");
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {:?}", path))?;

    let mut meta = FlacMeta::default();

    if let Some(track) = probed.format.default_track() {
        let params = &track.codec_params;
        meta.sample_rate = params.sample_rate.map(i64::from);
        if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
            if rate > 0 {
                meta.duration_sec = Some((frames / rate as u64) as i64);
            }
        }
    }
    if let Some(secs) = meta.duration_sec.filter(|s| *s > 0) {
        meta.bit_rate = Some((size_bytes.saturating_mul(8) / secs as u64) as i64);
    }

    if let Some(rev) = probed.format.metadata().current() {
        for tag in rev.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => {
                    if meta.title.is_none() {
                        meta.title = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::Artist) => {
                    if meta.artist.is_none() {
                        meta.artist = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::AlbumArtist) => {
                    if meta.album_artist.is_none() {
                        meta.album_artist = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::Album) => {
                    if meta.album.is_none() {
                        meta.album = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::Genre) => {
                    if meta.genre.is_none() {
                        meta.genre = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::Date) => {
                    if meta.year.is_none() {
                        meta.year = parse_year_tag(&tag.value.to_string());
                    }
                }
                Some(StandardTagKey::TrackNumber) => {
                    if meta.track_no.is_none() {
                        meta.track_no = parse_number_tag(&tag.value.to_string());
                    }
                }
                Some(StandardTagKey::DiscNumber) => {
                    if meta.disc_no.is_none() {
                        meta.disc_no = parse_number_tag(&tag.value.to_string());
                    }
                }
                _ => {}
            }
        }
        meta.cover = select_cover_art(rev);
    }

    Ok(meta)
}

fn parse_number_tag(raw: &str) -> Option<i64> {
    raw.split('/')
        .next()
        .and_then(|s| s.trim().parse::<i64>().ok())
}

fn parse_year_tag(raw: &str) -> Option<i64> {
    raw.split('-')
        .next()
        .and_then(|s| s.trim().parse::<i64>().ok())
}

fn select_cover_art(rev: &symphonia::core::meta::MetadataRevision) -> Option<CoverArt> {
    let mut best = rev
        .visuals()
        .iter()
        .find(|visual| visual.usage == Some(StandardVisualKey::FrontCover));
    if best.is_none() {
        best = rev.visuals().first();
    }
    let visual = best?;
    if visual.data.len() > MAX_COVER_ART_BYTES {
        return None;
    }
    Some(CoverArt {
        mime_type: visual.media_type.clone(),
        data: visual.data.to_vec(),
    })
}
