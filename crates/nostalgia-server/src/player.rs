//! Playback engine supervision.
//!
//! Spawns mpv as a child process in idle mode and drives it over its JSON
//! IPC socket. The process is started lazily on first use and restarted
//! transparently after a crash; every command opens a fresh socket
//! connection, so no connection state outlives a request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use actix_web::HttpResponse;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::config::PlayerConfig;
use crate::models::{ErrorResponse, PlayerStatus};

const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors surfaced by the playback engine facade.
#[derive(Debug)]
pub enum PlayerError {
    /// The engine binary could not be spawned.
    Spawn(std::io::Error),
    /// The engine started but never opened its IPC socket.
    SocketTimeout(PathBuf),
    /// Socket-level I/O failure while talking to the engine.
    Io(std::io::Error),
    /// The engine rejected the command.
    Engine(String),
    /// The engine replied with something that is not a reply.
    BadReply(String),
}

impl std::fmt::Display for PlayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerError::Spawn(err) => write!(f, "failed to start playback engine: {err}"),
            PlayerError::SocketTimeout(path) => {
                write!(f, "engine socket {:?} did not appear in time", path)
            }
            PlayerError::Io(err) => write!(f, "engine ipc failed: {err}"),
            PlayerError::Engine(msg) => write!(f, "engine rejected command: {msg}"),
            PlayerError::BadReply(line) => write!(f, "unparseable engine reply: {line}"),
        }
    }
}

impl std::error::Error for PlayerError {}

impl PlayerError {
    /// Convert an engine error into an HTTP response.
    pub fn into_response(self) -> HttpResponse {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        match self {
            PlayerError::Spawn(_) | PlayerError::SocketTimeout(_) => {
                HttpResponse::ServiceUnavailable().json(body)
            }
            PlayerError::Engine(_) => HttpResponse::BadGateway().json(body),
            PlayerError::Io(_) | PlayerError::BadReply(_) => {
                HttpResponse::InternalServerError().json(body)
            }
        }
    }
}

/// Supervisor for the external playback engine process.
pub struct Player {
    config: PlayerConfig,
    /// Child handle; also serves as the start guard, so two requests can
    /// never race to spawn a second engine.
    process: Mutex<Option<Child>>,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            process: Mutex::new(None),
        }
    }

    pub fn volume_step(&self) -> f64 {
        self.config.volume_step
    }

    /// Ensure the engine process is alive, spawning it if needed.
    ///
    /// A child that has exited is discarded here, which makes restarts
    /// transparent to callers.
    async fn ensure_running(&self) -> Result<(), PlayerError> {
        let mut guard = self.process.lock().await;

        if let Some(child) = guard.as_mut() {
            match child.try_wait() {
                Ok(None) => return Ok(()),
                Ok(Some(code)) => {
                    tracing::warn!(exit = %code, "playback engine exited, restarting");
                    *guard = None;
                }
                Err(err) => return Err(PlayerError::Io(err)),
            }
        }

        // A stale socket from a previous run would connect to nothing.
        let _ = std::fs::remove_file(&self.config.socket_path);

        let child = Command::new(&self.config.bin)
            .arg("--idle=yes")
            .arg("--force-window=no")
            .arg("--no-video")
            .arg(format!(
                "--input-ipc-server={}",
                self.config.socket_path.display()
            ))
            .arg("--really-quiet")
            .arg(format!("--volume={}", self.config.default_volume))
            .spawn()
            .map_err(PlayerError::Spawn)?;
        tracing::info!(
            bin = %self.config.bin,
            socket = %self.config.socket_path.display(),
            "playback engine started"
        );
        *guard = Some(child);

        if let Err(err) = wait_for_socket(&self.config.socket_path).await {
            // Without a socket the child is unreachable; reap it so the
            // next call starts clean instead of hitting connect failures.
            if let Some(mut child) = guard.take() {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Send one command to the engine and return the reply data.
    pub async fn command(&self, command: Value) -> Result<Value, PlayerError> {
        self.ensure_running().await?;
        send_ipc(&self.config.socket_path, command).await
    }

    /// Fetch a single property; an unavailable property maps to `None`
    /// rather than an error.
    pub async fn get_property(&self, name: &str) -> Result<Option<Value>, PlayerError> {
        match self.command(json!(["get_property", name])).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(PlayerError::Engine(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<(), PlayerError> {
        self.command(json!(["set_property", name, value]))
            .await
            .map(|_| ())
    }

    /// Load and play a file, replacing whatever is current.
    pub async fn play(&self, file_path: &str) -> Result<(), PlayerError> {
        self.command(json!(["loadfile", file_path, "replace"]))
            .await?;
        self.set_property("pause", json!(false)).await
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.set_property("pause", json!(true)).await
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        self.set_property("pause", json!(false)).await
    }

    pub async fn toggle(&self) -> Result<(), PlayerError> {
        self.command(json!(["cycle", "pause"])).await.map(|_| ())
    }

    /// Stop playback and return the engine to idle.
    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.command(json!(["stop"])).await.map(|_| ())
    }

    /// Set the engine volume, clamped to 0-100.
    pub async fn set_volume(&self, volume: f64) -> Result<f64, PlayerError> {
        let clamped = clamp_volume(volume);
        self.set_property("volume", json!(clamped)).await?;
        Ok(clamped)
    }

    /// Adjust volume by a signed step relative to the current value.
    pub async fn adjust_volume(&self, delta: f64) -> Result<f64, PlayerError> {
        let current = self
            .get_property("volume")
            .await?
            .and_then(|v| v.as_f64())
            .unwrap_or(self.config.default_volume);
        self.set_volume(current + delta).await
    }

    /// Gather the full playback status.
    ///
    /// Properties are fetched concurrently; each one degrades to null on
    /// its own, so a missing `path` never hides the volume.
    pub async fn status(&self) -> Result<PlayerStatus, PlayerError> {
        self.ensure_running().await?;
        let (pause, volume, path, time_pos, duration) = tokio::join!(
            self.get_property("pause"),
            self.get_property("volume"),
            self.get_property("path"),
            self.get_property("time-pos"),
            self.get_property("duration"),
        );
        Ok(PlayerStatus {
            pause: pause?.and_then(|v| v.as_bool()),
            volume: volume?.and_then(|v| v.as_f64()),
            path: path?.and_then(|v| v.as_str().map(str::to_string)),
            time_pos: time_pos?.and_then(|v| v.as_f64()),
            duration: duration?.and_then(|v| v.as_f64()),
        })
    }

    /// Kill the engine process if it is running. Used on shutdown.
    pub async fn shutdown(&self) {
        let mut guard = self.process.lock().await;
        if let Some(child) = guard.as_mut() {
            if let Err(err) = child.start_kill() {
                tracing::warn!(error = %err, "failed to kill playback engine");
            }
            let _ = child.wait().await;
            tracing::info!("playback engine stopped");
        }
        *guard = None;
        let _ = std::fs::remove_file(&self.config.socket_path);
    }
}

fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 100.0)
}

async fn wait_for_socket(path: &Path) -> Result<(), PlayerError> {
    let deadline = tokio::time::Instant::now() + SOCKET_WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if path.exists() {
            return Ok(());
        }
        tokio::time::sleep(SOCKET_POLL_INTERVAL).await;
    }
    Err(PlayerError::SocketTimeout(path.to_path_buf()))
}

/// One request/reply exchange over a fresh socket connection.
///
/// The engine interleaves asynchronous event lines with replies; event
/// lines are skipped until a line carrying an `error` field arrives.
async fn send_ipc(socket_path: &Path, command: Value) -> Result<Value, PlayerError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(PlayerError::Io)?;
    let (reader, mut writer) = stream.into_split();

    let request = json!({ "command": command });
    let mut payload = request.to_string();
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(PlayerError::Io)?;

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await.map_err(PlayerError::Io)? {
        let reply: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => return Err(PlayerError::BadReply(line)),
        };
        if reply.get("event").is_some() {
            continue;
        }
        let error = reply
            .get("error")
            .and_then(Value::as_str)
            .ok_or_else(|| PlayerError::BadReply(line.clone()))?;
        if error != "success" {
            return Err(PlayerError::Engine(error.to_string()));
        }
        return Ok(reply.get("data").cloned().unwrap_or(Value::Null));
    }
    Err(PlayerError::BadReply("connection closed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    fn temp_socket(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "nostalgia-player-{tag}-{}.sock",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    /// Accept one connection and answer every request line with `reply`.
    fn fake_engine(listener: UnixListener, reply: &'static str) {
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            stream.write_all(reply.as_bytes()).await.unwrap();
        });
    }

    #[tokio::test]
    async fn ipc_success_reply_yields_data() {
        let path = temp_socket("ok");
        let listener = UnixListener::bind(&path).unwrap();
        fake_engine(listener, "{\"data\":42.5,\"error\":\"success\"}\n");

        let data = send_ipc(&path, json!(["get_property", "volume"]))
            .await
            .unwrap();
        assert_eq!(data, json!(42.5));
    }

    #[tokio::test]
    async fn ipc_error_reply_maps_to_engine_error() {
        let path = temp_socket("err");
        let listener = UnixListener::bind(&path).unwrap();
        fake_engine(listener, "{\"error\":\"property unavailable\"}\n");

        match send_ipc(&path, json!(["get_property", "path"])).await {
            Err(PlayerError::Engine(msg)) => assert_eq!(msg, "property unavailable"),
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ipc_skips_event_lines_before_the_reply() {
        let path = temp_socket("events");
        let listener = UnixListener::bind(&path).unwrap();
        fake_engine(
            listener,
            "{\"event\":\"pause\"}\n{\"event\":\"idle\"}\n{\"data\":true,\"error\":\"success\"}\n",
        );

        let data = send_ipc(&path, json!(["get_property", "pause"]))
            .await
            .unwrap();
        assert_eq!(data, json!(true));
    }

    #[tokio::test]
    async fn ipc_connect_failure_is_io_error() {
        let path = temp_socket("missing");
        match send_ipc(&path, json!(["stop"])).await {
            Err(PlayerError::Io(_)) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn engine_without_socket_is_reaped_on_timeout() {
        let path = temp_socket("no-socket");
        // `true` spawns fine but never creates the IPC socket.
        let player = Player::new(PlayerConfig {
            bin: "/bin/true".to_string(),
            socket_path: path.clone(),
            default_volume: 50.0,
            volume_step: 5.0,
        });

        tokio::time::pause();
        match player.stop().await {
            Err(PlayerError::SocketTimeout(p)) => assert_eq!(p, path),
            other => panic!("expected socket timeout, got {other:?}"),
        }
        // The dead child must not linger in the guard.
        assert!(player.process.lock().await.is_none());
    }

    #[tokio::test]
    async fn missing_engine_binary_surfaces_spawn_error() {
        let dir = temp_socket("bin");
        let player = Player::new(PlayerConfig {
            bin: "/definitely/not/an/engine".to_string(),
            socket_path: dir,
            default_volume: 50.0,
            volume_step: 5.0,
        });
        match player.stop().await {
            Err(PlayerError::Spawn(_)) => {}
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[test]
    fn volume_clamp_bounds_and_nan() {
        assert_eq!(clamp_volume(-3.0), 0.0);
        assert_eq!(clamp_volume(250.0), 100.0);
        assert_eq!(clamp_volume(55.5), 55.5);
        assert_eq!(clamp_volume(f64::NAN), 0.0);
    }

    #[tokio::test]
    async fn socket_wait_times_out_when_never_created() {
        let path = temp_socket("never");
        tokio::time::pause();
        let wait = wait_for_socket(&path);
        tokio::pin!(wait);
        // Virtual time fast-forwards through the poll loop.
        match wait.await {
            Err(PlayerError::SocketTimeout(p)) => assert_eq!(p, path),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
