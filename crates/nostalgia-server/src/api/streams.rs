//! Server-sent event streams.

use std::collections::VecDeque;
use std::time::Instant;

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{get, web, Error, HttpResponse, Responder};
use futures_util::{stream::unfold, Stream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, Interval, MissedTickBehavior};

use crate::models::{ErrorResponse, ScanEvent};
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(15);

fn sse_event(event: &str, data: &str) -> Bytes {
    let mut payload = String::new();
    payload.push_str("event: ");
    payload.push_str(event);
    payload.push('\n');
    for line in data.lines() {
        payload.push_str("data: ");
        payload.push_str(line);
        payload.push('\n');
    }
    payload.push('\n');
    Bytes::from(payload)
}

fn push_ping_if_needed(pending: &mut VecDeque<Bytes>, last_ping: &mut Instant) {
    if pending.is_empty() && last_ping.elapsed() >= PING_INTERVAL {
        *last_ping = Instant::now();
        pending.push_back(Bytes::from(": ping\n\n"));
    }
}

fn sse_response<S>(stream: S) -> HttpResponse
where
    S: Stream<Item = Result<Bytes, Error>> + 'static,
{
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream)
}

fn event_label(event: &ScanEvent) -> &'static str {
    match event {
        ScanEvent::Started { .. } => "started",
        ScanEvent::Discovered { .. } => "discovered",
        ScanEvent::Progress { .. } => "progress",
        ScanEvent::CancelRequested { .. } => "cancel_requested",
        ScanEvent::Completed { .. } => "completed",
        ScanEvent::Stopped { .. } => "stopped",
        ScanEvent::Failed { .. } => "failed",
    }
}

struct ScanStreamState {
    receiver: broadcast::Receiver<ScanEvent>,
    interval: Interval,
    pending: VecDeque<Bytes>,
    last_ping: Instant,
}

#[utoipa::path(
    get,
    path = "/api/library/scan/events",
    responses(
        (status = 200, description = "Scan event stream"),
        (status = 409, description = "No running scan", body = ErrorResponse)
    )
)]
#[get("/api/library/scan/events")]
/// Stream scan events via server-sent events.
///
/// Only a running job accepts subscribers; the stream ends when the job
/// reaches a terminal state.
pub async fn scan_events(state: web::Data<AppState>) -> impl Responder {
    let (receiver, _snapshot) = match state.scans.subscribe() {
        Ok(sub) => sub,
        Err(err) => {
            return HttpResponse::Conflict().json(ErrorResponse {
                error: err.message(),
            });
        }
    };

    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let stream = unfold(
        ScanStreamState {
            receiver,
            interval,
            pending: VecDeque::new(),
            last_ping: Instant::now(),
        },
        |mut ctx| async move {
            loop {
                if let Some(bytes) = ctx.pending.pop_front() {
                    return Some((Ok::<Bytes, Error>(bytes), ctx));
                }

                tokio::select! {
                    _ = ctx.interval.tick() => {}
                    result = ctx.receiver.recv() => match result {
                        Ok(event) => {
                            let json = serde_json::to_string(&event)
                                .unwrap_or_else(|_| "null".to_string());
                            ctx.pending.push_back(sse_event(event_label(&event), &json));
                        }
                        // Skipped events are recoverable; every snapshot
                        // carries full counters, so the next one catches up.
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "scan event subscriber lagged");
                        }
                        // Sender dropped at the terminal state; close the
                        // connection.
                        Err(RecvError::Closed) => return None,
                    },
                }

                push_ping_if_needed(&mut ctx.pending, &mut ctx.last_ping);
            }
        },
    );

    sse_response(stream)
}
