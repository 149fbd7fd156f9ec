use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::AppState;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;
pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Comma-separated flight or landing zone IDs
    pub ids: Option<String>,
}

/// Recent envelopes kept so a reconnecting client can resume after
/// `Last-Event-ID`.
pub struct EventBuffer {
    events: VecDeque<events::EventEnvelope>,
    max_size: usize,
}

impl EventBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, envelope: events::EventEnvelope) {
        if self.events.len() >= self.max_size {
            self.events.pop_front();
        }
        self.events.push_back(envelope);
    }

    pub fn events_after(&self, event_id: Uuid) -> Vec<events::EventEnvelope> {
        self.events
            .iter()
            .skip_while(|envelope| envelope.id != event_id)
            .skip(1)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

pub type SharedEventBuffer = Arc<RwLock<EventBuffer>>;

fn parse_ids(ids: Option<&str>) -> Option<Vec<Uuid>> {
    ids.map(|s| s.split(',').filter_map(|id| id.trim().parse().ok()).collect())
}

/// Events about neither a flight nor a landing zone always pass.
fn matches_filter(event: &events::Event, ids: &[Uuid]) -> bool {
    match (event.flight_id(), event.landing_zone_id()) {
        (None, None) => true,
        (flight_id, landing_zone_id) => [flight_id, landing_zone_id]
            .into_iter()
            .flatten()
            .any(|id| ids.contains(&id)),
    }
}

fn envelope_to_sse_event(envelope: &events::EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.id.to_string())
        .event(envelope.event.kind())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(
        ("ids" = Option<String>, Query, description = "Comma-separated flight or landing zone IDs to filter events"),
    ),
    responses(
        (status = 200, description = "SSE event stream"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ids = parse_ids(query.ids.as_deref());
    let last_event_id = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<Uuid>().ok());

    let buffer = Arc::clone(&state.event_buffer);
    let rx = state.event_bus.subscribe();

    let missed_events = match last_event_id {
        Some(event_id) => buffer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .events_after(event_id),
        None => vec![],
    };
    let missed_ids = ids.clone();
    let missed_stream = futures::stream::iter(
        missed_events
            .into_iter()
            .filter(move |e| missed_ids.as_deref().map_or(true, |ids| matches_filter(&e.event, ids)))
            .map(|e| envelope_to_sse_event(&e)),
    );

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| {
        let ids = ids.clone();
        let buffer = Arc::clone(&buffer);

        async move {
            match result {
                Ok(envelope) => {
                    buffer
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push(envelope.clone());

                    if let Some(ref ids) = ids {
                        if !matches_filter(&envelope.event, ids) {
                            return None;
                        }
                    }

                    Some(envelope_to_sse_event(&envelope))
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "SSE broadcast error");
                    None
                }
            }
        }
    });

    Sse::new(missed_stream.chain(live_stream)).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
