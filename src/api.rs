//! HTTP surface.
//!
//! - `GET /api/latest/pvt`: current fix, or null
//! - `GET /api/latest/observables?limit=N`: fresh channels, strongest first
//! - `GET /api/health`: feed health and process counters
//! - `GET /ws`: real-time feed. The current snapshot is sent on connection,
//!   then every published record, in order. No resend on reconnection.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::{
    broadcast::{Broadcaster, Payload, SubscriberSink, Subscription},
    decoder::Telemetry,
    error::{Error, TransportSendError},
    ingress::Pipeline,
    record::{ObservableSample, PvtFix},
    runtime::RuntimeStatus,
    store::HealthSummary,
};

/// Shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Pipeline,

    /// Default observables result count
    pub limit: usize,
}

#[derive(Debug, Serialize)]
struct PvtResponse {
    ok: bool,
    pvt: Option<PvtFix>,
}

#[derive(Debug, Serialize)]
struct ObservablesResponse {
    ok: bool,
    meta: HealthSummary,
    observables: Vec<ObservableSample>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    meta: HealthSummary,
    runtime: RuntimeStatus,
}

#[derive(Debug, Deserialize)]
struct ObservablesQuery {
    limit: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/latest/pvt", get(latest_pvt))
        .route("/api/latest/observables", get(latest_observables))
        .route("/api/health", get(health))
        .route("/ws", get(feed))
        .with_state(state)
}

/// Binds the HTTP listener. Failure is fatal to the caller.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("http listener bound to {}", addr);
    Ok(listener)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), Error> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn latest_pvt(State(state): State<AppState>) -> Json<PvtResponse> {
    Json(PvtResponse {
        ok: true,
        pvt: state.pipeline.store.current_pvt(),
    })
}

async fn latest_observables(
    State(state): State<AppState>,
    Query(query): Query<ObservablesQuery>,
) -> Json<ObservablesResponse> {
    let limit = query.limit.unwrap_or(state.limit);
    let (observables, meta) = state.pipeline.store.snapshot(Some(limit));

    Json(ObservablesResponse {
        ok: true,
        meta,
        observables,
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline = &state.pipeline;
    Json(HealthResponse {
        ok: true,
        meta: pipeline.store.health_summary(),
        runtime: pipeline.runtime.status(pipeline.broadcaster.count()),
    })
}

async fn feed(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    // registered before upgrading: nothing published from now on is missed
    let subscription = match state.pipeline.broadcaster.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("refusing real-time subscriber: {}", e);
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        },
    };

    ws.on_upgrade(move |socket| serve_feed(socket, state, subscription))
}

/// Current state, as feed records
fn snapshot_records(state: &AppState) -> Vec<Payload> {
    let store = &state.pipeline.store;
    let mut records = Vec::with_capacity(2);

    if let Some(fix) = store.current_pvt() {
        records.extend(Broadcaster::encode(&Telemetry::Pvt(fix)));
    }

    let observables = store.current_observables(None);
    if !observables.is_empty() {
        records.extend(Broadcaster::encode(&Telemetry::Observables { observables }));
    }

    records
}

async fn serve_feed(socket: WebSocket, state: AppState, subscription: Subscription) {
    let id = subscription.id();
    let broadcaster = &state.pipeline.broadcaster;

    debug!("subscriber #{} connected", id);

    let snapshot = snapshot_records(&state);
    let (sink, mut stream) = socket.split();

    tokio::select! {
        _ = broadcaster.forward(subscription, sink, snapshot) => {},
        _ = client_gone(&mut stream) => {
            broadcaster.unsubscribe(id);
        },
    }

    debug!("subscriber #{} disconnected", id);
}

/// Resolves once the client closes its end. Client frames are ignored.
async fn client_gone(stream: &mut SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {},
        }
    }
}

impl SubscriberSink for SplitSink<WebSocket, Message> {
    async fn deliver(&mut self, payload: Payload) -> Result<(), TransportSendError> {
        self.send(Message::Text(payload.to_string().into()))
            .await
            .map_err(|e| TransportSendError::WebSocket(e.to_string()))
    }
}
