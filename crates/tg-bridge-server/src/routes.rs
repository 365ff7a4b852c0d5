//! Tool routes and the SSE event feed.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tg_bridge_client::{Bridge, ListenerId, NotificationDispatcher, Registration};
use tg_bridge_core::{BridgeEvent, ClientError};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
}

/// Build the router over an assembled bridge.
#[must_use]
pub fn router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(events))
        .route("/tools/send-code", post(send_code))
        .route("/tools/groups", get(list_groups))
        .route("/tools/groups/{group_id}/messages", get(list_group_messages))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { bridge })
}

/// Bind and serve until the root token fires.
///
/// # Errors
/// Socket bind and accept-loop failures.
pub async fn serve(
    bridge: Arc<Bridge>,
    port: u16,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let app = router(bridge);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "tool server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthBody {
    ready: bool,
}

#[derive(Deserialize)]
struct SendCodeRequest {
    code: String,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        ready: state.bridge.state.is_ready(),
    })
}

async fn send_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> Response {
    match state.bridge.auth.submit_code(req.code.trim()) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "code accepted" })),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "code submission rejected");
            (
                StatusCode::CONFLICT,
                Json(ErrorBody {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(50);
    match state.bridge.queries.list_groups(limit).await {
        Ok(listing) => Json(listing).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn list_group_messages(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(20);
    match state.bridge.queries.list_group_messages(group_id, limit).await {
        Ok(listing) => Json(listing).into_response(),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &ClientError) -> Response {
    let status = match err {
        ClientError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Unregisters the listener when the SSE stream is dropped.
struct ListenerGuard {
    dispatcher: Arc<NotificationDispatcher>,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.dispatcher.unregister(self.id);
    }
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let Registration { id, events } = state.bridge.dispatcher.register();
    let guard = ListenerGuard {
        dispatcher: Arc::clone(&state.bridge.dispatcher),
        id,
    };

    let hello = BridgeEvent::ListenerConnected {
        listener: id.to_string(),
    };
    let stream = futures::stream::once(std::future::ready(hello))
        .chain(UnboundedReceiverStream::new(events))
        .map(move |event| {
            // Keeps the listener registered for the stream's lifetime.
            let _guard = &guard;
            Event::default().event(event.name()).json_data(&event)
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
