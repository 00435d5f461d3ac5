// src/api/handlers.rs

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;

use crate::api::{types::*, ApiState};
use crate::chat::message::{Message, Role, SessionSummary};
use crate::chat::{RenderSink, SinkClosed};

/// GET /api/v1/health — Simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/v1/sessions — All known sessions, most recent first.
pub async fn list_sessions(
    State(state): State<ApiState>,
) -> Result<Json<Vec<SessionSummary>>, (StatusCode, Json<ErrorResponse>)> {
    let sessions = state.controller.list_sessions().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: format!("Session index unavailable: {e}"),
            }),
        )
    })?;
    Ok(Json(sessions))
}

/// GET /api/v1/sessions/:id/messages — Last-window page of a transcript.
/// An unknown session yields an empty page, not an error.
pub async fn get_messages(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<TranscriptPage>, (StatusCode, Json<ErrorResponse>)> {
    let window = query.window.unwrap_or(state.controller.options().window);

    let (total, messages) = state
        .controller
        .transcript_page(&id, window)
        .await
        .map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: format!("Chat history unavailable: {e}"),
                }),
            )
        })?;

    Ok(Json(TranscriptPage {
        session_id: id,
        total,
        window,
        messages,
    }))
}

/// POST /api/v1/sessions/:id/messages — Run one exchange, streaming the
/// assistant reply as SSE: `delta` events carry the accumulated partial
/// text, `done` the final message, `error` an inline notice. Dropping the
/// connection mid-stream abandons the exchange without persisting.
pub async fn submit_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorResponse>)> {
    if body.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message cannot be empty".into(),
            }),
        ));
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = state.controller.clone();

    // Exchanges for one session id are serialized inside the controller,
    // so two concurrent POSTs to the same session cannot overwrite each
    // other's persisted transcript.
    tokio::spawn(async move {
        let mut sink = ChannelSink { tx };
        let _ = controller
            .submit_to_session(&id, &body.content, &mut sink)
            .await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(event);
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Forwards render-sink calls as SSE events; a closed channel means the
/// client went away and the exchange should be abandoned.
struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl RenderSink for ChannelSink {
    fn partial(&mut self, text: &str) -> Result<(), SinkClosed> {
        self.tx
            .send(Event::default().event("delta").data(text))
            .map_err(|_| SinkClosed)
    }

    fn message(&mut self, message: &Message) -> Result<(), SinkClosed> {
        if self.tx.is_closed() {
            return Err(SinkClosed);
        }
        if message.role == Role::Assistant {
            let _ = self
                .tx
                .send(Event::default().event("done").data(&message.content));
        }
        Ok(())
    }

    fn notice(&mut self, text: &str) {
        let _ = self.tx.send(Event::default().event("error").data(text));
    }
}
