// src/store/server.rs — Async message passing for Store

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::chat::message::{decode_transcript, encode_transcript, SessionSummary, Transcript};
use crate::store::sqlite::Store;

#[derive(Debug)]
pub enum StoreCommand {
    GetTranscript {
        session_id: String,
        resp: oneshot::Sender<anyhow::Result<Transcript>>,
    },
    PutTranscript {
        session_id: String,
        transcript: Transcript,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    AddSummary {
        summary: SessionSummary,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    ListSummaries {
        resp: oneshot::Sender<anyhow::Result<Vec<SessionSummary>>>,
    },
}

/// A handle to the Store that uses message passing. The connection lives
/// on one task, so concurrent callers across independent sessions are
/// serialized at the storage boundary without locking.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    /// Returns an empty transcript for an unknown session; a stored value
    /// that fails to decode also comes back empty.
    pub async fn get_transcript(&self, session_id: String) -> anyhow::Result<Transcript> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::GetTranscript {
                session_id,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn put_transcript(
        &self,
        session_id: String,
        transcript: Transcript,
    ) -> anyhow::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::PutTranscript {
                session_id,
                transcript,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn add_summary(&self, summary: SessionSummary) -> anyhow::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::AddSummary {
                summary,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn list_summaries(&self) -> anyhow::Result<Vec<SessionSummary>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::ListSummaries { resp: resp_tx })
            .await?;
        resp_rx.await?
    }
}

/// Move the store onto its own task and hand back an async handle.
/// Must be called from within a tokio runtime.
pub fn spawn(store: Store) -> StoreHandle {
    let (tx, mut rx) = mpsc::channel(64);

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            handle_command(&store, cmd);
        }
    });

    StoreHandle::new(tx)
}

fn handle_command(store: &Store, cmd: StoreCommand) {
    match cmd {
        StoreCommand::GetTranscript { session_id, resp } => {
            let result = store.get_transcript(&session_id).map(|body| match body {
                Some(body) => decode_transcript(&session_id, &body),
                None => Vec::new(),
            });
            let _ = resp.send(result);
        }
        StoreCommand::PutTranscript {
            session_id,
            transcript,
            resp,
        } => {
            let result = encode_transcript(&transcript)
                .and_then(|body| store.put_transcript(&session_id, &body));
            let _ = resp.send(result);
        }
        StoreCommand::AddSummary { summary, resp } => {
            let result = store.add_summary(
                &summary.id,
                &summary.first_message,
                &summary.created_at.to_rfc3339(),
            );
            let _ = resp.send(result);
        }
        StoreCommand::ListSummaries { resp } => {
            let result = store.list_summaries().map(|rows| {
                rows.into_iter()
                    .map(|row| SessionSummary {
                        created_at: parse_timestamp(&row.id, &row.created_at),
                        id: row.id,
                        first_message: row.first_message,
                    })
                    .collect()
            });
            let _ = resp.send(result);
        }
    }
}

fn parse_timestamp(id: &str, raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Bad created_at for session {id}: {e}");
            DateTime::<Utc>::MIN_UTC
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Message;
    use pretty_assertions::assert_eq;

    fn test_handle() -> StoreHandle {
        spawn(Store::in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_transcript_roundtrip() {
        let handle = test_handle();
        let t = vec![Message::user("Hello"), Message::assistant("Hi there")];

        handle.put_transcript("s1".into(), t.clone()).await.unwrap();
        let loaded = handle.get_transcript("s1".into()).await.unwrap();
        assert_eq!(loaded, t);
    }

    #[tokio::test]
    async fn test_missing_session_is_empty() {
        let handle = test_handle();
        assert!(handle.get_transcript("absent".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_idempotence_through_handle() {
        let handle = test_handle();
        let summary = SessionSummary::new("s1", "Hello world", 50);

        handle.add_summary(summary.clone()).await.unwrap();
        handle.add_summary(summary.clone()).await.unwrap();

        let listed = handle.list_summaries().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "s1");
        assert_eq!(listed[0].first_message, "Hello world");
    }
}
