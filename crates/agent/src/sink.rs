//! Alert delivery from the page side to the merge engine.
//!
//! Delivery is fire-and-forget: a sink may fail, but callers only log the
//! error. A dropped alert is an accepted loss.

use std::sync::Mutex;

use domsentry_core::Message;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no listener: {0}")]
    Disconnected(String),
    #[error("no async runtime available for delivery")]
    NoRuntime,
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for messages produced by the collector.
pub trait AlertSink: Send + Sync {
    fn send(&self, message: Message) -> Result<(), SinkError>;
}

/// Keeps every message, for tests and replay tooling.
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<Message>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemorySink {
    fn send(&self, message: Message) -> Result<(), SinkError> {
        match self.messages.lock() {
            Ok(mut guard) => guard.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
        Ok(())
    }
}

/// Hands messages to an in-process consumer (e.g. an embedded server).
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }
}

impl AlertSink for ChannelSink {
    fn send(&self, message: Message) -> Result<(), SinkError> {
        self.tx
            .send(message)
            .map_err(|e| SinkError::Disconnected(e.0.kind().to_string()))
    }
}

/// POSTs each message to the server's message endpoint on a spawned task.
pub struct HttpSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// `base` is the server root, e.g. `http://127.0.0.1:8787`.
    pub fn for_server(base: &str) -> Self {
        Self::new(&format!("{}/api/message", base.trim_end_matches('/')))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AlertSink for HttpSink {
    fn send(&self, message: Message) -> Result<(), SinkError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SinkError::NoRuntime)?;
        let body = serde_json::to_value(&message)?;
        let endpoint = self.endpoint.clone();
        let client = self.client.clone();

        handle.spawn(async move {
            match client.post(&endpoint).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::debug!(status = %resp.status(), "alert delivery rejected");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "alert delivery failed"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.send(Message::GetAlerts).unwrap();
        sink.send(Message::ClearAlerts).unwrap();
        let kinds: Vec<_> = sink.messages().iter().map(Message::kind).collect();
        assert_eq!(kinds, vec!["getAlerts", "clearAlerts"]);
    }

    #[test]
    fn test_channel_sink_disconnected() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        drop(rx);
        let err = sink.send(Message::GetBadge).unwrap_err();
        assert!(matches!(err, SinkError::Disconnected(ref kind) if kind == "getBadge"));
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        sink.send(Message::ClearNew).unwrap();
        assert_eq!(rx.recv().await.unwrap().kind(), "clearNew");
    }

    #[test]
    fn test_http_sink_without_runtime() {
        let sink = HttpSink::for_server("http://127.0.0.1:1/");
        assert_eq!(sink.endpoint(), "http://127.0.0.1:1/api/message");
        assert!(matches!(sink.send(Message::GetAlerts), Err(SinkError::NoRuntime)));
    }
}
