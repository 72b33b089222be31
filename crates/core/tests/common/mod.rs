//! Common test utilities for integration tests.
//!
//! This module provides shared test helpers and recording collaborators
//! for exercising chat sessions end to end.

use lanchat_core::{Effect, Envelope, HistorySink, LogEntry, LogSink, MessageKind, Result, Transport};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default timeout for test operations.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize test logging with appropriate filters.
///
/// Call this at the start of tests that need debug output.
/// Safe to call multiple times (subsequent calls are no-ops).
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lanchat_core=debug")))
        .with_test_writer()
        .try_init();
}

/// Run an async operation with a timeout.
///
/// Returns the result if the operation completes within the timeout,
/// or panics with a timeout message if it doesn't.
#[allow(dead_code)]
pub async fn with_timeout<T, F>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, fut)
        .await
        .expect("Test operation timed out")
}

/// Records everything the session asks its collaborators to do.
#[derive(Clone, Default)]
pub struct Recorder {
    pub sent: Arc<Mutex<Vec<(String, Envelope)>>>,
    pub logged: Arc<Mutex<Vec<(MessageKind, Option<String>)>>>,
    pub presented: Arc<Mutex<Vec<Effect>>>,
    pub saved: Arc<Mutex<Vec<(String, usize)>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn sent(&self) -> Vec<(String, Envelope)> {
        self.sent.lock().unwrap().clone()
    }

    /// Sends of one message kind, in order.
    pub fn sent_of(&self, kind: MessageKind) -> Vec<(String, Envelope)> {
        self.sent().into_iter().filter(|(_, env)| env.kind == kind).collect()
    }

    /// Chat states announced to `peer_id`, in order.
    pub fn chat_states_to(&self, peer_id: &str) -> Vec<String> {
        self.sent_of(MessageKind::ChatState)
            .into_iter()
            .filter(|(peer, _)| peer == peer_id)
            .filter_map(|(_, env)| env.data("chatstate").map(str::to_string))
            .collect()
    }

    pub fn logged(&self) -> Vec<(MessageKind, Option<String>)> {
        self.logged.lock().unwrap().clone()
    }

    pub fn presented(&self) -> Vec<Effect> {
        self.presented.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<(String, usize)> {
        self.saved.lock().unwrap().clone()
    }
}

impl Transport for Recorder {
    fn send(&mut self, peer_id: &str, envelope: &Envelope) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((peer_id.to_string(), envelope.clone()));
        Ok(())
    }
}

impl LogSink for Recorder {
    fn append(&mut self, kind: MessageKind, sender_id: Option<&str>, _sender_name: Option<&str>, _envelope: &Envelope) {
        self.logged
            .lock()
            .unwrap()
            .push((kind, sender_id.map(str::to_string)));
    }

    fn present(&mut self, effect: &Effect) {
        self.presented.lock().unwrap().push(effect.clone());
    }
}

impl HistorySink for Recorder {
    fn save(&mut self, title: &str, _at: chrono::DateTime<chrono::Utc>, entries: &[LogEntry]) -> Result<()> {
        self.saved
            .lock()
            .unwrap()
            .push((title.to_string(), entries.len()));
        Ok(())
    }
}
