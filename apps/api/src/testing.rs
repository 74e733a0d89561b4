//! Test doubles shared by unit tests across modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm_client::{ChatModel, LlmError};
use crate::models::user::Subscriber;
use crate::notify::Notifier;

type Responder = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

/// A `ChatModel` whose reply is computed from the user prompt.
pub struct FnModel {
    respond: Responder,
    calls: AtomicUsize,
}

impl FnModel {
    pub fn new(respond: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for FnModel {
    async fn complete(
        &self,
        _system: &str,
        prompt: &str,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(prompt)
    }
}

/// A `Notifier` that records what it was asked to send and answers with a
/// fixed result.
pub struct RecordingNotifier {
    succeed: bool,
    sent: Mutex<Vec<(i32, String)>>,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self {
            succeed,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// `(user_id, content)` pairs in send order.
    pub fn sent(&self) -> Vec<(i32, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_research_digest(&self, user: &Subscriber, content: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((user.id, content.to_string()));
        self.succeed
    }
}
