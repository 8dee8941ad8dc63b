//! Shared test helpers and mock backend.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use strum::IntoEnumIterator;

use drover::backend::{BackendRequest, BackendResponse, GenerationBackend};
use drover::error::{DroverError, Result};
use drover::router::ModelPolicy;
use drover::task::Task;
use drover::types::Usage;

/// One scripted backend reply.
pub enum Reply {
    Text(String),
    Error(DroverError),
    /// Sleeps far past any test deadline; the attempt times out first.
    Hang,
}

/// A mock backend that returns scripted replies in order and records
/// every request it sees.
pub struct MockBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<BackendRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_text(&self, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Text(text.to_string()));
    }

    pub fn queue_error(&self, error: DroverError) {
        self.replies.lock().unwrap().push_back(Reply::Error(error));
    }

    pub fn queue_hang(&self) {
        self.replies.lock().unwrap().push_back(Reply::Hang);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Model identifiers in the order attempts hit the backend.
    pub fn models_seen(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }

    pub fn last_request(&self) -> Option<BackendRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(BackendResponse {
                text,
                usage: Usage {
                    input_tokens: 10,
                    output_tokens: 20,
                    total_tokens: 30,
                },
            }),
            Some(Reply::Error(error)) => Err(error),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Err(DroverError::api(599, "hang elapsed"))
            }
            None => Ok(BackendResponse {
                text: "{}".to_string(),
                usage: Usage::default(),
            }),
        }
    }
}

/// Policy with the given list for one task and a placeholder for the
/// rest, so construction-time validation passes.
pub fn policy_for(task: Task, models: &[&str]) -> ModelPolicy {
    let mut table: HashMap<Task, Vec<String>> = Task::iter()
        .map(|t| (t, vec!["unused-model".to_string()]))
        .collect();
    table.insert(task, models.iter().map(|m| m.to_string()).collect());
    ModelPolicy::new(table).unwrap()
}
