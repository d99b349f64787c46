//! Test doubles for the [`AiClient`] seam.
//!
//! Available outside `cfg(test)` so downstream crates can drive their own
//! stage tests with scripted responses.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::{AiClient, CompletionRequest};
use crate::error::AiError;

/// Replays a fixed queue of responses, then repeats the final one.
pub struct ScriptedAi {
    responses: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Result<String, String>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAi {
    /// Script an exact sequence of responses. Once exhausted, the last
    /// response repeats for any further calls.
    pub fn new(responses: Vec<Result<String, AiError>>) -> Self {
        let queue: VecDeque<Result<String, String>> = responses
            .into_iter()
            .map(|r| r.map_err(|e| e.to_string()))
            .collect();
        let last = queue
            .back()
            .cloned()
            .unwrap_or_else(|| Err("script empty".into()));
        Self {
            responses: Mutex::new(queue),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client that fails every call with a fresh copy of `err`.
    pub fn always(err: AiError) -> Self {
        Self::new(vec![Err(err)])
    }

    /// A client that answers every call with the same text.
    pub fn constant(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    /// Number of completion calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts observed, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    fn next_response(&self) -> Result<String, String> {
        let mut queue = self.responses.lock().expect("responses lock");
        match queue.pop_front() {
            Some(resp) => {
                if queue.is_empty() {
                    *self.last.lock().expect("last lock") = resp.clone();
                }
                resp
            }
            None => self.last.lock().expect("last lock").clone(),
        }
    }
}

impl AiClient for ScriptedAi {
    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, AiError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(req.prompt.clone());
        let response = self.next_response();
        async move { response.map_err(reparse_error) }
    }
}

/// Errors cross the scripted queue as display strings; map the well-known
/// ones back onto the taxonomy so `is_transient` behaves in tests.
fn reparse_error(msg: String) -> AiError {
    match msg.as_str() {
        "rate limited by provider" => AiError::RateLimited,
        "AI call timed out" => AiError::Timeout,
        "AI call cancelled" => AiError::Cancelled,
        other if other.starts_with("transport error: ") => {
            AiError::Transport(other["transport error: ".len()..].to_string())
        }
        other if other.starts_with("invalid AI response: ") => {
            AiError::InvalidResponse(other["invalid AI response: ".len()..].to_string())
        }
        other => AiError::InvalidResponse(other.to_string()),
    }
}
