//! Scripted in-memory transport for tests.
//!
//! Responses are served in the order they were pushed; every request is
//! recorded together with the (tokio) instant it was sent.

use crate::error::{Result, SessionError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

enum Scripted {
    Response { status: u16, body: Vec<u8> },
    Error(SessionError),
}

/// Transport that replays a fixed script of responses.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<(HttpRequest, Instant)>>,
}

impl ScriptedTransport {
    /// Empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a 200 response with the given body.
    pub fn push_page(&self, body: impl Into<Vec<u8>>) -> &Self {
        self.push_response(200, body)
    }

    /// Queue a response with an arbitrary status.
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.lock_script().push_back(Scripted::Response {
            status,
            body: body.into(),
        });
        self
    }

    /// Queue an empty response with the given status.
    pub fn push_status(&self, status: u16) -> &Self {
        self.push_response(status, Vec::new())
    }

    /// Queue a transport-level failure.
    pub fn push_error(&self, error: SessionError) -> &Self {
        self.lock_script().push_back(Scripted::Error(error));
        self
    }

    /// Requests sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock_sent().iter().map(|(req, _)| req.clone()).collect()
    }

    /// Instants at which requests were sent.
    #[must_use]
    pub fn sent_at(&self) -> Vec<Instant> {
        self.lock_sent().iter().map(|(_, at)| *at).collect()
    }

    /// Responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock_script().len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.script.lock().expect("script lock poisoned")
    }

    fn lock_sent(&self) -> std::sync::MutexGuard<'_, Vec<(HttpRequest, Instant)>> {
        self.sent.lock().expect("request log lock poisoned")
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.lock_sent().push((request, Instant::now()));

        let next = self.lock_script().pop_front();
        match next {
            Some(Scripted::Response { status, body }) => Ok(HttpResponse { status, url, body }),
            Some(Scripted::Error(error)) => Err(error),
            None => Err(SessionError::Transport {
                url,
                message: "no scripted response left".to_string(),
            }),
        }
    }
}
