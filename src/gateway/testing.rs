//! Scripted transport for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

use super::transport::{OutboundRequest, Transport, TransportError};

enum Reply {
    Body(String),
    Refused,
}

/// Records every request and answers from a queue of canned replies.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    requests: Mutex<Vec<OutboundRequest>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply_json(&self, value: Value) {
        self.reply_body(&value.to_string());
    }

    pub(crate) fn reply_body(&self, body: &str) {
        self.replies.lock().push_back(Reply::Body(body.to_string()));
    }

    pub(crate) fn refuse(&self) {
        self.replies.lock().push_back(Reply::Refused);
    }

    pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn last_request(&self) -> OutboundRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<String, TransportError> {
        self.requests.lock().push(request);
        match self.replies.lock().pop_front() {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Refused) => Err(TransportError::Connect("connection refused".to_string())),
            None => Err(TransportError::Request("no scripted reply".to_string())),
        }
    }
}

/// Decoded query parameters of a GET request.
pub(crate) fn query_pairs(request: &OutboundRequest) -> HashMap<String, String> {
    request
        .url()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parsed JSON body of a POST request.
pub(crate) fn json_body(request: &OutboundRequest) -> Value {
    let body = request.body().expect("request has no body");
    serde_json::from_str(body).expect("body is not JSON")
}
