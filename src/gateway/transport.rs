//! HTTP transport for the gateway client.
//!
//! The transport only moves bytes: it sends one already-shaped request and
//! hands back the raw response body. Envelope parsing happens in the client.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;

/// A fully shaped request ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    Get {
        url: Url,
    },
    Post {
        url: Url,
        content_type: String,
        body: String,
    },
}

impl OutboundRequest {
    pub fn url(&self) -> &Url {
        match self {
            OutboundRequest::Get { url } => url,
            OutboundRequest::Post { url, .. } => url,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            OutboundRequest::Get { .. } => "GET",
            OutboundRequest::Post { .. } => "POST",
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            OutboundRequest::Get { .. } => None,
            OutboundRequest::Post { body, .. } => Some(body),
        }
    }
}

/// The request could not be completed. Nothing is known about backend state.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Could not connect to the server: {0}")]
    Connect(String),

    #[error("The server did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read the response body: {0}")]
    Body(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the response body, whatever the HTTP status.
    async fn send(&self, request: OutboundRequest) -> Result<String, TransportError>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<String, TransportError> {
        let user_agent = format!("invoice-portal/{}", env!("CARGO_PKG_VERSION"));
        let builder = match request {
            OutboundRequest::Get { url } => self.client.get(url),
            OutboundRequest::Post {
                url,
                content_type,
                body,
            } => self
                .client
                .post(url)
                .header(CONTENT_TYPE, content_type)
                .body(body),
        };

        let response = builder
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Body(e.to_string())
            }
        })
    }
}
