//! The one channel to the backend.
//!
//! Callers name an action and pass a flat parameter map. The client looks the
//! action up in the [`ActionTable`], injects the session token, shapes a GET
//! or POST against the single endpoint, and hands back a [`ResponseEnvelope`].
//!
//! Two failure channels stay apart:
//! - `Ok(ResponseEnvelope::Failure(_))`: the backend answered and said no.
//! - `Err(GatewayError::Transport(_))`: the request never completed.

mod actions;
mod envelope;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{
    ActionSpec, ActionTable, ActionTableError, Method, CREATE_SUPPLIER, EXPORT_CSV,
    GET_ALL_INVOICES, GET_DASHBOARD_STATS, GET_INVOICE_DETAIL, GET_MY_INVOICES, GET_SUPPLIERS,
    LOGIN, RESERVED_KEYS, UPDATE_INVOICE_STATUS, UPLOAD_INVOICE,
};
pub use envelope::{ResponseEnvelope, INVALID_RESPONSE};
pub use transport::{HttpTransport, OutboundRequest, Transport, TransportError};

use anyhow::Context;
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::session::SessionStore;

/// Request parameters: string keys to scalar JSON values.
pub type Params = Map<String, Value>;

/// How much of a malformed body ends up in the log.
const LOGGED_BODY_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Parameter '{0}' is reserved and set by the client")]
    ReservedParam(String),

    #[error("Parameter '{0}' must be a string, number, boolean or null")]
    NonScalarParam(String),

    #[error("Action '{0}' requires a logged-in session")]
    NotAuthenticated(String),

    #[error("Invalid write content type {0:?}")]
    InvalidContentType(String),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GatewayError {
    /// True when the request left (or tried to leave) the process and failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

/// Build a [`Params`] map from key/value pairs.
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Clone)]
pub struct ApiClient {
    endpoint: Url,
    actions: ActionTable,
    session: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    write_content_type: String,
}

impl ApiClient {
    pub fn new(
        endpoint: Url,
        actions: ActionTable,
        session: Arc<SessionStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            endpoint,
            actions,
            session,
            transport,
            write_content_type: "text/plain;charset=utf-8".to_string(),
        }
    }

    /// Client over HTTP using the endpoint, timeout and action table from `config`.
    pub fn from_config(config: &Config, session: Arc<SessionStore>) -> anyhow::Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let actions = config.action_table()?;
        let transport = HttpTransport::new(Duration::from_secs(config.api.timeout_secs))
            .context("Failed to create HTTP client")?;

        let client = Self::new(endpoint, actions, session, Arc::new(transport))
            .with_write_content_type(config.api.write_content_type.clone())?;
        Ok(client)
    }

    /// Fails when `content_type` cannot be sent as a header value.
    pub fn with_write_content_type(
        mut self,
        content_type: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let content_type = content_type.into();
        if content_type.trim().is_empty() || HeaderValue::from_str(&content_type).is_err() {
            return Err(GatewayError::InvalidContentType(content_type));
        }
        self.write_content_type = content_type;
        Ok(self)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Invoke `action` and return the backend's envelope.
    ///
    /// A body that is not a valid envelope comes back as a synthetic
    /// [`ResponseEnvelope::Failure`], never as an error.
    pub async fn call(
        &self,
        action: &str,
        params: Params,
    ) -> Result<ResponseEnvelope, GatewayError> {
        let request = self.build_request(action, params)?;
        debug!(action, method = request.method(), "Dispatching backend action");

        let body = self.transport.send(request).await?;

        match ResponseEnvelope::parse(&body) {
            Some(envelope) => {
                debug!(action, success = envelope.is_success(), "Backend answered");
                Ok(envelope)
            }
            None => {
                let preview: String = body.chars().take(LOGGED_BODY_CHARS).collect();
                warn!(action, body = %preview, "Backend response is not a valid envelope");
                Ok(ResponseEnvelope::invalid())
            }
        }
    }

    /// Shape the HTTP request for `action` without sending it.
    pub fn build_request(
        &self,
        action: &str,
        params: Params,
    ) -> Result<OutboundRequest, GatewayError> {
        let spec = self
            .actions
            .get(action)
            .ok_or_else(|| GatewayError::UnknownAction(action.to_string()))?;

        if let Some(key) = RESERVED_KEYS.iter().find(|k| params.contains_key(**k)) {
            return Err(GatewayError::ReservedParam(key.to_string()));
        }
        if let Some((key, _)) = params.iter().find(|(_, v)| v.is_array() || v.is_object()) {
            return Err(GatewayError::NonScalarParam(key.clone()));
        }

        let token = self.session.token();
        if spec.requires_token && token.is_none() {
            return Err(GatewayError::NotAuthenticated(action.to_string()));
        }

        match spec.method {
            Method::Read => {
                let mut pairs: Vec<(String, String)> = Vec::with_capacity(params.len() + 2);
                pairs.push(("action".to_string(), action.to_string()));
                pairs.extend(params.into_iter().map(|(k, v)| (k, scalar_text(v))));
                if let Some(token) = token {
                    pairs.push(("token".to_string(), token));
                }

                let query = pairs
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&");

                let mut url = self.endpoint.clone();
                url.set_query(Some(&query));
                Ok(OutboundRequest::Get { url })
            }
            Method::Write => {
                let mut body = Map::with_capacity(params.len() + 2);
                body.insert("action".to_string(), Value::String(action.to_string()));
                body.extend(params);
                if let Some(token) = token {
                    body.insert("token".to_string(), Value::String(token));
                }

                Ok(OutboundRequest::Post {
                    url: self.endpoint.clone(),
                    content_type: self.write_content_type.clone(),
                    body: serde_json::to_string(&Value::Object(body))?,
                })
            }
        }
    }
}

/// Text form of a scalar parameter in a query string.
fn scalar_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
