//! Convenience-wrapper backend.
//!
//! A thin, unsigned surface in the style of the popular third-party wrapper:
//! plain integers and a usage report, nothing else. [`BasicApi`] is the
//! built-in implementation over JSON-RPC.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::config::AuthMode;
use crate::error::{Cause, Error, Result};
use crate::http::HttpClient;
use crate::request::{BackendKind, RandomRequest, RandomResult};
use crate::rpc::{self, RpcFailure, UsageReport};
use crate::transport::{CallContext, Transport, TransportInfo};

pub(crate) static CONVENIENCE_INFO: TransportInfo = TransportInfo {
    kind: BackendKind::Convenience,
    description: "High-level wrapper, unsigned integers and usage",
    auth: AuthMode::ApiKey,
    signing: false,
};

/// Arguments of one wrapper call.
#[derive(Debug, Clone, Copy)]
pub struct ConvenienceCall<'a> {
    pub api_key: &'a str,
    pub num: usize,
    pub minimum: i64,
    pub maximum: i64,
    pub replacement: bool,
    pub endpoint: &'a str,
    pub timeout: Duration,
}

/// Wrapper failures.
#[derive(Debug, thiserror::Error)]
pub enum ConvenienceError {
    #[error("rejected API key: {0}")]
    Key(String),
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("network error: {0}")]
    Network(#[source] Cause),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<ConvenienceError> for Error {
    fn from(e: ConvenienceError) -> Self {
        match e {
            ConvenienceError::Key(m) => Error::Auth(m),
            ConvenienceError::Api { code, message } => Error::Protocol { code, message },
            ConvenienceError::Network(cause) => Error::Transport { source: cause },
            ConvenienceError::Decode(m) => Error::Format(m),
        }
    }
}

impl From<RpcFailure> for ConvenienceError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Service(e) if e.is_auth() => Self::Key(e.message),
            RpcFailure::Service(e) => Self::Api {
                code: e.code,
                message: e.message,
            },
            RpcFailure::Malformed(m) => Self::Decode(m),
            RpcFailure::Unavailable(e) => Self::Network(Box::new(e)),
            RpcFailure::Http { status, excerpt } => Self::Api {
                code: i64::from(status),
                message: excerpt,
            },
        }
    }
}

/// The wrapper's call surface.
pub trait ConvenienceApi: Send + Sync {
    fn generate_integers(
        &self,
        call: &ConvenienceCall<'_>,
    ) -> std::result::Result<Vec<i64>, ConvenienceError>;

    fn get_usage(
        &self,
        call: &ConvenienceCall<'_>,
    ) -> std::result::Result<UsageReport, ConvenienceError>;
}

/// Built-in wrapper over JSON-RPC.
pub struct BasicApi {
    http: Arc<dyn HttpClient>,
}

impl BasicApi {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    fn invoke(
        &self,
        call: &ConvenienceCall<'_>,
        id: u64,
        body: &[u8],
    ) -> std::result::Result<Box<serde_json::value::RawValue>, ConvenienceError> {
        let resp = self
            .http
            .post_json(call.endpoint, body, call.timeout)
            .map_err(|e| ConvenienceError::Network(Box::new(e)))?;
        Ok(rpc::decode_envelope(&resp, call.endpoint, id)?)
    }
}

impl ConvenienceApi for BasicApi {
    fn generate_integers(
        &self,
        call: &ConvenienceCall<'_>,
    ) -> std::result::Result<Vec<i64>, ConvenienceError> {
        let mut request = RandomRequest::integers(call.num, call.minimum, call.maximum);
        request.replacement = call.replacement;
        let id = rpc::next_id();
        let raw = self.invoke(call, id, &rpc::encode_integers(&request, call.api_key, id))?;
        Ok(rpc::decode_integers(&raw, false)?.values)
    }

    fn get_usage(
        &self,
        call: &ConvenienceCall<'_>,
    ) -> std::result::Result<UsageReport, ConvenienceError> {
        let id = rpc::next_id();
        let raw = self.invoke(call, id, &rpc::encode_usage(call.api_key, id))?;
        Ok(rpc::decode_usage(&raw)?)
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

pub struct ConvenienceBackend {
    api: Box<dyn ConvenienceApi>,
}

impl ConvenienceBackend {
    pub fn new(api: Box<dyn ConvenienceApi>) -> Self {
        Self { api }
    }

    /// Usage statistics for the key in effect.
    pub fn usage(&self, api_key: Option<&str>, ctx: &CallContext<'_>) -> Result<UsageReport> {
        let call = ConvenienceCall {
            api_key: ctx.resolve_key(api_key)?,
            num: 0,
            minimum: 0,
            maximum: 0,
            replacement: true,
            endpoint: &ctx.transport.base_url,
            timeout: ctx.transport.timeout(),
        };
        Ok(self.api.get_usage(&call)?)
    }
}

impl Transport for ConvenienceBackend {
    fn info(&self) -> &TransportInfo {
        &CONVENIENCE_INFO
    }

    fn fetch(&self, request: &RandomRequest, ctx: &CallContext<'_>) -> Result<RandomResult> {
        self.ensure_signing(request)?;
        let call = ConvenienceCall {
            api_key: ctx.api_key(request)?,
            num: request.count,
            minimum: request.minimum,
            maximum: request.maximum,
            replacement: request.replacement,
            endpoint: &ctx.transport.base_url,
            timeout: ctx.transport.timeout(),
        };
        debug!("convenience: n={}", call.num);
        let values = self.api.generate_integers(&call)?;
        request.check_values(&values)?;
        Ok(RandomResult::unsigned(BackendKind::Convenience, values))
    }
}
