//! Vendor-client backend.
//!
//! Delegates to a [`VendorClient`], the call surface of the service's
//! official client library. Any implementation can be plugged in; the
//! built-in [`OfficialClient`] speaks JSON-RPC over the HTTP port and tracks
//! the quota the service reports. Vendor faults are mapped onto [`Error`]
//! here and nowhere else.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, warn};

use crate::config::AuthMode;
use crate::error::{Cause, Error, Result};
use crate::http::HttpClient;
use crate::request::{BackendKind, RandomRequest, RandomResult, SignedPayload, Usage};
use crate::rpc::{self, RpcFailure};
use crate::transport::{CallContext, Transport, TransportInfo};

pub(crate) static VENDOR_INFO: TransportInfo = TransportInfo {
    kind: BackendKind::Vendor,
    description: "Official client library, optionally signed",
    auth: AuthMode::ApiKey,
    signing: true,
};

// Service codes the official client raises dedicated faults for.
const KEY_DOES_NOT_EXIST: i64 = 400;
const KEY_NOT_RUNNING: i64 = 401;
const INSUFFICIENT_REQUESTS: i64 = 402;
const INSUFFICIENT_BITS: i64 = 403;

/// Arguments of one vendor call.
#[derive(Debug, Clone, Copy)]
pub struct VendorCall<'a> {
    pub api_key: &'a str,
    pub n: usize,
    pub min: i64,
    pub max: i64,
    pub replacement: bool,
    pub endpoint: &'a str,
    pub timeout: Duration,
}

/// An unsigned vendor result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorIntegers {
    pub data: Vec<i64>,
    /// Quota reported with this response.
    pub usage: Option<Usage>,
}

/// A signed vendor result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSigned {
    pub data: Vec<i64>,
    /// The `random` object exactly as received.
    pub random: Vec<u8>,
    /// Decoded signature bytes.
    pub signature: Vec<u8>,
    /// Quota reported with this response.
    pub usage: Option<Usage>,
}

/// Failures a vendor client reports in its own terms.
#[derive(Debug, thiserror::Error)]
pub enum VendorFault {
    #[error("API key does not exist: {0}")]
    KeyNonExistent(String),
    #[error("API key is not running: {0}")]
    KeyNotRunning(String),
    #[error("insufficient requests left: {0}")]
    InsufficientRequests(String),
    #[error("insufficient bits left: {0}")]
    InsufficientBits(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(#[source] Cause),
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("unexpected response: {0}")]
    BadResponse(String),
}

impl From<VendorFault> for Error {
    fn from(fault: VendorFault) -> Self {
        match fault {
            VendorFault::KeyNonExistent(m) | VendorFault::KeyNotRunning(m) => Error::Auth(m),
            VendorFault::InsufficientRequests(message) => Error::Protocol {
                code: INSUFFICIENT_REQUESTS,
                message,
            },
            VendorFault::InsufficientBits(message) => Error::Protocol {
                code: INSUFFICIENT_BITS,
                message,
            },
            fault @ VendorFault::Timeout(_) => Error::transport(fault),
            VendorFault::Connection(cause) => Error::Transport { source: cause },
            VendorFault::Service { code, message } => Error::Protocol { code, message },
            VendorFault::BadResponse(m) => Error::Format(m),
        }
    }
}

impl From<RpcFailure> for VendorFault {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Service(e) => match e.code {
                KEY_DOES_NOT_EXIST => Self::KeyNonExistent(e.message),
                KEY_NOT_RUNNING => Self::KeyNotRunning(e.message),
                INSUFFICIENT_REQUESTS => Self::InsufficientRequests(e.message),
                INSUFFICIENT_BITS => Self::InsufficientBits(e.message),
                code => Self::Service {
                    code,
                    message: e.message,
                },
            },
            RpcFailure::Malformed(m) => Self::BadResponse(m),
            RpcFailure::Unavailable(e) => Self::Connection(Box::new(e)),
            RpcFailure::Http { status, excerpt } => Self::Service {
                code: i64::from(status),
                message: excerpt,
            },
        }
    }
}

/// The official client's call surface.
pub trait VendorClient: Send + Sync {
    fn generate_integers(
        &self,
        call: &VendorCall<'_>,
    ) -> std::result::Result<VendorIntegers, VendorFault>;

    fn generate_signed_integers(
        &self,
        call: &VendorCall<'_>,
    ) -> std::result::Result<VendorSigned, VendorFault>;
}

// ---------------------------------------------------------------------------
// Built-in client
// ---------------------------------------------------------------------------

/// JSON-RPC client mirroring the official library's behavior.
pub struct OfficialClient {
    http: Arc<dyn HttpClient>,
    usage: Mutex<Option<Usage>>,
}

impl OfficialClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            usage: Mutex::new(None),
        }
    }

    /// Quota as of the most recent successful call on this client.
    pub fn usage(&self) -> Option<Usage> {
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call(
        &self,
        call: &VendorCall<'_>,
        signed: bool,
    ) -> std::result::Result<rpc::IntegersOutcome, VendorFault> {
        let request = RandomRequest {
            count: call.n,
            minimum: call.min,
            maximum: call.max,
            signed,
            api_key: None,
            replacement: call.replacement,
        };
        let id = rpc::next_id();
        let body = rpc::encode_integers(&request, call.api_key, id);
        let resp = self
            .http
            .post_json(call.endpoint, &body, call.timeout)
            .map_err(|e| VendorFault::Connection(Box::new(e)))?;
        let raw = rpc::decode_envelope(&resp, call.endpoint, id)?;
        let outcome = rpc::decode_integers(&raw, signed)?;

        if outcome.usage.requests_left == Some(0) {
            warn!("vendor: API key has no requests left");
        }
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome.usage);
        Ok(outcome)
    }
}

impl VendorClient for OfficialClient {
    fn generate_integers(
        &self,
        call: &VendorCall<'_>,
    ) -> std::result::Result<VendorIntegers, VendorFault> {
        let outcome = self.call(call, false)?;
        Ok(VendorIntegers {
            data: outcome.values,
            usage: Some(outcome.usage),
        })
    }

    fn generate_signed_integers(
        &self,
        call: &VendorCall<'_>,
    ) -> std::result::Result<VendorSigned, VendorFault> {
        let outcome = self.call(call, true)?;
        let payload = outcome
            .signed
            .ok_or_else(|| VendorFault::BadResponse("signed call returned no signature".into()))?;
        Ok(VendorSigned {
            data: outcome.values,
            random: payload.random,
            signature: payload.signature,
            usage: Some(outcome.usage),
        })
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

pub struct VendorBackend {
    client: Box<dyn VendorClient>,
}

impl VendorBackend {
    pub fn new(client: Box<dyn VendorClient>) -> Self {
        Self { client }
    }
}

impl Transport for VendorBackend {
    fn info(&self) -> &TransportInfo {
        &VENDOR_INFO
    }

    fn fetch(&self, request: &RandomRequest, ctx: &CallContext<'_>) -> Result<RandomResult> {
        let call = VendorCall {
            api_key: ctx.api_key(request)?,
            n: request.count,
            min: request.minimum,
            max: request.maximum,
            replacement: request.replacement,
            endpoint: &ctx.transport.base_url,
            timeout: ctx.transport.timeout(),
        };
        debug!("vendor: n={} signed={}", call.n, request.signed);

        if request.signed {
            let signed = self.client.generate_signed_integers(&call)?;
            request.check_values(&signed.data)?;
            return Ok(RandomResult {
                values: signed.data,
                signature: Some(SignedPayload {
                    random: signed.random,
                    signature: signed.signature,
                }),
                verified: None,
                backend: BackendKind::Vendor,
                usage: signed.usage,
            });
        }

        let unsigned = self.client.generate_integers(&call)?;
        request.check_values(&unsigned.data)?;
        let mut result = RandomResult::unsigned(BackendKind::Vendor, unsigned.data);
        result.usage = unsigned.usage;
        Ok(result)
    }
}
