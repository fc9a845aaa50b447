//! JSON-RPC release 4 envelope codec.
//!
//! Request envelopes are plain serde structs. Responses are decoded in two
//! steps: the outer envelope first (error vs result, id check), then the
//! method-specific result. The `random` object of integer results is kept as
//! a [`RawValue`] so signature checks run over the exact bytes the service
//! sent.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::Error;
use crate::http::{HttpResponse, ServerError};
use crate::request::{RandomRequest, SignedPayload, Usage};

pub const JSONRPC_VERSION: &str = "2.0";

pub const GENERATE_INTEGERS: &str = "generateIntegers";
pub const GENERATE_SIGNED_INTEGERS: &str = "generateSignedIntegers";
pub const GET_USAGE: &str = "getUsage";

/// Service error codes that mean the key itself is the problem.
const KEY_DOES_NOT_EXIST: i64 = 400;
const KEY_NOT_RUNNING: i64 = 401;

/// Fresh request id.
pub fn next_id() -> u64 {
    u64::from(rand::random::<u32>())
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Envelope<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
    pub id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegerParams<'a> {
    pub api_key: &'a str,
    pub n: usize,
    pub min: i64,
    pub max: i64,
    pub replacement: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyParams<'a> {
    pub api_key: &'a str,
}

pub fn integer_method(signed: bool) -> &'static str {
    if signed {
        GENERATE_SIGNED_INTEGERS
    } else {
        GENERATE_INTEGERS
    }
}

/// Serialize a `generate[Signed]Integers` call.
pub fn encode_integers(request: &RandomRequest, api_key: &str, id: u64) -> Vec<u8> {
    let envelope = Envelope {
        jsonrpc: JSONRPC_VERSION,
        method: integer_method(request.signed),
        params: IntegerParams {
            api_key,
            n: request.count,
            min: request.minimum,
            max: request.maximum,
            replacement: request.replacement,
        },
        id,
    };
    serde_json::to_vec(&envelope).expect("integer request envelope serializes")
}

/// Serialize a `getUsage` call.
pub fn encode_usage(api_key: &str, id: u64) -> Vec<u8> {
    let envelope = Envelope {
        jsonrpc: JSONRPC_VERSION,
        method: GET_USAGE,
        params: KeyParams { api_key },
        id,
    };
    serde_json::to_vec(&envelope).expect("usage request envelope serializes")
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// The `error` member of a response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn is_auth(&self) -> bool {
        matches!(self.code, KEY_DOES_NOT_EXIST | KEY_NOT_RUNNING)
    }
}

/// Why a response could not be turned into a result.
#[derive(Debug, thiserror::Error)]
pub enum RpcFailure {
    #[error("service error {}: {}", .0.code, .0.message)]
    Service(RpcError),
    #[error("{0}")]
    Malformed(String),
    #[error(transparent)]
    Unavailable(ServerError),
    #[error("HTTP {status}: {excerpt}")]
    Http { status: u16, excerpt: String },
}

impl From<RpcFailure> for Error {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Service(e) if e.is_auth() => Error::Auth(e.message),
            RpcFailure::Service(e) => Error::Protocol {
                code: e.code,
                message: e.message,
            },
            RpcFailure::Malformed(msg) => Error::Format(msg),
            RpcFailure::Unavailable(e) => Error::transport(e),
            RpcFailure::Http { status, excerpt } => Error::Protocol {
                code: i64::from(status),
                message: excerpt,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    result: Option<Box<RawValue>>,
    #[serde(default)]
    error: Option<RpcError>,
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Unwrap the envelope and return the raw `result` member.
///
/// An `error` member always wins over a `result` member.
pub fn decode_envelope(
    resp: &HttpResponse,
    url: &str,
    expected_id: u64,
) -> Result<Box<RawValue>, RpcFailure> {
    let envelope: ResponseEnvelope = match serde_json::from_slice(&resp.body) {
        Ok(env) => env,
        Err(e) => {
            return Err(if resp.is_server_error() {
                RpcFailure::Unavailable(ServerError {
                    status: resp.status,
                    url: url.to_string(),
                })
            } else if !resp.is_success() {
                RpcFailure::Http {
                    status: resp.status,
                    excerpt: excerpt(&resp.text()),
                }
            } else {
                RpcFailure::Malformed(format!("response is not a JSON-RPC envelope: {e}"))
            });
        }
    };

    if let Some(error) = envelope.error {
        return Err(RpcFailure::Service(error));
    }
    match envelope.id.as_ref().and_then(|v| v.as_u64()) {
        Some(id) if id == expected_id => {}
        other => {
            return Err(RpcFailure::Malformed(format!(
                "response id {other:?} does not match request id {expected_id}"
            )));
        }
    }
    envelope
        .result
        .ok_or_else(|| RpcFailure::Malformed("envelope has neither result nor error".into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegersResult {
    random: Box<RawValue>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    bits_left: Option<i64>,
    #[serde(default)]
    requests_left: Option<i64>,
    #[serde(default)]
    advisory_delay: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RandomObject {
    data: Vec<i64>,
}

/// Decoded `generate[Signed]Integers` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegersOutcome {
    pub values: Vec<i64>,
    pub signed: Option<SignedPayload>,
    pub usage: Usage,
}

/// Decode the `result` member of an integer call.
///
/// When `signed` is set the result must carry a base64 signature; the raw
/// `random` bytes are captured alongside it.
pub fn decode_integers(result: &RawValue, signed: bool) -> Result<IntegersOutcome, RpcFailure> {
    let parsed: IntegersResult = serde_json::from_str(result.get())
        .map_err(|e| RpcFailure::Malformed(format!("unexpected result shape: {e}")))?;
    let random: RandomObject = serde_json::from_str(parsed.random.get())
        .map_err(|e| RpcFailure::Malformed(format!("result.random.data missing: {e}")))?;

    let signed = if signed {
        let encoded = parsed
            .signature
            .ok_or_else(|| RpcFailure::Malformed("signed result has no signature".into()))?;
        let signature = BASE64
            .decode(encoded.trim())
            .map_err(|e| RpcFailure::Malformed(format!("signature is not base64: {e}")))?;
        Some(SignedPayload {
            random: parsed.random.get().as_bytes().to_vec(),
            signature,
        })
    } else {
        None
    };

    Ok(IntegersOutcome {
        values: random.data,
        signed,
        usage: Usage {
            bits_left: parsed.bits_left,
            requests_left: parsed.requests_left,
            advisory_delay_ms: parsed.advisory_delay,
        },
    })
}

/// `getUsage` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub status: String,
    #[serde(default)]
    pub bits_left: Option<i64>,
    #[serde(default)]
    pub requests_left: Option<i64>,
    #[serde(default)]
    pub total_bits: Option<i64>,
    #[serde(default)]
    pub total_requests: Option<i64>,
}

pub fn decode_usage(result: &RawValue) -> Result<UsageReport, RpcFailure> {
    serde_json::from_str(result.get())
        .map_err(|e| RpcFailure::Malformed(format!("unexpected usage shape: {e}")))
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(120) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
