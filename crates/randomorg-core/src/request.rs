//! Request and result types shared by every backend.
//!
//! A [`RandomRequest`] is built once per call and never mutated by the client.
//! Every backend produces the same [`RandomResult`] shape regardless of wire
//! format.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest `count` the service accepts in a single integer request.
pub const MAX_COUNT: usize = 10_000;
/// Largest absolute value the service accepts for either bound.
pub const MAX_BOUND: i64 = 1_000_000_000;

/// The four ways of talking to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Plain-text `GET /integers/`.
    HttpGet,
    /// JSON-RPC release 4 `POST /json-rpc/4/invoke`.
    JsonRpc,
    /// Official client collaborator.
    Vendor,
    /// Convenience wrapper collaborator.
    Convenience,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::HttpGet,
        BackendKind::JsonRpc,
        BackendKind::Vendor,
        BackendKind::Convenience,
    ];
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpGet => write!(f, "http_get"),
            Self::JsonRpc => write!(f, "json_rpc"),
            Self::Vendor => write!(f, "vendor"),
            Self::Convenience => write!(f, "convenience"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http_get" | "get" | "http" => Ok(Self::HttpGet),
            "json_rpc" | "jsonrpc" | "rpc" => Ok(Self::JsonRpc),
            "vendor" | "official" => Ok(Self::Vendor),
            "convenience" | "basic" => Ok(Self::Convenience),
            _ => Err(Error::Validation(format!("unknown backend '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One request for `count` integers in `[minimum, maximum]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomRequest {
    pub count: usize,
    pub minimum: i64,
    pub maximum: i64,
    /// Ask for a signed result. Only JSON-RPC style backends can honor this.
    pub signed: bool,
    /// Per-call API key. Falls back to the configured default when `None`.
    pub api_key: Option<String>,
    /// Draw with replacement (duplicates allowed). Forwarded to JSON-RPC.
    pub replacement: bool,
}

impl RandomRequest {
    pub fn integers(count: usize, minimum: i64, maximum: i64) -> Self {
        Self {
            count,
            minimum,
            maximum,
            signed: false,
            api_key: None,
            replacement: true,
        }
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn without_replacement(mut self) -> Self {
        self.replacement = false;
        self
    }

    /// Check the request shape before anything goes over the wire.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::Validation("count must be at least 1".into()));
        }
        if self.count > MAX_COUNT {
            return Err(Error::Validation(format!(
                "count {} exceeds the service limit of {MAX_COUNT}",
                self.count
            )));
        }
        if self.minimum > self.maximum {
            return Err(Error::Validation(format!(
                "minimum {} is greater than maximum {}",
                self.minimum, self.maximum
            )));
        }
        for bound in [self.minimum, self.maximum] {
            if bound.unsigned_abs() > MAX_BOUND.unsigned_abs() {
                return Err(Error::Validation(format!(
                    "bound {bound} is outside ±{MAX_BOUND}"
                )));
            }
        }
        if !self.replacement {
            let span = (self.maximum - self.minimum) as u64 + 1;
            if (self.count as u64) > span {
                return Err(Error::Validation(format!(
                    "cannot draw {} unique values from a range of {span}",
                    self.count
                )));
            }
        }
        Ok(())
    }

    /// Enforce the result invariants: exact count, every value in range.
    ///
    /// Short or long responses are never padded or truncated.
    pub fn check_values(&self, values: &[i64]) -> Result<()> {
        if values.len() != self.count {
            return Err(Error::format(format!(
                "expected {} values, got {}",
                self.count,
                values.len()
            )));
        }
        if let Some(v) = values
            .iter()
            .find(|&&v| v < self.minimum || v > self.maximum)
        {
            return Err(Error::format(format!(
                "value {v} outside [{}, {}]",
                self.minimum, self.maximum
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Exact bytes the service signed, plus the decoded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// Raw `random` object as it appeared in the response body.
    pub random: Vec<u8>,
    /// Decoded signature bytes.
    pub signature: Vec<u8>,
}

impl SignedPayload {
    /// The `data` array inside the signed `random` object.
    pub fn signed_values(&self) -> Option<Vec<i64>> {
        #[derive(Deserialize)]
        struct Data {
            data: Vec<i64>,
        }
        serde_json::from_slice::<Data>(&self.random)
            .ok()
            .map(|d| d.data)
    }
}

/// Quota snapshot reported alongside JSON-RPC results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub bits_left: Option<i64>,
    pub requests_left: Option<i64>,
    /// Milliseconds the service asks clients to wait before the next call.
    pub advisory_delay_ms: Option<u64>,
}

/// Normalized output of every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomResult {
    pub values: Vec<i64>,
    /// Present iff the request was signed and the backend signs.
    pub signature: Option<SignedPayload>,
    /// Outcome of local signature verification. `None` when unsigned.
    pub verified: Option<bool>,
    pub backend: BackendKind,
    pub usage: Option<Usage>,
}

impl RandomResult {
    pub fn unsigned(backend: BackendKind, values: Vec<i64>) -> Self {
        Self {
            values,
            signature: None,
            verified: None,
            backend,
            usage: None,
        }
    }

    /// True only when a signature was present and checked out.
    pub fn is_trustworthy(&self) -> bool {
        self.verified == Some(true)
    }

    /// Values as bytes, when every value fits in `0..=255`.
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        self.values.iter().map(|&v| u8::try_from(v).ok()).collect()
    }

    /// Re-check this result against `key`.
    ///
    /// Fails if the signature does not verify over the signed bytes, or if
    /// `values` no longer match the `data` the service signed.
    pub fn verify_with(&self, key: &crate::signature::PublicKey) -> bool {
        let Some(payload) = &self.signature else {
            return false;
        };
        if payload.signed_values().as_deref() != Some(self.values.as_slice()) {
            return false;
        }
        crate::signature::verify(&payload.random, &payload.signature, key)
    }
}
