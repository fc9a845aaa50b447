//! Local stand-in for the Random.org integer interfaces.
//!
//! Serves the plain-text GET endpoint, the JSON-RPC endpoint and the PEM
//! public key from a background thread, so blocking clients can be exercised
//! end to end. [`StubConfig`] scripts the faults the real service produces.
//!
//! ```no_run
//! use randomorg_stub::{StubConfig, StubServer};
//!
//! let stub = StubServer::start(StubConfig::default().with_values(vec![4, 8, 15])).unwrap();
//! println!("GET endpoint at {}", stub.get_url());
//! ```

pub mod keys;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use log::{debug, error, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Value, json};

pub const GET_PATH: &str = "/integers/";
pub const RPC_PATH: &str = "/json-rpc/4/invoke";
pub const KEY_PATH: &str = "/public-key.pem";

const COMPLETION_TIME: &str = "2026-01-01 00:00:00Z";

// Service error codes.
const KEY_DOES_NOT_EXIST: i64 = 400;
const INSUFFICIENT_REQUESTS: i64 = 402;
const PARAMETER_OUT_OF_RANGE: i64 = 202;

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// A scripted misbehavior.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Every JSON-RPC call answers with this `error` member.
    RpcError { code: i64, message: String },
    /// GET answers 503 with `Error: <message>`.
    ErrorText(String),
    /// Drop this many values from every answer.
    Truncate(usize),
    /// Serve a `random` object whose data differs from what was signed.
    TamperSigned,
    /// Echo an id other than the request's.
    WrongId,
    /// Answer 200 with an HTML page.
    Garbage,
}

#[derive(Debug, Clone)]
pub struct StubConfig {
    /// Served verbatim instead of fresh draws.
    pub values: Option<Vec<i64>>,
    pub fault: Fault,
    /// Answer this many GET/RPC calls with a bare 503 before behaving.
    pub fail_first: usize,
    /// Sleep before every GET/RPC answer.
    pub delay: Option<Duration>,
    /// When set, JSON-RPC keys outside this list are rejected.
    pub api_keys: Option<Vec<String>>,
    pub bits_left: i64,
    pub requests_left: i64,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            values: None,
            fault: Fault::None,
            fail_first: 0,
            delay: None,
            api_keys: None,
            bits_left: 250_000,
            requests_left: 1_000,
        }
    }
}

impl StubConfig {
    pub fn with_values(mut self, values: Vec<i64>) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn accepting_keys(mut self, keys: &[&str]) -> Self {
        self.api_keys = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_quota(mut self, requests_left: i64, bits_left: i64) -> Self {
        self.requests_left = requests_left;
        self.bits_left = bits_left;
        self
    }
}

/// Requests received per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HitCounts {
    pub get: usize,
    pub rpc: usize,
    pub key: usize,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct StubState {
    config: StubConfig,
    failures_left: AtomicUsize,
    get_hits: AtomicUsize,
    rpc_hits: AtomicUsize,
    key_hits: AtomicUsize,
    serial: AtomicU64,
    bits_left: AtomicI64,
    requests_left: AtomicI64,
    seen_keys: Mutex<Vec<String>>,
}

impl StubState {
    fn new(config: StubConfig) -> Self {
        Self {
            failures_left: AtomicUsize::new(config.fail_first),
            get_hits: AtomicUsize::new(0),
            rpc_hits: AtomicUsize::new(0),
            key_hits: AtomicUsize::new(0),
            serial: AtomicU64::new(0),
            bits_left: AtomicI64::new(config.bits_left),
            requests_left: AtomicI64::new(config.requests_left),
            seen_keys: Mutex::new(Vec::new()),
            config,
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.config.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn injected_failure(&self) -> Option<Response> {
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        fail.then(|| {
            warn!("stub: injecting 503");
            text(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable\n".into())
        })
    }

    fn draw(&self, n: usize, min: i64, max: i64, replacement: bool) -> Vec<i64> {
        let mut values = match &self.config.values {
            Some(v) => v.clone(),
            None => random_values(n, min, max, replacement),
        };
        if let Fault::Truncate(k) = self.config.fault {
            values.truncate(values.len().saturating_sub(k));
        }
        values
    }

    /// Record the key and check it is known and has quota left.
    fn admit(&self, id: &Value, api_key: &str, consume: bool) -> Result<(), Response> {
        self.seen_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(api_key.to_string());

        let known = self.config.api_keys.as_ref();
        if known.is_some_and(|keys| !keys.iter().any(|k| k == api_key)) {
            return Err(rpc_error(
                id.clone(),
                KEY_DOES_NOT_EXIST,
                "The API key you specified does not exist",
            ));
        }
        if consume && self.requests_left.fetch_sub(1, Ordering::SeqCst) <= 0 {
            self.requests_left.fetch_add(1, Ordering::SeqCst);
            return Err(rpc_error(
                id.clone(),
                INSUFFICIENT_REQUESTS,
                "The API key you specified has no requests left today",
            ));
        }
        Ok(())
    }

    fn hits(&self) -> HitCounts {
        HitCounts {
            get: self.get_hits.load(Ordering::SeqCst),
            rpc: self.rpc_hits.load(Ordering::SeqCst),
            key: self.key_hits.load(Ordering::SeqCst),
        }
    }
}

fn random_values(n: usize, min: i64, max: i64, replacement: bool) -> Vec<i64> {
    let mut rng = rand::rng();
    if replacement {
        return (0..n).map(|_| rng.random_range(min..=max)).collect();
    }
    let room = usize::try_from(i128::from(max) - i128::from(min) + 1).unwrap_or(usize::MAX);
    let want = n.min(room);
    let mut seen = HashSet::with_capacity(want);
    let mut out = Vec::with_capacity(want);
    while out.len() < want {
        let v = rng.random_range(min..=max);
        if seen.insert(v) {
            out.push(v);
        }
    }
    out
}

fn bits_for(n: usize, min: i64, max: i64) -> i64 {
    let span = (i128::from(max) - i128::from(min) + 1).max(1) as f64;
    (span.log2().ceil() as i64).max(1) * n as i64
}

fn in_base(value: i64, base: u32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    match base {
        2 => format!("{sign}{abs:b}"),
        8 => format!("{sign}{abs:o}"),
        16 => format!("{sign}{abs:x}"),
        _ => value.to_string(),
    }
}

fn text(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET interface
// ---------------------------------------------------------------------------

fn one() -> usize {
    1
}

fn ten() -> u32 {
    10
}

fn yes() -> bool {
    true
}

#[derive(Deserialize)]
struct GetParams {
    num: usize,
    min: i64,
    max: i64,
    #[serde(default = "one")]
    col: usize,
    #[serde(default = "ten")]
    base: u32,
}

async fn handle_integers(
    State(state): State<Arc<StubState>>,
    Query(params): Query<GetParams>,
) -> Response {
    state.get_hits.fetch_add(1, Ordering::SeqCst);
    state.pause().await;
    if let Some(resp) = state.injected_failure() {
        return resp;
    }
    match &state.config.fault {
        Fault::ErrorText(msg) => {
            return text(StatusCode::SERVICE_UNAVAILABLE, format!("Error: {msg}\n"));
        }
        Fault::Garbage => return text(StatusCode::OK, "<html>maintenance</html>".into()),
        _ => {}
    }
    if params.num == 0 || params.min > params.max {
        return text(
            StatusCode::SERVICE_UNAVAILABLE,
            "Error: The minimum value must be less than or equal to the maximum value\n".into(),
        );
    }

    let values = state.draw(params.num, params.min, params.max, true);
    debug!("stub: GET serving {} values", values.len());
    let mut body = values
        .chunks(params.col.max(1))
        .map(|row| {
            row.iter()
                .map(|v| in_base(*v, params.base))
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n");
    body.push('\n');
    text(StatusCode::OK, body)
}

// ---------------------------------------------------------------------------
// JSON-RPC interface
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcCall {
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegerParams {
    api_key: String,
    n: usize,
    min: i64,
    max: i64,
    #[serde(default = "yes")]
    replacement: bool,
    #[serde(default = "ten")]
    base: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageParams {
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntegersResult {
    random: Box<RawValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    bits_used: i64,
    bits_left: i64,
    requests_left: i64,
    advisory_delay: u64,
}

#[derive(Serialize)]
struct Envelope<R> {
    jsonrpc: &'static str,
    result: R,
    id: Value,
}

fn rpc_error(id: Value, code: i64, message: &str) -> Response {
    Json(json!({
        "jsonrpc": "2.0",
        "error": { "code": code, "message": message, "data": null },
        "id": id,
    }))
    .into_response()
}

fn random_object(
    method: &str,
    params: &IntegerParams,
    values: &[i64],
    serial: u64,
    signed: bool,
) -> String {
    let object = if signed {
        json!({
            "method": method,
            "hashedApiKey": keys::hash_api_key(&params.api_key),
            "n": params.n,
            "min": params.min,
            "max": params.max,
            "replacement": params.replacement,
            "base": params.base,
            "data": values,
            "completionTime": COMPLETION_TIME,
            "serialNumber": serial,
        })
    } else {
        json!({ "data": values, "completionTime": COMPLETION_TIME })
    };
    object.to_string()
}

impl StubState {
    fn integers(&self, id: Value, method: &str, params: Value) -> Response {
        let params: IntegerParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return rpc_error(id, -32602, &format!("Invalid params: {e}")),
        };
        if let Err(resp) = self.admit(&id, &params.api_key, true) {
            return resp;
        }
        if params.n == 0 || params.min > params.max {
            return rpc_error(id, PARAMETER_OUT_OF_RANGE, "Parameter is out of range");
        }

        let signed = method == "generateSignedIntegers";
        let mut values = self.draw(params.n, params.min, params.max, params.replacement);
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let bits_used = bits_for(params.n, params.min, params.max);
        let bits_left = self.bits_left.fetch_sub(bits_used, Ordering::SeqCst) - bits_used;

        let mut random = random_object(method, &params, &values, serial, signed);
        let signature = signed.then(|| keys::sign_base64(random.as_bytes()));
        if signed && self.config.fault == Fault::TamperSigned {
            if let Some(first) = values.first_mut() {
                *first = if *first < params.max {
                    *first + 1
                } else {
                    *first - 1
                };
            }
            random = random_object(method, &params, &values, serial, signed);
        }

        let random = match RawValue::from_string(random) {
            Ok(raw) => raw,
            Err(e) => return rpc_error(id, -32603, &format!("Internal error: {e}")),
        };
        debug!("stub: {method} serving {} values", values.len());
        Json(Envelope {
            jsonrpc: "2.0",
            result: IntegersResult {
                random,
                signature,
                bits_used,
                bits_left,
                requests_left: self.requests_left.load(Ordering::SeqCst),
                advisory_delay: 0,
            },
            id,
        })
        .into_response()
    }

    fn usage(&self, id: Value, params: Value) -> Response {
        let params: UsageParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return rpc_error(id, -32602, &format!("Invalid params: {e}")),
        };
        if let Err(resp) = self.admit(&id, &params.api_key, false) {
            return resp;
        }
        let bits_left = self.bits_left.load(Ordering::SeqCst);
        let requests_left = self.requests_left.load(Ordering::SeqCst);
        Json(Envelope {
            jsonrpc: "2.0",
            result: json!({
                "status": "running",
                "creationTime": COMPLETION_TIME,
                "bitsLeft": bits_left,
                "requestsLeft": requests_left,
                "totalBits": self.config.bits_left - bits_left,
                "totalRequests": self.config.requests_left - requests_left,
            }),
            id,
        })
        .into_response()
    }
}

async fn handle_rpc(State(state): State<Arc<StubState>>, body: Bytes) -> Response {
    state.rpc_hits.fetch_add(1, Ordering::SeqCst);
    state.pause().await;
    if let Some(resp) = state.injected_failure() {
        return resp;
    }
    if state.config.fault == Fault::Garbage {
        return text(StatusCode::OK, "<html>maintenance</html>".into());
    }

    let call: RpcCall = match serde_json::from_slice(&body) {
        Ok(call) => call,
        Err(e) => return rpc_error(Value::Null, -32700, &format!("Parse error: {e}")),
    };
    let id = match (&state.config.fault, call.id.as_u64()) {
        (Fault::WrongId, Some(id)) => Value::from(id.wrapping_add(1)),
        (Fault::WrongId, None) => Value::from(0),
        _ => call.id,
    };
    if let Fault::RpcError { code, message } = &state.config.fault {
        return rpc_error(id, *code, message);
    }

    match call.method.as_str() {
        "generateIntegers" | "generateSignedIntegers" => {
            state.integers(id, &call.method, call.params)
        }
        "getUsage" => state.usage(id, call.params),
        other => rpc_error(id, -32601, &format!("Method not found: {other}")),
    }
}

async fn handle_key(State(state): State<Arc<StubState>>) -> Response {
    state.key_hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-pem-file")],
        keys::PUBLIC_PEM,
    )
        .into_response()
}

fn build_router(state: Arc<StubState>) -> Router {
    Router::new()
        .route(GET_PATH, get(handle_integers))
        .route(RPC_PATH, post(handle_rpc))
        .route(KEY_PATH, get(handle_key))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Server handle
// ---------------------------------------------------------------------------

/// A running stub bound to an ephemeral localhost port.
///
/// The server runs on its own thread and tokio runtime, and stops when the
/// handle is dropped.
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<StubState>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl StubServer {
    pub fn start(config: StubConfig) -> std::io::Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let state = Arc::new(StubState::new(config));
        let app = build_router(Arc::clone(&state));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        std::thread::Builder::new()
            .name(format!("randomorg-stub-{}", addr.port()))
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(l) => l,
                        Err(e) => {
                            error!("stub: cannot adopt listener: {e}");
                            return;
                        }
                    };
                    let served = axum::serve(listener, app)
                        .with_graceful_shutdown(async {
                            let _ = rx.await;
                        })
                        .await;
                    if let Err(e) = served {
                        error!("stub: server stopped: {e}");
                    }
                });
            })?;

        debug!("stub: listening on {addr}");
        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get_url(&self) -> String {
        format!("{}{GET_PATH}", self.base_url())
    }

    pub fn rpc_url(&self) -> String {
        format!("{}{RPC_PATH}", self.base_url())
    }

    pub fn key_url(&self) -> String {
        format!("{}{KEY_PATH}", self.base_url())
    }

    pub fn hits(&self) -> HitCounts {
        self.state.hits()
    }

    /// Every API key presented to the JSON-RPC endpoint, in arrival order.
    pub fn api_keys_seen(&self) -> Vec<String> {
        self.state
            .seen_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bases() {
        assert_eq!(in_base(10, 2), "1010");
        assert_eq!(in_base(8, 8), "10");
        assert_eq!(in_base(-255, 16), "-ff");
        assert_eq!(in_base(-7, 10), "-7");
    }

    #[test]
    fn unique_draws_have_no_repeats() {
        let v = random_values(10, 1, 10, false);
        let set: HashSet<_> = v.iter().collect();
        assert_eq!(set.len(), 10);
        assert!(v.iter().all(|x| (1..=10).contains(x)));
    }

    #[test]
    fn draws_respect_bounds() {
        let v = random_values(500, -3, 3, true);
        assert_eq!(v.len(), 500);
        assert!(v.iter().all(|x| (-3..=3).contains(x)));
    }

    #[test]
    fn bits_scale_with_span() {
        assert_eq!(bits_for(1, 0, 1), 1);
        assert_eq!(bits_for(2, 1, 6), 6);
        assert_eq!(bits_for(3, 5, 5), 3);
    }

    #[test]
    fn truncate_fault_drops_values() {
        let state = StubState::new(
            StubConfig::default()
                .with_values(vec![1, 2, 3])
                .with_fault(Fault::Truncate(1)),
        );
        assert_eq!(state.draw(3, 0, 9, true), vec![1, 2]);
    }

    #[test]
    fn fail_first_counts_down() {
        let state = StubState::new(StubConfig::default().failing_first(2));
        assert!(state.injected_failure().is_some());
        assert!(state.injected_failure().is_some());
        assert!(state.injected_failure().is_none());
    }

    #[test]
    fn server_starts_on_ephemeral_port() {
        let stub = StubServer::start(StubConfig::default()).unwrap();
        assert!(stub.get_url().starts_with("http://127.0.0.1:"));
        assert!(stub.rpc_url().ends_with(RPC_PATH));
        assert_eq!(stub.hits(), HitCounts::default());
    }
}
