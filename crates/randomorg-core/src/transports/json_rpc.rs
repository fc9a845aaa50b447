//! Direct JSON-RPC release 4 backend.
//!
//! Speaks `generateIntegers` / `generateSignedIntegers` over the HTTP port.
//! Signed results keep the raw `random` bytes for later verification.

use log::debug;

use crate::config::AuthMode;
use crate::error::Result;
use crate::request::{BackendKind, RandomRequest, RandomResult};
use crate::rpc;
use crate::transport::{CallContext, Transport, TransportInfo};

pub(crate) static JSON_RPC_INFO: TransportInfo = TransportInfo {
    kind: BackendKind::JsonRpc,
    description: "JSON-RPC release 4, optionally signed",
    auth: AuthMode::ApiKey,
    signing: true,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcBackend;

impl Transport for JsonRpcBackend {
    fn info(&self) -> &TransportInfo {
        &JSON_RPC_INFO
    }

    fn fetch(&self, request: &RandomRequest, ctx: &CallContext<'_>) -> Result<RandomResult> {
        let api_key = ctx.api_key(request)?;
        let id = rpc::next_id();
        let url = ctx.transport.base_url.as_str();
        debug!(
            "json_rpc: {} n={} id={id}",
            rpc::integer_method(request.signed),
            request.count
        );

        let body = rpc::encode_integers(request, api_key, id);
        let resp = ctx.http.post_json(url, &body, ctx.transport.timeout())?;
        let raw = rpc::decode_envelope(&resp, url, id)?;
        let outcome = rpc::decode_integers(&raw, request.signed)?;
        request.check_values(&outcome.values)?;

        Ok(RandomResult {
            values: outcome.values,
            signature: outcome.signed,
            verified: None,
            backend: BackendKind::JsonRpc,
            usage: Some(outcome.usage),
        })
    }
}
